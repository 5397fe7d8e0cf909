//=========================================================================
// Action System
//=========================================================================
//
// Resumable units of cooperative work.
//
// Architecture:
//   Action
//     ├─ state: ActionState  (progress, outcome, callbacks, result handle)
//     └─ body:  Noop | Leaf(Task) | Overridable | Aggregate
//
// Flow (once per scheduler tick):
//   step() → [cancel requested?] → body.poll() → Continue | Done(outcome)
//
// An action never returns an error. Missing prerequisites collapse to a
// `Skipped` completion and cancellation is a terminal outcome of its own.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;

//=== Module Declarations =================================================

mod aggregate;
mod context;
mod overridable;
mod overrides;
mod tasks;

//=== Public API ==========================================================

pub use aggregate::AggregateAction;
pub use context::{ActionContext, Clock};
pub use overridable::OverridableAction;
pub use overrides::{OverrideHandler, OverrideKey, OverrideKind, OverrideRegistry};
pub use tasks::{Deferred, RunChild, Wait, WaitUntil};

#[cfg(test)]
pub(crate) use context::TestBed;

use crate::core::host::{SceneHost, SceneId};
use crate::core::operation::Operation;

/// Highest progress an unfinished action may report.
///
/// Progress reaches exactly 1.0 only through completion.
const PENDING_CEILING: f32 = 1.0 - f32::EPSILON / 2.0;

//=== Outcome =============================================================

/// How an action or operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The body ran to completion.
    Completed,

    /// A prerequisite was missing or became invalid, nothing happened.
    Skipped,

    /// Cancellation was requested and observed.
    Cancelled,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed => f.write_str("completed"),
            Outcome::Skipped => f.write_str("skipped"),
            Outcome::Cancelled => f.write_str("cancelled"),
        }
    }
}

//=== Step ================================================================

/// Result of advancing an action by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspended until the next tick.
    Continue,

    /// Finished with the given outcome. Further steps return the same value.
    Done(Outcome),
}

//=== ActionState =========================================================

/// Progress, completion and callback bookkeeping shared by every action.
pub struct ActionState<Hd> {
    progress: f32,
    reported: f32,
    outcome: Option<Outcome>,
    cancel_requested: bool,
    produced: Option<Hd>,
    progress_callbacks: Vec<Box<dyn FnMut(f32)>>,
    complete_callbacks: Vec<Box<dyn FnOnce(Outcome)>>,
}

impl<Hd> ActionState<Hd> {
    fn new() -> Self {
        Self {
            progress: 0.0,
            reported: 0.0,
            outcome: None,
            cancel_requested: false,
            produced: None,
            progress_callbacks: Vec::new(),
            complete_callbacks: Vec::new(),
        }
    }

    /// Current progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Raises progress. Lower values and values after completion are ignored.
    pub fn set_progress(&mut self, progress: f32) {
        if self.outcome.is_some() {
            return;
        }
        let progress = progress.clamp(0.0, PENDING_CEILING);
        if progress > self.progress {
            self.progress = progress;
        }
    }

    /// Stores the resource produced by this action (e.g. a scene handle).
    pub fn produce(&mut self, handle: Hd) {
        self.produced = Some(handle);
    }

    pub fn produced(&self) -> Option<&Hd> {
        self.produced.as_ref()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    fn notify_progress(&mut self) {
        if self.progress > self.reported {
            self.reported = self.progress;
            let progress = self.progress;
            for callback in &mut self.progress_callbacks {
                callback(progress);
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        if self.outcome.is_some() {
            return;
        }
        if outcome != Outcome::Cancelled {
            self.progress = 1.0;
        }
        self.outcome = Some(outcome);
        self.notify_progress();
        for callback in self.complete_callbacks.drain(..) {
            callback(outcome);
        }
    }
}

//=== Task Trait ==========================================================

/// Body of a leaf action.
///
/// `poll` is called once per tick until it returns `Step::Done`. Code
/// between two polls runs without interruption from any other action.
pub trait Task<H: SceneHost> {
    fn poll(&mut self, ctx: &mut ActionContext<'_, H>, state: &mut ActionState<H::Handle>) -> Step;

    /// Cleanup hook, run once when a cancel request is observed.
    fn cancelled(&mut self, _ctx: &mut ActionContext<'_, H>, _state: &mut ActionState<H::Handle>) {}
}

/// Adapter turning a closure into a [`Task`].
struct FnTask<F>(F);

impl<H, F> Task<H> for FnTask<F>
where
    H: SceneHost,
    F: FnMut(&mut ActionContext<'_, H>, &mut ActionState<H::Handle>) -> Step,
{
    fn poll(&mut self, ctx: &mut ActionContext<'_, H>, state: &mut ActionState<H::Handle>) -> Step {
        (self.0)(ctx, state)
    }
}

//=== Body ================================================================

enum Body<H: SceneHost> {
    Noop,
    Leaf(Box<dyn Task<H>>),
    Overridable(OverridableAction<H>),
    Aggregate(AggregateAction<H>),
}

/// Variant tag of an action, for inspection and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Noop,
    Leaf,
    Overridable,
    Aggregate,
}

//=== Action ==============================================================

/// Atomic unit of cooperatively scheduled work.
///
/// Actions are single-shot. They finish exactly once, after which
/// progress is pinned (at 1.0 unless cancelled) and `step` keeps
/// returning the same `Step::Done`.
pub struct Action<H: SceneHost> {
    target: Option<SceneId>,
    state: ActionState<H::Handle>,
    body: Body<H>,
}

impl<H: SceneHost> Action<H> {
    //--- Construction -----------------------------------------------------

    fn with_body(target: Option<SceneId>, body: Body<H>) -> Self {
        Self {
            target,
            state: ActionState::new(),
            body,
        }
    }

    /// An action that is already finished as `Skipped`.
    pub fn skipped() -> Self {
        let mut action = Self::with_body(None, Body::Noop);
        action.state.finish(Outcome::Skipped);
        action
    }

    /// An action that completes on its first step without doing anything.
    pub fn noop() -> Self {
        Self::with_body(None, Body::Noop)
    }

    /// Wraps a task into a leaf action.
    pub fn leaf(task: impl Task<H> + 'static) -> Self {
        Self::with_body(None, Body::Leaf(Box::new(task)))
    }

    /// Wraps a closure into a leaf action.
    pub fn from_fn<F>(poll: F) -> Self
    where
        F: FnMut(&mut ActionContext<'_, H>, &mut ActionState<H::Handle>) -> Step + 'static,
    {
        Self::leaf(FnTask(poll))
    }

    /// Leaf action bound to a target.
    ///
    /// A missing or empty target yields an already-skipped action.
    pub fn targeted(target: Option<SceneId>, task: impl Task<H> + 'static) -> Self {
        match target.filter(|t| !t.is_empty()) {
            Some(target) => Self::with_body(Some(target), Body::Leaf(Box::new(task))),
            None => Self::skipped(),
        }
    }

    /// Wraps an overridable action. The target is taken from its key.
    pub fn overridable(action: OverridableAction<H>) -> Self {
        if action.key().target.is_empty() {
            return Self::skipped();
        }
        let target = Some(action.key().target.clone());
        Self::with_body(target, Body::Overridable(action))
    }

    /// Wraps an aggregate. An aggregate without children is skipped.
    pub fn aggregate(aggregate: AggregateAction<H>) -> Self {
        if aggregate.is_empty() {
            return Self::skipped();
        }
        Self::with_body(None, Body::Aggregate(aggregate))
    }

    /// Runs `children` one after another.
    pub fn sequence(children: impl IntoIterator<Item = Action<H>>) -> Self {
        Self::aggregate(AggregateAction::from_actions(children))
    }

    /// Spawns `operation` as a child of the running operation and waits for it.
    pub fn child(operation: Operation<H>) -> Self {
        Self::leaf(RunChild::new(operation))
    }

    /// Builds the real body from the context on the first step.
    pub fn deferred<F>(build: F) -> Self
    where
        F: FnOnce(&mut ActionContext<'_, H>) -> Action<H> + 'static,
    {
        Self::leaf(Deferred::new(build))
    }

    //--- Callbacks --------------------------------------------------------

    /// Registers a callback fired whenever progress increases.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(f32) + 'static,
    {
        self.state.progress_callbacks.push(Box::new(callback));
        self
    }

    /// Registers a completion callback.
    ///
    /// Fires immediately if the action has already finished.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Outcome) + 'static,
    {
        match self.state.outcome {
            Some(outcome) => callback(outcome),
            None => self.state.complete_callbacks.push(Box::new(callback)),
        }
        self
    }

    //--- Execution --------------------------------------------------------

    /// Advances the action by one tick.
    pub fn step(&mut self, ctx: &mut ActionContext<'_, H>) -> Step {
        if let Some(outcome) = self.state.outcome {
            return Step::Done(outcome);
        }

        if self.state.cancel_requested {
            match &mut self.body {
                Body::Noop => {}
                Body::Leaf(task) => task.cancelled(ctx, &mut self.state),
                Body::Overridable(action) => action.cancelled(ctx, &mut self.state),
                Body::Aggregate(aggregate) => aggregate.cancelled(ctx, &mut self.state),
            }
            self.state.finish(Outcome::Cancelled);
            return Step::Done(Outcome::Cancelled);
        }

        let step = match &mut self.body {
            Body::Noop => Step::Done(Outcome::Completed),
            Body::Leaf(task) => task.poll(ctx, &mut self.state),
            Body::Overridable(action) => action.poll(ctx, &mut self.state),
            Body::Aggregate(aggregate) => aggregate.poll(ctx, &mut self.state),
        };

        match step {
            Step::Continue => self.state.notify_progress(),
            Step::Done(outcome) => self.state.finish(outcome),
        }
        step
    }

    /// Requests cooperative cancellation.
    ///
    /// Observed at the next step. Aggregates forward the request to the
    /// child currently running.
    pub fn cancel(&mut self) {
        if self.state.outcome.is_some() || self.state.cancel_requested {
            return;
        }
        self.state.cancel_requested = true;
        match &mut self.body {
            Body::Overridable(action) => action.forward_cancel(),
            Body::Aggregate(aggregate) => aggregate.forward_cancel(),
            Body::Noop | Body::Leaf(_) => {}
        }
    }

    //--- Query Methods ----------------------------------------------------

    pub fn progress(&self) -> f32 {
        self.state.progress
    }

    pub fn is_done(&self) -> bool {
        self.state.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.state.outcome
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.state.cancel_requested
    }

    /// Resource produced by the action, if any.
    pub fn produced(&self) -> Option<&H::Handle> {
        self.state.produced.as_ref()
    }

    pub fn target(&self) -> Option<&SceneId> {
        self.target.as_ref()
    }

    /// Direct children of an aggregate, empty for every other kind.
    pub fn children(&self) -> &[Action<H>] {
        match &self.body {
            Body::Aggregate(aggregate) => aggregate.children(),
            _ => &[],
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self.body {
            Body::Noop => ActionKind::Noop,
            Body::Leaf(_) => ActionKind::Leaf,
            Body::Overridable(_) => ActionKind::Overridable,
            Body::Aggregate(_) => ActionKind::Aggregate,
        }
    }
}

impl<H: SceneHost> fmt::Debug for Action<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("kind", &self.kind())
            .field("target", &self.target)
            .field("progress", &self.state.progress)
            .field("outcome", &self.state.outcome)
            .finish()
    }
}

//=== Delegation Helper ===================================================

/// Steps `inner` and mirrors its progress and result into `state`.
pub(crate) fn drive<H: SceneHost>(
    inner: &mut Action<H>,
    ctx: &mut ActionContext<'_, H>,
    state: &mut ActionState<H::Handle>,
) -> Step {
    let step = inner.step(ctx);
    state.set_progress(inner.progress());
    if let Step::Done(_) = step {
        if state.produced.is_none() {
            state.produced = inner.state.produced.clone();
        }
    }
    step
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::SimulatedHost;
    use std::cell::RefCell;
    use std::rc::Rc;

    type A = Action<SimulatedHost>;

    fn counting(ticks: u32) -> A {
        let mut left = ticks;
        A::from_fn(move |_, state| {
            if left == 0 {
                return Step::Done(Outcome::Completed);
            }
            left -= 1;
            state.set_progress(state.progress() + 0.25);
            Step::Continue
        })
    }

    //--- Construction -----------------------------------------------------

    #[test]
    fn missing_target_is_done_at_construction() {
        let action = A::targeted(None, super::tasks::Wait::ticks(3));
        assert!(action.is_done());
        assert_eq!(action.outcome(), Some(Outcome::Skipped));
        assert_eq!(action.progress(), 1.0);
    }

    #[test]
    fn empty_target_counts_as_missing() {
        let action = A::targeted(Some(SceneId::from("")), super::tasks::Wait::ticks(3));
        assert!(action.is_done());
    }

    #[test]
    fn noop_completes_on_first_step() {
        let mut bed = TestBed::new();
        let mut action = A::noop();
        assert!(!action.is_done());
        assert_eq!(action.step(&mut bed.ctx()), Step::Done(Outcome::Completed));
        assert_eq!(action.progress(), 1.0);
    }

    //--- Progress ---------------------------------------------------------

    #[test]
    fn progress_is_monotonic_and_pinned() {
        let mut bed = TestBed::new();
        let mut action = A::from_fn(|_, state| {
            state.set_progress(0.6);
            state.set_progress(0.3);
            Step::Continue
        });

        action.step(&mut bed.ctx());
        assert_eq!(action.progress(), 0.6);
        action.cancel();
        action.step(&mut bed.ctx());
        assert_eq!(action.outcome(), Some(Outcome::Cancelled));
        assert_eq!(action.progress(), 0.6);
    }

    #[test]
    fn unfinished_action_never_reports_one() {
        let mut bed = TestBed::new();
        let mut action = A::from_fn(|_, state| {
            state.set_progress(1.0);
            Step::Continue
        });
        action.step(&mut bed.ctx());
        assert!(action.progress() < 1.0);
    }

    //--- Callbacks --------------------------------------------------------

    #[test]
    fn callbacks_fire_in_registration_order() {
        let mut bed = TestBed::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (log.clone(), log.clone());

        let mut action = counting(2)
            .on_complete(move |o| a.borrow_mut().push(format!("first {o}")))
            .on_complete(move |o| b.borrow_mut().push(format!("second {o}")));

        let ticks = bed.run(&mut action, 10);
        assert_eq!(ticks, 3);
        assert_eq!(*log.borrow(), vec!["first completed", "second completed"]);
    }

    #[test]
    fn progress_callbacks_see_increases_only() {
        let mut bed = TestBed::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();

        let mut action = counting(2).on_progress(move |p| sink.borrow_mut().push(p));
        bed.run(&mut action, 10);

        assert_eq!(*seen.borrow(), vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn completion_callback_on_finished_action_fires_immediately() {
        let fired = Rc::new(RefCell::new(None));
        let sink = fired.clone();
        let _action = A::skipped().on_complete(move |o| *sink.borrow_mut() = Some(o));
        assert_eq!(*fired.borrow(), Some(Outcome::Skipped));
    }

    //--- Cancellation -----------------------------------------------------

    #[test]
    fn cancel_is_observed_at_next_step() {
        let mut bed = TestBed::new();
        let mut action = counting(5);
        action.step(&mut bed.ctx());
        action.cancel();
        assert!(!action.is_done());
        assert!(action.is_cancel_requested());
        assert_eq!(action.step(&mut bed.ctx()), Step::Done(Outcome::Cancelled));
        assert_eq!(action.step(&mut bed.ctx()), Step::Done(Outcome::Cancelled));
    }

    #[test]
    fn cancel_after_completion_is_ignored() {
        let mut bed = TestBed::new();
        let mut action = A::noop();
        action.step(&mut bed.ctx());
        action.cancel();
        assert!(!action.is_cancel_requested());
        assert_eq!(action.outcome(), Some(Outcome::Completed));
    }
}
