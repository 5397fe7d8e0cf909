//=========================================================================
// Generic Tasks
//=========================================================================
//
// Leaf bodies that are not tied to scenes:
//
// - Wait       suspend for a number of ticks or a span of scheduler time
// - WaitUntil  race a condition against an optional deadline (timeouts)
// - Deferred   build the real body from the context on the first step
// - RunChild   run a nested child operation and mirror its progress
//
//=========================================================================

//=== External Dependencies ===============================================

use std::time::Duration;

use log::debug;

//=== Internal Dependencies ===============================================

use super::{drive, Action, ActionContext, ActionState, Outcome, Step, Task};
use crate::core::host::SceneHost;
use crate::core::operation::{Operation, OperationId};

//=== Wait ================================================================

#[derive(Debug, Clone, Copy)]
enum WaitFor {
    Ticks(u32),
    Time(Duration),
}

/// Suspends for a fixed number of ticks or amount of scheduler time.
#[derive(Debug, Clone)]
pub struct Wait {
    until: WaitFor,
    polls: u32,
    started: Option<Duration>,
}

impl Wait {
    /// Yields `ticks` times, finishing on the following step.
    pub fn ticks(ticks: u32) -> Self {
        Self {
            until: WaitFor::Ticks(ticks),
            polls: 0,
            started: None,
        }
    }

    /// Yields until `duration` of scheduler time has passed since the
    /// first step.
    pub fn duration(duration: Duration) -> Self {
        Self {
            until: WaitFor::Time(duration),
            polls: 0,
            started: None,
        }
    }
}

impl<H: SceneHost> Task<H> for Wait {
    fn poll(&mut self, ctx: &mut ActionContext<'_, H>, state: &mut ActionState<H::Handle>) -> Step {
        match self.until {
            WaitFor::Ticks(ticks) => {
                if self.polls >= ticks {
                    return Step::Done(Outcome::Completed);
                }
                self.polls += 1;
                state.set_progress(self.polls as f32 / (ticks + 1) as f32);
                Step::Continue
            }
            WaitFor::Time(duration) => {
                let now = ctx.clock().elapsed();
                let started = *self.started.get_or_insert(now);
                let waited = now.saturating_sub(started);
                if waited >= duration {
                    return Step::Done(Outcome::Completed);
                }
                state.set_progress(waited.as_secs_f32() / duration.as_secs_f32());
                Step::Continue
            }
        }
    }
}

//=== WaitUntil ===========================================================

type Condition<H> = Box<dyn FnMut(&mut ActionContext<'_, H>) -> bool>;

/// Waits for a condition, optionally racing it against a deadline.
///
/// Finishes `Completed` when the condition holds and `Skipped` when the
/// deadline passes first.
pub struct WaitUntil<H: SceneHost> {
    condition: Condition<H>,
    timeout: Option<Duration>,
    started: Option<Duration>,
}

impl<H: SceneHost> WaitUntil<H> {
    pub fn new<F>(condition: F) -> Self
    where
        F: FnMut(&mut ActionContext<'_, H>) -> bool + 'static,
    {
        Self {
            condition: Box::new(condition),
            timeout: None,
            started: None,
        }
    }

    /// Gives up once `timeout` of scheduler time has passed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<H: SceneHost> Task<H> for WaitUntil<H> {
    fn poll(&mut self, ctx: &mut ActionContext<'_, H>, state: &mut ActionState<H::Handle>) -> Step {
        if (self.condition)(ctx) {
            return Step::Done(Outcome::Completed);
        }

        let Some(timeout) = self.timeout else {
            return Step::Continue;
        };
        let now = ctx.clock().elapsed();
        let waited = now.saturating_sub(*self.started.get_or_insert(now));
        if waited >= timeout {
            debug!("Wait timed out after {:?}", waited);
            return Step::Done(Outcome::Skipped);
        }
        state.set_progress(waited.as_secs_f32() / timeout.as_secs_f32());
        Step::Continue
    }
}

//=== Deferred ============================================================

type Builder<H> = Box<dyn FnOnce(&mut ActionContext<'_, H>) -> Action<H>>;

/// Builds its body from the context on the first step, then drives it.
///
/// Used when the work depends on state only known at execution time,
/// such as which scenes are open when a collection switch starts.
pub struct Deferred<H: SceneHost> {
    build: Option<Builder<H>>,
    inner: Option<Box<Action<H>>>,
}

impl<H: SceneHost> Deferred<H> {
    pub fn new<F>(build: F) -> Self
    where
        F: FnOnce(&mut ActionContext<'_, H>) -> Action<H> + 'static,
    {
        Self {
            build: Some(Box::new(build)),
            inner: None,
        }
    }
}

impl<H: SceneHost> Task<H> for Deferred<H> {
    fn poll(&mut self, ctx: &mut ActionContext<'_, H>, state: &mut ActionState<H::Handle>) -> Step {
        if let Some(build) = self.build.take() {
            self.inner = Some(Box::new(build(ctx)));
        }
        match self.inner.as_mut() {
            Some(inner) => drive(inner, ctx, state),
            None => Step::Done(Outcome::Skipped),
        }
    }

    fn cancelled(&mut self, ctx: &mut ActionContext<'_, H>, _state: &mut ActionState<H::Handle>) {
        if let Some(inner) = self.inner.as_mut() {
            inner.cancel();
            inner.step(ctx);
        }
    }
}

//=== RunChild ============================================================

/// Runs an operation as a child of the current one.
///
/// The child skips lane queues, and its progress and result become this
/// action's. Cancelling this action cancels the child.
pub struct RunChild<H: SceneHost> {
    pending: Option<Operation<H>>,
    child: Option<OperationId>,
}

impl<H: SceneHost> RunChild<H> {
    pub fn new(operation: Operation<H>) -> Self {
        Self {
            pending: Some(operation),
            child: None,
        }
    }

    pub fn child(&self) -> Option<OperationId> {
        self.child
    }
}

impl<H: SceneHost> Task<H> for RunChild<H> {
    fn poll(&mut self, ctx: &mut ActionContext<'_, H>, state: &mut ActionState<H::Handle>) -> Step {
        if let Some(operation) = self.pending.take() {
            let id = ctx.spawn(operation);
            debug!("Spawned child operation {}", id);
            self.child = Some(id);
            return Step::Continue;
        }

        let Some(id) = self.child else {
            return Step::Done(Outcome::Skipped);
        };
        let Some(status) = ctx.operation_status(id) else {
            return Step::Done(Outcome::Skipped);
        };

        state.set_progress(status.progress);
        match status.result {
            Some(result) => {
                if let Some(handle) = result.handle {
                    state.produce(handle);
                }
                Step::Done(result.outcome)
            }
            None => Step::Continue,
        }
    }

    fn cancelled(&mut self, ctx: &mut ActionContext<'_, H>, _state: &mut ActionState<H::Handle>) {
        if let Some(id) = self.child {
            ctx.cancel_operation(id);
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
