//=========================================================================
// Operations
//=========================================================================
//
// Caller-facing handle around a root action and its scheduling policy.
//
// State machine:
//
//   Pending ──submit──► Queued ──lane free──► Running ──root done──► Done
//      │                  │                     │
//      └──bypass/child────┴──────────►──────────┤
//                         │                     │
//                         └──cancel──► Cancelled ◄──cancel observed──┘
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;

//=== Internal Dependencies ===============================================

use crate::core::action::{Action, ActionContext, Outcome, Step};
use crate::core::host::SceneHost;

//=== OperationId =========================================================

/// Handle returned by [`crate::Scheduler::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub(crate) u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

//=== Lane ================================================================

/// Independent scheduling queue with at most one active operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Single scene open/close requests.
    Standalone,

    /// Collection switches.
    Collection,

    /// User-defined lanes.
    Custom(u32),
}

impl Lane {
    #[inline]
    pub const fn custom(id: u32) -> Self {
        Self::Custom(id)
    }
}

impl Default for Lane {
    fn default() -> Self {
        Self::Standalone
    }
}

//=== Policy ==============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Wait behind the lane's active operation.
    #[default]
    Queued,

    /// Start immediately alongside whatever the lane is running.
    BypassQueue,
}

//=== Phase ===============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pending,
    Queued,
    Running,
    Done,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Cancelled)
    }
}

//=== Results =============================================================

/// Completion value of an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult<Hd> {
    pub outcome: Outcome,

    /// Resource produced by the root action, e.g. the opened scene.
    pub handle: Option<Hd>,
}

/// Point-in-time view of an operation, live or finished.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationStatus<Hd> {
    pub phase: Phase,
    pub progress: f32,
    pub result: Option<OperationResult<Hd>>,
}

//=== Operation ===========================================================

type ProgressCallback = Box<dyn FnMut(f32)>;
type CompleteCallback<Hd> = Box<dyn FnOnce(&OperationResult<Hd>)>;

/// A labelled root action plus its scheduling policy and callbacks.
///
/// Built by the caller, then handed to the scheduler which owns it until
/// it finishes.
pub struct Operation<H: SceneHost> {
    label: String,
    lane: Lane,
    policy: Policy,
    parent: Option<OperationId>,
    phase: Phase,
    root: Action<H>,
    reported: f32,
    progress_callbacks: Vec<ProgressCallback>,
    complete_callbacks: Vec<CompleteCallback<H::Handle>>,
}

impl<H: SceneHost> Operation<H> {
    //--- Construction -----------------------------------------------------

    pub fn new(label: impl Into<String>, lane: Lane, root: Action<H>) -> Self {
        Self {
            label: label.into(),
            lane,
            policy: Policy::Queued,
            parent: None,
            phase: Phase::Pending,
            root,
            reported: 0.0,
            progress_callbacks: Vec::new(),
            complete_callbacks: Vec::new(),
        }
    }

    /// Runs immediately instead of queueing behind the lane.
    pub fn bypass_queue(mut self) -> Self {
        self.policy = Policy::BypassQueue;
        self
    }

    /// Registers a callback fired whenever progress increases.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(f32) + 'static,
    {
        self.progress_callbacks.push(Box::new(callback));
        self
    }

    /// Registers a callback fired once with the completion value.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&OperationResult<H::Handle>) + 'static,
    {
        self.complete_callbacks.push(Box::new(callback));
        self
    }

    //--- Query Methods ----------------------------------------------------

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn lane(&self) -> Lane {
        self.lane
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn parent(&self) -> Option<OperationId> {
        self.parent
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn root(&self) -> &Action<H> {
        &self.root
    }

    /// Progress of the root action. Operations that have not started
    /// report zero.
    pub fn progress(&self) -> f32 {
        match self.phase {
            Phase::Pending | Phase::Queued => 0.0,
            _ => self.root.progress(),
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.root.is_cancel_requested()
    }

    //--- Scheduler Hooks --------------------------------------------------

    pub(crate) fn attach_to(&mut self, parent: Option<OperationId>) {
        self.parent = parent;
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn step(&mut self, ctx: &mut ActionContext<'_, H>) -> Step {
        self.root.step(ctx)
    }

    #[cfg(test)]
    pub(crate) fn into_root(self) -> Action<H> {
        self.root
    }

    pub(crate) fn request_cancel(&mut self) {
        self.root.cancel();
    }

    /// Fires progress callbacks if progress rose since the last call.
    pub(crate) fn take_progress_update(&mut self) -> Option<f32> {
        let progress = self.progress();
        if progress <= self.reported {
            return None;
        }
        self.reported = progress;
        for callback in &mut self.progress_callbacks {
            callback(progress);
        }
        Some(progress)
    }

    /// Moves to the terminal phase matching `outcome` and fires
    /// completion callbacks in registration order.
    pub(crate) fn finish(&mut self, outcome: Outcome) -> OperationResult<H::Handle> {
        self.phase = match outcome {
            Outcome::Cancelled => Phase::Cancelled,
            Outcome::Completed | Outcome::Skipped => Phase::Done,
        };
        let result = OperationResult {
            outcome,
            handle: self.root.produced().cloned(),
        };
        for callback in self.complete_callbacks.drain(..) {
            callback(&result);
        }
        result
    }
}

impl<H: SceneHost> fmt::Debug for Operation<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("label", &self.label)
            .field("lane", &self.lane)
            .field("policy", &self.policy)
            .field("parent", &self.parent)
            .field("phase", &self.phase)
            .field("progress", &self.progress())
            .finish()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
