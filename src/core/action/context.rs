//=========================================================================
// Action Context
//=========================================================================
//
// Everything an action may touch while it is being stepped.
//
// The scheduler builds one context per operation step from its own
// fields. There is no global state: the override registry, callback
// registry and scene tracker are owned by the scheduler and lent out
// here for the duration of a single step.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::time::Duration;

//=== Internal Dependencies ===============================================

use super::OverrideRegistry;
use crate::core::host::SceneHost;
use crate::core::operation::{Operation, OperationId, OperationStatus, Phase};
use crate::core::scene::{CallbackRegistry, SceneTracker};
use crate::core::scheduler::OperationTable;

//=== Clock ===============================================================

/// Scheduler time as seen by actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clock {
    tick: u64,
    elapsed: Duration,
    delta: Duration,
}

impl Clock {
    /// Number of ticks started so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Sum of all tick deltas.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Delta of the current tick.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub(crate) fn advance(&mut self, delta: Duration) {
        self.tick += 1;
        self.elapsed += delta;
        self.delta = delta;
    }
}

//=== ActionContext =======================================================

/// Mutable view of the scheduler lent to an action for one step.
pub struct ActionContext<'a, H: SceneHost> {
    /// The external scene host.
    pub host: &'a mut H,

    /// Process-wide override handlers. Changes are visible to the very
    /// next lookup.
    pub overrides: &'a mut OverrideRegistry<H>,

    /// Per-scene open/close callback components.
    pub callbacks: &'a mut CallbackRegistry<H>,

    /// Bookkeeping of which scenes the orchestrator has opened.
    pub scenes: &'a mut SceneTracker<H::Handle>,

    pub(crate) clock: Clock,
    pub(crate) operation: Option<OperationId>,
    pub(crate) table: &'a OperationTable<H>,
    pub(crate) spawned: &'a mut Vec<(OperationId, Operation<H>)>,
    pub(crate) cancels: &'a mut Vec<OperationId>,
    pub(crate) next_id: &'a mut u64,
}

impl<'a, H: SceneHost> ActionContext<'a, H> {
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Operation whose root action is being stepped.
    pub fn operation(&self) -> Option<OperationId> {
        self.operation
    }

    //--- Child Operations -------------------------------------------------

    /// Starts `operation` as a child of the current operation.
    ///
    /// Children bypass lane queues and start running on the next tick.
    pub fn spawn(&mut self, mut operation: Operation<H>) -> OperationId {
        let id = OperationId(*self.next_id);
        *self.next_id += 1;
        operation.attach_to(self.operation);
        self.spawned.push((id, operation));
        id
    }

    /// Requests cancellation of another operation after this step.
    pub fn cancel_operation(&mut self, id: OperationId) {
        self.cancels.push(id);
    }

    /// Status of an operation, including ones spawned during this step.
    pub fn operation_status(&self, id: OperationId) -> Option<OperationStatus<H::Handle>> {
        if self.spawned.iter().any(|(spawned, _)| *spawned == id) {
            return Some(OperationStatus {
                phase: Phase::Pending,
                progress: 0.0,
                result: None,
            });
        }
        self.table.status(id)
    }
}

//=== Test Support ========================================================

/// Owns every piece an [`ActionContext`] borrows, for driving actions in
/// unit tests without a scheduler.
#[cfg(test)]
pub(crate) struct TestBed {
    pub host: crate::core::host::SimulatedHost,
    pub overrides: OverrideRegistry<crate::core::host::SimulatedHost>,
    pub callbacks: CallbackRegistry<crate::core::host::SimulatedHost>,
    pub scenes: SceneTracker<u64>,
    pub clock: Clock,
    table: OperationTable<crate::core::host::SimulatedHost>,
    spawned: Vec<(OperationId, Operation<crate::core::host::SimulatedHost>)>,
    cancels: Vec<OperationId>,
    next_id: u64,
}

#[cfg(test)]
impl TestBed {
    pub fn new() -> Self {
        Self {
            host: crate::core::host::SimulatedHost::new(),
            overrides: OverrideRegistry::new(),
            callbacks: CallbackRegistry::new(),
            scenes: SceneTracker::new(),
            clock: Clock::default(),
            table: OperationTable::new(8),
            spawned: Vec::new(),
            cancels: Vec::new(),
            next_id: 1,
        }
    }

    pub fn ctx(&mut self) -> ActionContext<'_, crate::core::host::SimulatedHost> {
        ActionContext {
            host: &mut self.host,
            overrides: &mut self.overrides,
            callbacks: &mut self.callbacks,
            scenes: &mut self.scenes,
            clock: self.clock,
            operation: None,
            table: &self.table,
            spawned: &mut self.spawned,
            cancels: &mut self.cancels,
            next_id: &mut self.next_id,
        }
    }

    /// Advances the clock and host, then steps `action` once.
    pub fn tick(
        &mut self,
        action: &mut super::Action<crate::core::host::SimulatedHost>,
    ) -> super::Step {
        use crate::core::host::SceneHost;

        let delta = Duration::from_millis(16);
        self.clock.advance(delta);
        self.host.update(delta);
        action.step(&mut self.ctx())
    }

    /// Ticks until `action` is done. Returns the number of steps taken.
    pub fn run(
        &mut self,
        action: &mut super::Action<crate::core::host::SimulatedHost>,
        max_ticks: usize,
    ) -> usize {
        for n in 1..=max_ticks {
            if let super::Step::Done(_) = self.tick(action) {
                return n;
            }
        }
        panic!("action did not finish within {max_ticks} ticks");
    }
}
