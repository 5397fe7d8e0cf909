//=========================================================================
// Scheduler
//=========================================================================
//
// Owns every operation and drives them cooperatively on a single thread.
//
// Architecture:
//   Scheduler
//     ├─ host, overrides, callbacks, scenes   lent to actions per step
//     ├─ table: OperationTable                live operations + history
//     ├─ lanes: HashMap<Lane, LaneState>      active slot + FIFO queue
//     ├─ running: Vec<OperationId>            start order
//     └─ events: EventBus                     lifecycle fan-out
//
// Each tick:
//  1. Advance the clock and let the host make progress
//  2. Step every running operation once, in start order
//  3. Finish operations whose root is done and free their lane
//  4. Promote queued heads of freed lanes (first stepped next tick)
//  5. Start child operations and apply cancel requests raised by actions
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use log::{debug, info, warn};

//=== Module Declarations =================================================

mod builder;
mod events;
mod lane_queue;
mod table;

//=== Public API ==========================================================

pub use builder::SchedulerBuilder;
pub use events::{EventBus, EventKind, OperationEvent};
pub use lane_queue::LaneQueue;
pub(crate) use table::OperationTable;

//=== Internal Dependencies ===============================================

use crate::core::action::{ActionContext, Clock, OverrideRegistry, Outcome, Step};
use crate::core::host::{SceneHost, SceneId};
use crate::core::operation::{
    Lane, Operation, OperationId, OperationResult, OperationStatus, Phase, Policy,
};
use crate::core::scene::{CallbackRegistry, SceneTracker};
use crate::error::{Result, SchedulerError};

/// Ticks granted to running work to observe cancellation on shutdown.
const SHUTDOWN_TICKS: usize = 64;

//=== LaneState ===========================================================

#[derive(Debug, Default)]
struct LaneState {
    active: Option<OperationId>,
    queue: LaneQueue,
}

fn notify<H: SceneHost>(events: &mut EventBus, id: OperationId, op: &Operation<H>, kind: EventKind) {
    if !events.has_subscribers() {
        return;
    }
    events.publish(OperationEvent {
        id,
        label: op.label().to_owned(),
        lane: op.lane(),
        kind,
    });
}

//=== Scheduler ===========================================================

/// Lane-based operation scheduler.
///
/// Operations on the same lane run strictly one after another in
/// submission order; different lanes run side by side. Bypassing and
/// child operations start immediately without touching any lane.
///
/// Create via [`SchedulerBuilder`].
pub struct Scheduler<H: SceneHost> {
    host: H,
    overrides: OverrideRegistry<H>,
    callbacks: CallbackRegistry<H>,
    scenes: SceneTracker<H::Handle>,
    table: OperationTable<H>,
    lanes: HashMap<Lane, LaneState>,
    running: Vec<OperationId>,
    events: EventBus,
    clock: Clock,
    next_id: u64,
    tps: f64,
}

impl<H: SceneHost> Scheduler<H> {
    pub(crate) fn new(host: H, tps: f64, event_capacity: usize, history_capacity: usize) -> Self {
        Self {
            host,
            overrides: OverrideRegistry::new(),
            callbacks: CallbackRegistry::new(),
            scenes: SceneTracker::new(),
            table: OperationTable::new(history_capacity),
            lanes: HashMap::new(),
            running: Vec::new(),
            events: EventBus::new(event_capacity),
            clock: Clock::default(),
            next_id: 1,
            tps,
        }
    }

    //--- Submission -------------------------------------------------------

    /// Hands `operation` to the scheduler.
    ///
    /// Starts it right away if its lane is free or it bypasses queues,
    /// otherwise queues it behind the lane's earlier operations. Its root
    /// action is first stepped on the next tick.
    pub fn submit(&mut self, mut operation: Operation<H>) -> OperationId {
        let id = OperationId(self.next_id);
        self.next_id += 1;

        if operation.policy() == Policy::BypassQueue {
            debug!("{} '{}' bypasses the {:?} queue", id, operation.label(), operation.lane());
            self.start(id, operation);
            return id;
        }

        let lane = self.lanes.entry(operation.lane()).or_default();
        if lane.active.is_none() && lane.queue.is_empty() {
            lane.active = Some(id);
            self.start(id, operation);
        } else {
            lane.queue.push(id);
            operation.set_phase(Phase::Queued);
            debug!("{} '{}' queued on {:?}", id, operation.label(), operation.lane());
            notify(&mut self.events, id, &operation, EventKind::Queued);
            self.table.insert(id, operation);
        }
        id
    }

    fn start(&mut self, id: OperationId, mut operation: Operation<H>) {
        operation.set_phase(Phase::Running);
        debug!("{} '{}' started", id, operation.label());
        notify(&mut self.events, id, &operation, EventKind::Started);
        self.running.push(id);
        self.table.insert(id, operation);
    }

    //--- Cancellation -----------------------------------------------------

    /// Requests cancellation of an operation and its children.
    ///
    /// Queued operations finish as cancelled immediately and never start.
    /// Running ones observe the request at their next step.
    pub fn cancel(&mut self, id: OperationId) -> Result<()> {
        if self.table.finished(id).is_some() {
            return Err(SchedulerError::AlreadyFinished(id));
        }
        let Some(phase) = self.table.get(id).map(Operation::phase) else {
            warn!("Cancel requested for unknown operation {}", id);
            return Err(SchedulerError::UnknownOperation(id));
        };

        if phase == Phase::Queued {
            let Some(operation) = self.table.remove(id) else {
                return Err(SchedulerError::UnknownOperation(id));
            };
            if let Some(lane) = self.lanes.get_mut(&operation.lane()) {
                lane.queue.remove(id);
            }
            debug!("{} cancelled while queued", id);
            self.finish(id, operation, Outcome::Cancelled);
            return Ok(());
        }

        if let Some(operation) = self.table.get_mut(id) {
            debug!("{} cancel requested", id);
            operation.request_cancel();
        }
        for child in self.table.children_of(id) {
            // Children that finished meanwhile need no cancel.
            let _ = self.cancel(child);
        }
        Ok(())
    }

    //--- Tick -------------------------------------------------------------

    /// Advances every running operation by one step.
    pub fn tick(&mut self, delta: Duration) {
        self.clock.advance(delta);
        self.host.update(delta);

        let mut spawned = Vec::new();
        let mut cancels = Vec::new();

        for id in self.running.clone() {
            let Some(mut operation) = self.table.remove(id) else {
                continue;
            };

            let mut ctx = ActionContext {
                host: &mut self.host,
                overrides: &mut self.overrides,
                callbacks: &mut self.callbacks,
                scenes: &mut self.scenes,
                clock: self.clock,
                operation: Some(id),
                table: &self.table,
                spawned: &mut spawned,
                cancels: &mut cancels,
                next_id: &mut self.next_id,
            };
            let step = operation.step(&mut ctx);

            if let Some(progress) = operation.take_progress_update() {
                notify(&mut self.events, id, &operation, EventKind::Progress(progress));
            }
            match step {
                Step::Continue => self.table.insert(id, operation),
                Step::Done(outcome) => self.finish(id, operation, outcome),
            }
        }

        for (id, child) in spawned {
            self.start(id, child);
        }
        for id in cancels {
            if let Err(err) = self.cancel(id) {
                debug!("Ignoring cancel from action: {}", err);
            }
        }
    }

    fn finish(&mut self, id: OperationId, mut operation: Operation<H>, outcome: Outcome) {
        self.running.retain(|running| *running != id);

        let result = operation.finish(outcome);
        debug!("{} '{}' finished: {}", id, operation.label(), outcome);
        notify(&mut self.events, id, &operation, EventKind::Finished(outcome));
        self.table.record(
            id,
            operation.parent(),
            OperationStatus {
                phase: operation.phase(),
                progress: operation.root().progress(),
                result: Some(result),
            },
        );

        let lane = operation.lane();
        let freed = match self.lanes.get_mut(&lane) {
            Some(state) if state.active == Some(id) => {
                state.active = None;
                true
            }
            _ => false,
        };
        if freed {
            self.promote(lane);
        }
    }

    fn promote(&mut self, lane: Lane) {
        let Some(state) = self.lanes.get_mut(&lane) else {
            return;
        };
        if state.active.is_some() {
            return;
        }
        while let Some(next) = state.queue.pop() {
            if let Some(operation) = self.table.remove(next) {
                state.active = Some(next);
                self.start(next, operation);
                return;
            }
            warn!("Queued operation {} vanished from {:?}", next, lane);
        }
    }

    //--- Driving ----------------------------------------------------------

    /// Fixed delta matching the configured tick rate.
    pub fn fixed_delta(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tps)
    }

    /// Ticks with the fixed delta until idle, without sleeping.
    ///
    /// Returns the number of ticks run, at most `max_ticks`.
    pub fn step_until_idle(&mut self, max_ticks: usize) -> usize {
        let delta = self.fixed_delta();
        let mut ticks = 0;
        while !self.is_idle() && ticks < max_ticks {
            self.tick(delta);
            ticks += 1;
        }
        ticks
    }

    /// Ticks at the configured rate until idle, sleeping out the rest of
    /// each frame.
    ///
    /// Returns the number of ticks run, at most `max_ticks`.
    pub fn run_until_idle(&mut self, max_ticks: usize) -> usize {
        let frame_duration = self.fixed_delta();
        let mut ticks = 0;
        while !self.is_idle() && ticks < max_ticks {
            let frame_start = Instant::now();
            self.tick(frame_duration);
            ticks += 1;

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                thread::sleep(frame_duration - elapsed);
            }
        }
        ticks
    }

    /// Cancels all work and clears the override and callback registries.
    ///
    /// Queued operations are cancelled outright. Running ones get a
    /// bounded number of ticks to observe the request.
    pub fn shutdown(&mut self) {
        info!("Shutting down scheduler ({} running)", self.running.len());

        let queued: Vec<OperationId> = self
            .lanes
            .values()
            .flat_map(|lane| lane.queue.iter().copied())
            .collect();
        for id in queued.into_iter().chain(self.running.clone()) {
            let _ = self.cancel(id);
        }

        self.step_until_idle(SHUTDOWN_TICKS);
        if !self.is_idle() {
            warn!(
                "{} operation(s) still running after shutdown",
                self.running.len()
            );
        }

        self.overrides.clear();
        self.callbacks.clear();
        info!("Scheduler shutdown complete");
    }

    /// Untracks scenes the host no longer reports as loaded.
    pub fn reconcile(&mut self) -> Vec<SceneId> {
        let live = self.host.active_scenes();
        self.scenes.retain_live(&live)
    }

    //--- Query Methods ----------------------------------------------------

    pub fn status(&self, id: OperationId) -> Option<OperationStatus<H::Handle>> {
        self.table.status(id)
    }

    pub fn phase(&self, id: OperationId) -> Option<Phase> {
        self.table.status(id).map(|status| status.phase)
    }

    pub fn progress(&self, id: OperationId) -> Option<f32> {
        self.table.status(id).map(|status| status.progress)
    }

    /// Completion value, once the operation finished.
    pub fn result(&self, id: OperationId) -> Option<OperationResult<H::Handle>> {
        self.table.status(id).and_then(|status| status.result)
    }

    /// No operation is running or queued.
    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.lanes.values().all(|lane| lane.queue.is_empty())
    }

    /// Operation currently holding `lane`.
    pub fn active(&self, lane: Lane) -> Option<OperationId> {
        self.lanes.get(&lane).and_then(|state| state.active)
    }

    /// Operations waiting on `lane`, head first.
    pub fn queued(&self, lane: Lane) -> Vec<OperationId> {
        self.lanes
            .get(&lane)
            .map(|state| state.queue.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Running operations in start order.
    pub fn running(&self) -> &[OperationId] {
        &self.running
    }

    //--- Accessors --------------------------------------------------------

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn overrides(&self) -> &OverrideRegistry<H> {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut OverrideRegistry<H> {
        &mut self.overrides
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackRegistry<H> {
        &mut self.callbacks
    }

    pub fn scenes(&self) -> &SceneTracker<H::Handle> {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut SceneTracker<H::Handle> {
        &mut self.scenes
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn tps(&self) -> f64 {
        self.tps
    }

    /// Receives lifecycle events of every operation from now on.
    pub fn subscribe(&mut self) -> Receiver<OperationEvent> {
        self.events.subscribe()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{Action, Wait};
    use crate::core::host::SimulatedHost;
    use std::cell::Cell;
    use std::rc::Rc;

    type Op = Operation<SimulatedHost>;

    fn scheduler() -> Scheduler<SimulatedHost> {
        SchedulerBuilder::new().build(SimulatedHost::new())
    }

    fn waiting(label: &str, lane: Lane, ticks: u32) -> Op {
        Op::new(label, lane, Action::leaf(Wait::ticks(ticks)))
    }

    fn tick(scheduler: &mut Scheduler<SimulatedHost>) {
        let delta = scheduler.fixed_delta();
        scheduler.tick(delta);
    }

    #[test]
    fn first_operation_on_free_lane_starts_immediately() {
        let mut scheduler = scheduler();
        let id = scheduler.submit(waiting("a", Lane::Standalone, 1));

        assert_eq!(scheduler.phase(id), Some(Phase::Running));
        assert_eq!(scheduler.active(Lane::Standalone), Some(id));
        assert_eq!(scheduler.progress(id), Some(0.0));
    }

    #[test]
    fn same_lane_runs_in_submission_order() {
        let mut scheduler = scheduler();
        let a = scheduler.submit(waiting("a", Lane::Standalone, 1));
        let b = scheduler.submit(waiting("b", Lane::Standalone, 1));

        assert_eq!(scheduler.phase(b), Some(Phase::Queued));
        assert_eq!(scheduler.queued(Lane::Standalone), vec![b]);

        tick(&mut scheduler);
        tick(&mut scheduler);
        assert_eq!(scheduler.phase(a), Some(Phase::Done));
        assert_eq!(scheduler.phase(b), Some(Phase::Running));
        assert_eq!(scheduler.progress(b), Some(0.0));

        scheduler.step_until_idle(10);
        assert_eq!(scheduler.phase(b), Some(Phase::Done));
        assert!(scheduler.is_idle());
    }

    #[test]
    fn lanes_run_side_by_side() {
        let mut scheduler = scheduler();
        let a = scheduler.submit(waiting("a", Lane::Standalone, 3));
        let b = scheduler.submit(waiting("b", Lane::Collection, 3));

        assert_eq!(scheduler.phase(a), Some(Phase::Running));
        assert_eq!(scheduler.phase(b), Some(Phase::Running));
        assert_eq!(scheduler.running(), &[a, b]);
    }

    #[test]
    fn bypass_ignores_busy_lane() {
        let mut scheduler = scheduler();
        let a = scheduler.submit(waiting("a", Lane::Collection, 3));
        let b = scheduler.submit(waiting("b", Lane::Collection, 1).bypass_queue());

        assert_eq!(scheduler.phase(b), Some(Phase::Running));
        assert_eq!(scheduler.active(Lane::Collection), Some(a));
        assert!(scheduler.queued(Lane::Collection).is_empty());
    }

    #[test]
    fn cancel_queued_operation_never_runs() {
        let mut scheduler = scheduler();
        scheduler.submit(waiting("a", Lane::Standalone, 2));
        let b = scheduler.submit(waiting("b", Lane::Standalone, 2));

        assert_eq!(scheduler.cancel(b), Ok(()));
        assert_eq!(scheduler.phase(b), Some(Phase::Cancelled));
        assert!(scheduler.queued(Lane::Standalone).is_empty());
        assert_eq!(scheduler.cancel(b), Err(SchedulerError::AlreadyFinished(b)));
    }

    #[test]
    fn cancel_running_operation_is_cooperative() {
        let mut scheduler = scheduler();
        let a = scheduler.submit(waiting("a", Lane::Standalone, 5));
        let b = scheduler.submit(waiting("b", Lane::Standalone, 1));
        tick(&mut scheduler);

        scheduler.cancel(a).unwrap();
        assert_eq!(scheduler.phase(a), Some(Phase::Running));

        tick(&mut scheduler);
        assert_eq!(scheduler.phase(a), Some(Phase::Cancelled));
        assert_eq!(scheduler.result(a).unwrap().outcome, Outcome::Cancelled);
        assert_eq!(scheduler.active(Lane::Standalone), Some(b));
    }

    #[test]
    fn cancel_unknown_operation_is_an_error() {
        let mut scheduler = scheduler();
        let id = OperationId(42);
        assert_eq!(scheduler.cancel(id), Err(SchedulerError::UnknownOperation(id)));
    }

    #[test]
    fn child_operations_cancel_with_parent() {
        let mut scheduler = scheduler();
        let parent = scheduler.submit(Op::new(
            "parent",
            Lane::Collection,
            Action::child(waiting("child", Lane::Standalone, 10)),
        ));
        tick(&mut scheduler);
        let child = *scheduler.running().last().unwrap();
        assert_ne!(child, parent);
        assert_eq!(scheduler.active(Lane::Standalone), None);

        scheduler.cancel(parent).unwrap();
        scheduler.step_until_idle(10);

        assert_eq!(scheduler.phase(parent), Some(Phase::Cancelled));
        assert_eq!(scheduler.phase(child), Some(Phase::Cancelled));
    }

    #[test]
    fn cancelled_child_cancels_parent_after_history_eviction() {
        let mut scheduler = SchedulerBuilder::new()
            .with_history_capacity(1)
            .build(SimulatedHost::new());
        let later_ran = Rc::new(Cell::new(false));
        let flag = later_ran.clone();
        let parent = scheduler.submit(Op::new(
            "parent",
            Lane::Collection,
            Action::sequence(vec![
                Action::child(waiting("child", Lane::Standalone, 10)),
                Action::from_fn(move |_, _| {
                    flag.set(true);
                    Step::Done(Outcome::Completed)
                }),
            ]),
        ));
        tick(&mut scheduler);
        let child = *scheduler.running().last().unwrap();

        scheduler.cancel(child).unwrap();
        let other = scheduler.submit(Op::new("other", Lane::Standalone, Action::noop()));
        scheduler.step_until_idle(10);

        assert_eq!(scheduler.phase(other), None);
        assert_eq!(scheduler.phase(parent), Some(Phase::Cancelled));
        assert!(!later_ran.get());
    }

    #[test]
    fn parent_mirrors_child_result() {
        let mut scheduler = scheduler();
        let root = Action::from_fn(|_, state| {
            state.produce(7);
            Step::Done(Outcome::Completed)
        });
        let parent = scheduler.submit(Op::new(
            "parent",
            Lane::Standalone,
            Action::child(Op::new("child", Lane::Standalone, root)),
        ));
        scheduler.step_until_idle(10);

        let result = scheduler.result(parent).unwrap();
        assert_eq!(result.outcome, Outcome::Completed);
        assert_eq!(result.handle, Some(7));
    }

    #[test]
    fn history_is_bounded() {
        let mut scheduler = SchedulerBuilder::new()
            .with_history_capacity(1)
            .build(SimulatedHost::new());
        let a = scheduler.submit(Op::new("a", Lane::Standalone, Action::noop()));
        let b = scheduler.submit(Op::new("b", Lane::Collection, Action::noop()));
        scheduler.step_until_idle(5);

        assert_eq!(scheduler.phase(a), None);
        assert_eq!(scheduler.phase(b), Some(Phase::Done));
    }

    #[test]
    fn shutdown_cancels_and_clears() {
        let mut scheduler = scheduler();
        scheduler
            .overrides_mut()
            .register_fn(crate::core::action::OverrideKey::load("a"), |_, _| Action::noop());
        let a = scheduler.submit(waiting("a", Lane::Standalone, 100));
        let b = scheduler.submit(waiting("b", Lane::Standalone, 100));
        tick(&mut scheduler);

        scheduler.shutdown();

        assert!(scheduler.is_idle());
        assert_eq!(scheduler.phase(a), Some(Phase::Cancelled));
        assert_eq!(scheduler.phase(b), Some(Phase::Cancelled));
        assert!(scheduler.overrides().is_empty());
    }

    #[test]
    fn events_follow_lifecycle() {
        let mut scheduler = scheduler();
        let rx = scheduler.subscribe();
        scheduler.submit(waiting("a", Lane::Standalone, 1));
        let b = scheduler.submit(waiting("b", Lane::Standalone, 0));
        scheduler.step_until_idle(10);

        let kinds: Vec<(OperationId, EventKind)> = rx.try_iter().map(|e| (e.id, e.kind)).collect();
        let for_b: Vec<EventKind> = kinds
            .iter()
            .filter(|(id, _)| *id == b)
            .map(|(_, kind)| *kind)
            .collect();
        assert_eq!(
            for_b,
            vec![
                EventKind::Queued,
                EventKind::Started,
                EventKind::Progress(1.0),
                EventKind::Finished(Outcome::Completed),
            ]
        );
    }

    #[test]
    fn clock_advances_per_tick() {
        let mut scheduler = SchedulerBuilder::new().with_tps(50.0).build(SimulatedHost::new());
        tick(&mut scheduler);
        tick(&mut scheduler);
        assert_eq!(scheduler.clock().tick(), 2);
        assert_eq!(scheduler.clock().elapsed(), Duration::from_millis(40));
    }
}
