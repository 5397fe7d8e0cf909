//=========================================================================
// Scheduler Builder
//=========================================================================

//=== External Dependencies ===============================================

use log::info;

//=== Internal Dependencies ===============================================

use super::Scheduler;
use crate::core::host::SceneHost;

//=== SchedulerBuilder ====================================================

/// Builder for configuring and constructing a [`Scheduler`].
///
/// # Default Values
///
/// - **TPS**: 60.0 (ticks per second for paced runs and fixed steps)
/// - **Event capacity**: 128 events per subscriber
/// - **History capacity**: 64 finished operations
///
/// # Examples
///
/// ```
/// use stagehand::prelude::*;
///
/// let mut host = SimulatedHost::new();
/// host.register_scene("menu");
///
/// let mut scheduler = SchedulerBuilder::new()
///     .with_tps(120.0)
///     .with_history_capacity(16)
///     .build(host);
///
/// let id = scheduler.submit(open_scene("menu"));
/// scheduler.step_until_idle(100);
/// assert_eq!(scheduler.phase(id), Some(Phase::Done));
/// ```
#[derive(Debug, Clone)]
pub struct SchedulerBuilder {
    tps: f64,
    event_capacity: usize,
    history_capacity: usize,
}

impl SchedulerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            tps: 60.0,
            event_capacity: 128,
            history_capacity: 64,
        }
    }

    /// Sets the tick rate.
    ///
    /// Determines the fixed delta used by [`Scheduler::step_until_idle`]
    /// and the pacing of [`Scheduler::run_until_idle`].
    ///
    /// Default: 60.0
    ///
    /// # Panics
    ///
    /// Panics if `tps` is not a positive finite number.
    pub fn with_tps(mut self, tps: f64) -> Self {
        assert!(tps > 0.0 && tps.is_finite(), "TPS must be positive, got {}", tps);
        self.tps = tps;
        self
    }

    /// Sets how many events each subscriber channel buffers.
    ///
    /// Events published while a subscriber's channel is full are dropped
    /// for that subscriber.
    ///
    /// Default: 128
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Event capacity must be positive");
        self.event_capacity = capacity;
        self
    }

    /// Sets how many finished operations stay queryable.
    ///
    /// Default: 64
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "History capacity must be positive");
        self.history_capacity = capacity;
        self
    }

    /// Builds a scheduler driving `host`.
    pub fn build<H: SceneHost>(self, host: H) -> Scheduler<H> {
        info!(
            "Building scheduler (TPS: {}, events: {}, history: {})",
            self.tps, self.event_capacity, self.history_capacity
        );
        Scheduler::new(host, self.tps, self.event_capacity, self.history_capacity)
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::SimulatedHost;

    #[test]
    fn builder_defaults() {
        let builder = SchedulerBuilder::new();
        assert_eq!(builder.tps, 60.0);
        assert_eq!(builder.event_capacity, 128);
        assert_eq!(builder.history_capacity, 64);
    }

    #[test]
    fn builder_with_tps() {
        let builder = SchedulerBuilder::new().with_tps(120.0);
        assert_eq!(builder.tps, 120.0);
    }

    #[test]
    #[should_panic(expected = "TPS must be positive")]
    fn builder_with_tps_panics_on_zero() {
        SchedulerBuilder::new().with_tps(0.0);
    }

    #[test]
    #[should_panic(expected = "TPS must be positive")]
    fn builder_with_tps_panics_on_nan() {
        SchedulerBuilder::new().with_tps(f64::NAN);
    }

    #[test]
    #[should_panic(expected = "Event capacity must be positive")]
    fn builder_with_event_capacity_panics_on_zero() {
        SchedulerBuilder::new().with_event_capacity(0);
    }

    #[test]
    #[should_panic(expected = "History capacity must be positive")]
    fn builder_with_history_capacity_panics_on_zero() {
        SchedulerBuilder::new().with_history_capacity(0);
    }

    #[test]
    fn builder_fluent_api_chaining() {
        let scheduler = SchedulerBuilder::new()
            .with_tps(30.0)
            .with_event_capacity(4)
            .with_history_capacity(2)
            .build(SimulatedHost::new());

        assert_eq!(scheduler.tps(), 30.0);
        assert!(scheduler.is_idle());
    }
}
