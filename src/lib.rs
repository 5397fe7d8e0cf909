//=========================================================================
// Stagehand Library Root
//
// Cooperative orchestration of scene operations.
//
// Responsibilities:
// - Expose the scheduler facade (`Scheduler`, `SchedulerBuilder`)
// - Expose the action model so callers can compose their own operations
// - Keep the scene host abstract so any engine can plug in
//
// Typical usage:
// ```
// use stagehand::prelude::*;
//
// let mut host = SimulatedHost::new();
// host.register_scene("level");
//
// let mut scheduler = SchedulerBuilder::new().build(host);
// let id = scheduler.submit(open_scene("level"));
// scheduler.step_until_idle(100);
//
// assert_eq!(scheduler.phase(id), Some(Phase::Done));
// ```
//
//=========================================================================

//--- Public Modules ------------------------------------------------------
//
// `core` holds every subsystem. Most applications only need the
// re-exports below and the prelude.
//
pub mod core;
pub mod error;
pub mod prelude;

//--- Public Exports ------------------------------------------------------

pub use crate::core::scheduler::{Scheduler, SchedulerBuilder};
pub use error::SchedulerError;
