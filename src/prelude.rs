//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use stagehand::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Scheduler
pub use crate::core::scheduler::{EventKind, OperationEvent, Scheduler, SchedulerBuilder};
pub use crate::error::SchedulerError;

// Scene host
pub use crate::core::host::{HostProgress, RequestId, SceneHost, SceneId, SimulatedHost};

// Actions
pub use crate::core::action::{
    Action, ActionContext, ActionState, AggregateAction, OverridableAction, OverrideHandler,
    OverrideKey, OverrideKind, Outcome, Step, Task, Wait, WaitUntil,
};

// Operations
pub use crate::core::operation::{Lane, Operation, OperationId, OperationResult, Phase};

// Scene system
pub use crate::core::scene::{
    close_collection, close_scene, open_collection, open_scene, SceneCallback, SceneCollection,
    StartupSequence,
};
