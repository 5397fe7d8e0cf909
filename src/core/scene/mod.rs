//=========================================================================
// Scene System
//=========================================================================
//
// Scene bookkeeping and the scene workflows built on top of actions.
//
// Architecture:
//   SceneTracker        open scenes, persistent flags, loading screen,
//                       open collection
//   CallbackRegistry    per-scene SceneCallback components
//   actions             load / unload / callbacks / loading screen
//   operations          open & close scene, collections, startup
//
// Flow:
//   open_scene op → load_scene → tracker.mark_open → open callbacks
//   close_scene op → close callbacks → unload_scene → tracker.mark_closed
//
//=========================================================================

//=== Module Declarations =================================================

mod actions;
mod callbacks;
mod operations;
mod tracker;

//=== Public API ==========================================================

pub use actions::{
    dispatch_callbacks, hide_loading_screen, load_scene, reconcile, show_loading_screen,
    unload_scene,
};
pub use callbacks::{CallbackRegistry, SceneCallback, SceneEvent};
pub use operations::{close_collection, close_scene, open_collection, open_scene, StartupSequence};
pub use tracker::{OpenCollection, SceneCollection, SceneTracker};

/// Composite scene actions, for embedding scene work in custom operations.
pub mod composite {
    pub use super::actions::{close_scene, open_scene};
}
