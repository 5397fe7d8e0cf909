//=========================================================================
// Scene Host
//=========================================================================
//
// Narrow capability interface over whatever actually loads scenes.
//
// Architecture:
//   load_scene   ──load_async()───►  SceneHost
//   unload_scene ──unload_async()─►     │
//        ▲                              │
//        └────────── poll() ◄───────────┘
//
// The orchestration core never touches the scene graph directly. It issues
// requests, polls them once per tick, and validates handles before using
// them. Anything that can do those four things can drive the scheduler.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt::{self, Debug};
use std::time::Duration;

//=== Module Declarations =================================================

mod simulated;

//=== Public API ==========================================================

pub use simulated::SimulatedHost;

//=== SceneId =============================================================

/// Identifier of a loadable scene (asset path, build index name, etc.).
///
/// Also serves as the target identity for actions and override lookups.
/// An empty id is treated as a missing target.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SceneId({:?})", self.0)
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SceneId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

//=== RequestId ===========================================================

/// Token for an in-flight host request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

//=== HostProgress ========================================================

/// Status of a host request as observed by a single poll.
#[derive(Debug, Clone, PartialEq)]
pub enum HostProgress<H> {
    /// Still working. Carries the host's progress estimate in `[0, 1]`.
    Pending(f32),

    /// Load finished and the scene's root objects exist.
    Loaded(H),

    /// Unload finished.
    Unloaded,

    /// The host forgot the request (scene destroyed, id unknown, etc.).
    Lost,
}

//=== SceneHost Trait =====================================================

/// External capability that performs the actual scene work.
///
/// All calls happen on the scheduler's thread, between yield points, so
/// implementations do not need interior synchronization.
pub trait SceneHost: 'static {
    /// Opaque handle to a loaded scene.
    type Handle: Clone + PartialEq + Debug + 'static;

    /// Starts loading `scene`. Returns `None` if the host cannot load it.
    fn load_async(&mut self, scene: &SceneId) -> Option<RequestId>;

    /// Starts unloading a previously loaded scene.
    fn unload_async(&mut self, handle: &Self::Handle) -> Option<RequestId>;

    /// Reports the current state of a request.
    ///
    /// Once a terminal state has been returned the host may forget the
    /// request and answer `Lost` afterwards.
    fn poll(&mut self, request: RequestId) -> HostProgress<Self::Handle>;

    /// Whether `handle` still refers to a live scene.
    fn is_valid(&self, handle: &Self::Handle) -> bool;

    /// Handles of every scene currently loaded, in load order.
    fn active_scenes(&self) -> Vec<Self::Handle>;

    /// Called once at the start of every scheduler tick.
    fn update(&mut self, _delta: Duration) {}
}
