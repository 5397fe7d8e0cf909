//=========================================================================
// Scene Callbacks
//=========================================================================
//
// Components that want to run work when their scene opens or closes.
//
// Architecture:
//   CallbackRegistry
//     └─ callbacks: HashMap<SceneId, Vec<Box<dyn SceneCallback>>>
//
// Flow:
//   dispatch action → collect(scene, event) → run returned actions in order
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::fmt;

//=== Internal Dependencies ===============================================

use crate::core::action::Action;
use crate::core::host::{SceneHost, SceneId};

//=== SceneEvent ==========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneEvent {
    Open,
    Close,
}

//=== SceneCallback Trait =================================================

/// Hooks invoked when the scene a component belongs to opens or closes.
///
/// Each hook may return an action, which the dispatcher runs to
/// completion before moving on to the next component. Both hooks default
/// to doing nothing, so implement only what you need:
///
/// ```rust
/// # use stagehand::prelude::*;
/// struct FadeIn;
///
/// impl SceneCallback<SimulatedHost> for FadeIn {
///     fn on_scene_open(&mut self, _scene: &SceneId) -> Option<Action<SimulatedHost>> {
///         Some(Action::leaf(Wait::ticks(10)))
///     }
/// }
/// ```
pub trait SceneCallback<H: SceneHost> {
    /// Called after the scene finished loading.
    fn on_scene_open(&mut self, _scene: &SceneId) -> Option<Action<H>> {
        None
    }

    /// Called before the scene is unloaded.
    fn on_scene_close(&mut self, _scene: &SceneId) -> Option<Action<H>> {
        None
    }
}

//=== CallbackRegistry ====================================================

pub struct CallbackRegistry<H: SceneHost> {
    callbacks: HashMap<SceneId, Vec<Box<dyn SceneCallback<H>>>>,
}

impl<H: SceneHost> CallbackRegistry<H> {
    pub fn new() -> Self {
        Self {
            callbacks: HashMap::new(),
        }
    }

    /// Attaches a component to `scene`. Components run in registration order.
    pub fn register<C>(&mut self, scene: impl Into<SceneId>, callback: C)
    where
        C: SceneCallback<H> + 'static,
    {
        self.callbacks
            .entry(scene.into())
            .or_default()
            .push(Box::new(callback));
    }

    /// Detaches every component of `scene`.
    pub fn clear_scene(&mut self, scene: &SceneId) -> usize {
        self.callbacks.remove(scene).map_or(0, |v| v.len())
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    pub fn count(&self, scene: &SceneId) -> usize {
        self.callbacks.get(scene).map_or(0, Vec::len)
    }

    /// Invokes the hook for `event` on every component of `scene` and
    /// returns the actions they asked to run.
    pub fn collect(&mut self, scene: &SceneId, event: SceneEvent) -> Vec<Action<H>> {
        let Some(components) = self.callbacks.get_mut(scene) else {
            return Vec::new();
        };
        components
            .iter_mut()
            .filter_map(|component| match event {
                SceneEvent::Open => component.on_scene_open(scene),
                SceneEvent::Close => component.on_scene_close(scene),
            })
            .collect()
    }
}

impl<H: SceneHost> Default for CallbackRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: SceneHost> fmt::Debug for CallbackRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.callbacks.iter().map(|(k, v)| (k, v.len())))
            .finish()
    }
}

//=== Tests ===============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::Wait;
    use crate::core::host::SimulatedHost;

    struct OpenOnly;

    impl SceneCallback<SimulatedHost> for OpenOnly {
        fn on_scene_open(&mut self, _scene: &SceneId) -> Option<Action<SimulatedHost>> {
            Some(Action::leaf(Wait::ticks(1)))
        }
    }

    struct Silent;

    impl SceneCallback<SimulatedHost> for Silent {}

    #[test]
    fn unknown_scene_collects_nothing() {
        let mut registry = CallbackRegistry::<SimulatedHost>::new();
        assert!(registry.collect(&SceneId::from("a"), SceneEvent::Open).is_empty());
    }

    #[test]
    fn collect_filters_by_event() {
        let mut registry = CallbackRegistry::<SimulatedHost>::new();
        registry.register("a", OpenOnly);
        registry.register("a", Silent);
        registry.register("a", OpenOnly);

        let scene = SceneId::from("a");
        assert_eq!(registry.count(&scene), 3);
        assert_eq!(registry.collect(&scene, SceneEvent::Open).len(), 2);
        assert!(registry.collect(&scene, SceneEvent::Close).is_empty());
    }

    #[test]
    fn clear_scene_detaches_components() {
        let mut registry = CallbackRegistry::<SimulatedHost>::new();
        registry.register("a", Silent);
        registry.register("b", Silent);

        assert_eq!(registry.clear_scene(&SceneId::from("a")), 1);
        assert_eq!(registry.count(&SceneId::from("a")), 0);
        registry.clear();
        assert_eq!(registry.count(&SceneId::from("b")), 0);
    }
}
