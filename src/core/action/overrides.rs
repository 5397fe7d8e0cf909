//=========================================================================
// Override Registry
//=========================================================================
//
// Typed mapping from (action kind, target) to a replacement handler.
//
// Architecture:
//   OverrideRegistry
//     └─ handlers: HashMap<OverrideKey, Rc<dyn OverrideHandler>>
//
// One registry exists per scheduler and is shared by every operation it
// runs. Two operations targeting the same key see the same handler.
// Registering replaces, unregistering removes; there is no chaining.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, warn};

//=== Internal Dependencies ===============================================

use super::{Action, ActionContext};
use crate::core::host::{SceneHost, SceneId};

//=== OverrideKind ========================================================

/// Which kind of overridable action a handler replaces.
///
/// `Custom` mirrors the engine's custom input contexts: user-defined
/// overridable actions pick their own number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideKind {
    Load,
    Unload,
    Custom(u32),
}

//=== OverrideKey =========================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverrideKey {
    pub kind: OverrideKind,
    pub target: SceneId,
}

impl OverrideKey {
    pub fn new(kind: OverrideKind, target: impl Into<SceneId>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }

    pub fn load(target: impl Into<SceneId>) -> Self {
        Self::new(OverrideKind::Load, target)
    }

    pub fn unload(target: impl Into<SceneId>) -> Self {
        Self::new(OverrideKind::Unload, target)
    }
}

//=== OverrideHandler Trait ===============================================

/// Replacement for an overridable action's default body.
///
/// The returned action runs in place of the default body, with full
/// access to the context. Its progress, outcome and result become those
/// of the overridden action.
pub trait OverrideHandler<H: SceneHost> {
    fn replace(&self, target: &SceneId, ctx: &mut ActionContext<'_, H>) -> Action<H>;
}

struct FnHandler<F>(F);

impl<H, F> OverrideHandler<H> for FnHandler<F>
where
    H: SceneHost,
    F: Fn(&SceneId, &mut ActionContext<'_, H>) -> Action<H>,
{
    fn replace(&self, target: &SceneId, ctx: &mut ActionContext<'_, H>) -> Action<H> {
        (self.0)(target, ctx)
    }
}

//=== OverrideRegistry ====================================================

pub struct OverrideRegistry<H: SceneHost> {
    handlers: HashMap<OverrideKey, Rc<dyn OverrideHandler<H>>>,
}

impl<H: SceneHost> OverrideRegistry<H> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    //--- Registration -----------------------------------------------------

    /// Registers `handler` for `key`, returning the handler it replaced.
    pub fn register(
        &mut self,
        key: OverrideKey,
        handler: impl OverrideHandler<H> + 'static,
    ) -> Option<Rc<dyn OverrideHandler<H>>> {
        debug!("Registering override for {:?}", key);
        let previous = self.handlers.insert(key.clone(), Rc::new(handler));
        if previous.is_some() {
            warn!("Override for {:?} was already registered and has been replaced", key);
        }
        previous
    }

    /// Registers a closure as handler for `key`.
    pub fn register_fn<F>(&mut self, key: OverrideKey, handler: F) -> Option<Rc<dyn OverrideHandler<H>>>
    where
        F: Fn(&SceneId, &mut ActionContext<'_, H>) -> Action<H> + 'static,
    {
        self.register(key, FnHandler(handler))
    }

    /// Removes the handler for `key`. Returns `true` if one was registered.
    pub fn unregister(&mut self, key: &OverrideKey) -> bool {
        self.handlers.remove(key).is_some()
    }

    /// Removes every handler of the given kind.
    pub fn clear_kind(&mut self, kind: OverrideKind) {
        self.handlers.retain(|key, _| key.kind != kind);
    }

    /// Removes every handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    //--- Query API --------------------------------------------------------

    pub fn get(&self, key: &OverrideKey) -> Option<Rc<dyn OverrideHandler<H>>> {
        self.handlers.get(key).cloned()
    }

    pub fn contains(&self, key: &OverrideKey) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<H: SceneHost> Default for OverrideRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: SceneHost> fmt::Debug for OverrideRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::SimulatedHost;

    fn registry() -> OverrideRegistry<SimulatedHost> {
        OverrideRegistry::new()
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = registry();
        assert!(registry.is_empty());
        assert!(registry.get(&OverrideKey::load("a")).is_none());
    }

    #[test]
    fn register_replaces_previous() {
        let mut registry = registry();
        assert!(registry
            .register_fn(OverrideKey::load("a"), |_, _| Action::noop())
            .is_none());
        assert!(registry
            .register_fn(OverrideKey::load("a"), |_, _| Action::skipped())
            .is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn keys_are_scoped_by_kind() {
        let mut registry = registry();
        registry.register_fn(OverrideKey::load("a"), |_, _| Action::noop());

        assert!(registry.contains(&OverrideKey::load("a")));
        assert!(!registry.contains(&OverrideKey::unload("a")));
        assert!(!registry.contains(&OverrideKey::new(OverrideKind::Custom(0), "a")));
    }

    #[test]
    fn unregister_and_clear() {
        let mut registry = registry();
        registry.register_fn(OverrideKey::load("a"), |_, _| Action::noop());
        registry.register_fn(OverrideKey::unload("a"), |_, _| Action::noop());
        registry.register_fn(OverrideKey::unload("b"), |_, _| Action::noop());

        assert!(registry.unregister(&OverrideKey::load("a")));
        assert!(!registry.unregister(&OverrideKey::load("a")));

        registry.clear_kind(OverrideKind::Unload);
        assert!(registry.is_empty());

        registry.register_fn(OverrideKey::load("c"), |_, _| Action::noop());
        registry.clear();
        assert!(registry.is_empty());
    }
}
