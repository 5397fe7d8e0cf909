//=========================================================================
// Scene Tracker
//=========================================================================
//
// Records which scenes the orchestrator has opened and with what handle.
//
// Scenes are kept in open order. Unload actions resolve their handle
// here at execution time, so a close queued before the matching open
// finished still finds the right scene.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashSet;
use std::fmt::Debug;

use log::{debug, warn};

//=== Internal Dependencies ===============================================

use crate::core::host::SceneId;

//=== SceneCollection =====================================================

/// Named, ordered set of scenes opened and closed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneCollection {
    name: String,
    scenes: Vec<SceneId>,
    loading_screen: Option<SceneId>,
}

impl SceneCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenes: Vec::new(),
            loading_screen: None,
        }
    }

    /// Appends a scene. Duplicates are ignored.
    pub fn with_scene(mut self, scene: impl Into<SceneId>) -> Self {
        let scene = scene.into();
        if !self.scenes.contains(&scene) {
            self.scenes.push(scene);
        }
        self
    }

    /// Scene shown while this collection is being switched to.
    pub fn with_loading_screen(mut self, scene: impl Into<SceneId>) -> Self {
        self.loading_screen = Some(scene.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scenes(&self) -> &[SceneId] {
        &self.scenes
    }

    pub fn loading_screen(&self) -> Option<&SceneId> {
        self.loading_screen.as_ref()
    }

    pub fn contains(&self, scene: &SceneId) -> bool {
        self.scenes.contains(scene)
    }
}

//=== Tracked Entries =====================================================

#[derive(Debug, Clone)]
struct OpenScene<Hd> {
    scene: SceneId,
    handle: Hd,
}

/// Collection currently open, with the scenes it opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenCollection {
    pub name: String,
    pub scenes: Vec<SceneId>,
}

//=== SceneTracker ========================================================

#[derive(Debug)]
pub struct SceneTracker<Hd> {
    open: Vec<OpenScene<Hd>>,
    persistent: HashSet<SceneId>,
    loading_screen: Option<SceneId>,
    collection: Option<OpenCollection>,
}

impl<Hd: Clone + PartialEq + Debug> SceneTracker<Hd> {
    pub fn new() -> Self {
        Self {
            open: Vec::new(),
            persistent: HashSet::new(),
            loading_screen: None,
            collection: None,
        }
    }

    //--- Open Scenes ------------------------------------------------------

    /// Records `scene` as open with `handle`, replacing an older entry.
    pub fn mark_open(&mut self, scene: SceneId, handle: Hd) {
        if let Some(entry) = self.open.iter_mut().find(|e| e.scene == scene) {
            warn!("Scene {} was already tracked, replacing handle", scene);
            entry.handle = handle;
            return;
        }
        debug!("Tracking {} as {:?}", scene, handle);
        self.open.push(OpenScene { scene, handle });
    }

    /// Forgets `scene`, returning its handle.
    pub fn mark_closed(&mut self, scene: &SceneId) -> Option<Hd> {
        let pos = self.open.iter().position(|e| &e.scene == scene)?;
        debug!("Untracking {}", scene);
        if self.loading_screen.as_ref() == Some(scene) {
            self.loading_screen = None;
        }
        Some(self.open.remove(pos).handle)
    }

    pub fn handle_of(&self, scene: &SceneId) -> Option<&Hd> {
        self.open.iter().find(|e| &e.scene == scene).map(|e| &e.handle)
    }

    pub fn scene_of(&self, handle: &Hd) -> Option<&SceneId> {
        self.open.iter().find(|e| &e.handle == handle).map(|e| &e.scene)
    }

    pub fn is_open(&self, scene: &SceneId) -> bool {
        self.handle_of(scene).is_some()
    }

    /// Open scenes in open order.
    pub fn open_scenes(&self) -> impl Iterator<Item = &SceneId> {
        self.open.iter().map(|e| &e.scene)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Drops entries whose handle is not in `live`. Returns the dropped
    /// scene ids.
    pub fn retain_live(&mut self, live: &[Hd]) -> Vec<SceneId> {
        let mut dropped = Vec::new();
        self.open.retain(|e| {
            let keep = live.contains(&e.handle);
            if !keep {
                dropped.push(e.scene.clone());
            }
            keep
        });
        if let Some(screen) = &self.loading_screen {
            if dropped.contains(screen) {
                self.loading_screen = None;
            }
        }
        dropped
    }

    //--- Persistence ------------------------------------------------------

    /// Marks a scene as surviving collection switches.
    pub fn set_persistent(&mut self, scene: impl Into<SceneId>, persistent: bool) {
        let scene = scene.into();
        if persistent {
            self.persistent.insert(scene);
        } else {
            self.persistent.remove(&scene);
        }
    }

    pub fn is_persistent(&self, scene: &SceneId) -> bool {
        self.persistent.contains(scene)
    }

    //--- Loading Screen ---------------------------------------------------

    pub fn loading_screen(&self) -> Option<&SceneId> {
        self.loading_screen.as_ref()
    }

    pub fn set_loading_screen(&mut self, scene: Option<SceneId>) {
        self.loading_screen = scene;
    }

    //--- Collection -------------------------------------------------------

    pub fn open_collection(&self) -> Option<&OpenCollection> {
        self.collection.as_ref()
    }

    pub fn set_open_collection(&mut self, collection: Option<OpenCollection>) {
        self.collection = collection;
    }

    /// Forgets everything except persistence flags.
    pub fn clear(&mut self) {
        self.open.clear();
        self.loading_screen = None;
        self.collection = None;
    }
}

impl<Hd: Clone + PartialEq + Debug> Default for SceneTracker<Hd> {
    fn default() -> Self {
        Self::new()
    }
}

//=== Tests ===============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SceneId {
        SceneId::from(s)
    }

    #[test]
    fn collection_ignores_duplicates() {
        let collection = SceneCollection::new("level")
            .with_scene("a")
            .with_scene("b")
            .with_scene("a")
            .with_loading_screen("loading");

        assert_eq!(collection.scenes(), &[id("a"), id("b")]);
        assert_eq!(collection.loading_screen(), Some(&id("loading")));
        assert!(collection.contains(&id("b")));
    }

    #[test]
    fn open_and_close_round() {
        let mut tracker = SceneTracker::<u64>::new();
        tracker.mark_open(id("a"), 1);
        tracker.mark_open(id("b"), 2);

        assert_eq!(tracker.handle_of(&id("b")), Some(&2));
        assert_eq!(tracker.scene_of(&1), Some(&id("a")));
        assert_eq!(tracker.open_scenes().cloned().collect::<Vec<_>>(), vec![id("a"), id("b")]);

        assert_eq!(tracker.mark_closed(&id("a")), Some(1));
        assert_eq!(tracker.mark_closed(&id("a")), None);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn reopen_replaces_handle() {
        let mut tracker = SceneTracker::<u64>::new();
        tracker.mark_open(id("a"), 1);
        tracker.mark_open(id("a"), 7);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.handle_of(&id("a")), Some(&7));
    }

    #[test]
    fn closing_loading_screen_clears_slot() {
        let mut tracker = SceneTracker::<u64>::new();
        tracker.mark_open(id("loading"), 3);
        tracker.set_loading_screen(Some(id("loading")));

        tracker.mark_closed(&id("loading"));
        assert!(tracker.loading_screen().is_none());
    }

    #[test]
    fn retain_live_drops_destroyed() {
        let mut tracker = SceneTracker::<u64>::new();
        tracker.mark_open(id("a"), 1);
        tracker.mark_open(id("b"), 2);
        tracker.mark_open(id("loading"), 3);
        tracker.set_loading_screen(Some(id("loading")));

        let dropped = tracker.retain_live(&[2]);

        assert_eq!(dropped, vec![id("a"), id("loading")]);
        assert!(tracker.loading_screen().is_none());
        assert!(tracker.is_open(&id("b")));
    }

    #[test]
    fn persistence_survives_clear() {
        let mut tracker = SceneTracker::<u64>::new();
        tracker.set_persistent("hud", true);
        tracker.mark_open(id("hud"), 1);
        tracker.clear();

        assert!(tracker.is_empty());
        assert!(tracker.is_persistent(&id("hud")));
        tracker.set_persistent("hud", false);
        assert!(!tracker.is_persistent(&id("hud")));
    }
}
