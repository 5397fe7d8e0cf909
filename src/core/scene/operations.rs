//=========================================================================
// Scene Operations
//=========================================================================
//
// Ready-made operations for the scene workflows:
//
//   open_scene / close_scene       Standalone lane
//   open_collection                Collection lane
//   close_collection               Collection lane
//   StartupSequence                bypasses queues, nests child operations
//
// Which scenes to close is decided when the operation starts, not when
// it is built, so queued operations see the effects of earlier ones.
//
//=========================================================================

//=== External Dependencies ===============================================

use log::debug;

//=== Internal Dependencies ===============================================

use super::actions;
use super::{OpenCollection, SceneCollection};
use crate::core::action::{Action, AggregateAction, Outcome, Step};
use crate::core::host::{SceneHost, SceneId};
use crate::core::operation::{Lane, Operation};

//=== Single Scenes =======================================================

/// Loads `scene` and runs its open callbacks. The result is the scene
/// handle.
pub fn open_scene<H: SceneHost>(scene: impl Into<SceneId>) -> Operation<H> {
    let scene = scene.into();
    Operation::new(
        format!("open {scene}"),
        Lane::Standalone,
        actions::open_scene(scene),
    )
}

/// Runs the close callbacks of `scene` and unloads it.
pub fn close_scene<H: SceneHost>(scene: impl Into<SceneId>) -> Operation<H> {
    let scene = scene.into();
    Operation::new(
        format!("close {scene}"),
        Lane::Standalone,
        actions::close_scene(scene),
    )
}

//=== Collections =========================================================

/// Closes every open scene that is neither persistent, part of `keep`,
/// nor the active loading screen.
fn close_others<H: SceneHost>(keep: Vec<SceneId>) -> Action<H> {
    Action::<H>::deferred(move |ctx| {
        let closing: Vec<SceneId> = ctx
            .scenes
            .open_scenes()
            .filter(|scene| {
                !keep.contains(scene)
                    && !ctx.scenes.is_persistent(scene)
                    && ctx.scenes.loading_screen() != Some(*scene)
            })
            .cloned()
            .collect();
        debug!("Closing {} scene(s) outside the collection", closing.len());
        Action::sequence(closing.into_iter().map(|scene| actions::close_scene(scene)))
    })
}

fn collection_root<H: SceneHost>(collection: &SceneCollection, with_loading_screen: bool) -> Action<H> {
    let loading_screen = collection
        .loading_screen()
        .filter(|_| with_loading_screen)
        .cloned();
    let name = collection.name().to_owned();
    let scenes = collection.scenes().to_vec();

    let mut steps = Vec::with_capacity(scenes.len() + 4);
    steps.push(actions::show_loading_screen(loading_screen.clone()));
    steps.push(close_others(scenes.clone()));
    steps.extend(scenes.iter().map(|scene| actions::open_scene(scene.clone())));
    steps.push(Action::<H>::from_fn(move |ctx, _| {
        let opened = scenes
            .iter()
            .filter(|scene| ctx.scenes.is_open(scene))
            .cloned()
            .collect();
        ctx.scenes.set_open_collection(Some(OpenCollection {
            name: name.clone(),
            scenes: opened,
        }));
        Step::Done(Outcome::Completed)
    }));
    if loading_screen.is_some() {
        steps.push(actions::hide_loading_screen());
    }

    // A collection has no single resulting scene.
    Action::aggregate(AggregateAction::from_actions(steps).on_done(|_| None))
}

/// Switches to `collection`.
///
/// Shows the collection's loading screen, closes open scenes that are
/// not part of the collection (persistent scenes stay), opens the
/// missing collection scenes, records the collection as open and hides
/// the loading screen again.
pub fn open_collection<H: SceneHost>(collection: &SceneCollection) -> Operation<H> {
    Operation::new(
        format!("open collection {}", collection.name()),
        Lane::Collection,
        collection_root(collection, true),
    )
}

/// Closes the non-persistent scenes of the open collection.
pub fn close_collection<H: SceneHost>() -> Operation<H> {
    let root = Action::<H>::deferred(|ctx| {
        let Some(collection) = ctx.scenes.open_collection().cloned() else {
            return Action::skipped();
        };
        debug!("Closing collection {}", collection.name);
        let closing: Vec<SceneId> = collection
            .scenes
            .into_iter()
            .filter(|scene| !ctx.scenes.is_persistent(scene))
            .collect();

        let mut steps: Vec<Action<H>> = closing
            .into_iter()
            .map(|scene| actions::close_scene(scene))
            .collect();
        steps.push(Action::<H>::from_fn(|ctx, _| {
            ctx.scenes.set_open_collection(None);
            Step::Done(Outcome::Completed)
        }));
        Action::sequence(steps)
    });
    Operation::new("close collection", Lane::Collection, root)
}

//=== Startup =============================================================

/// Boot sequence run once when the application starts.
///
/// Builds a queue-bypassing operation that first drops tracked scenes the
/// host no longer has, then runs each part as a nested child operation:
/// the loading screen, the startup collection, any extra scenes, and
/// finally hides the loading screen. Regular operations submitted in the
/// meantime keep flowing through their lanes.
#[derive(Debug, Clone, Default)]
pub struct StartupSequence {
    loading_screen: Option<SceneId>,
    collection: Option<SceneCollection>,
    scenes: Vec<SceneId>,
}

impl StartupSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loading_screen(mut self, scene: impl Into<SceneId>) -> Self {
        self.loading_screen = Some(scene.into());
        self
    }

    /// Collection opened during startup. Its own loading screen is
    /// ignored in favour of the startup one.
    pub fn with_collection(mut self, collection: SceneCollection) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Standalone scene opened after the collection.
    pub fn with_scene(mut self, scene: impl Into<SceneId>) -> Self {
        let scene = scene.into();
        if !self.scenes.contains(&scene) {
            self.scenes.push(scene);
        }
        self
    }

    pub fn build<H: SceneHost>(self) -> Operation<H> {
        let mut steps = vec![actions::reconcile()];

        if let Some(screen) = &self.loading_screen {
            steps.push(Action::child(Operation::new(
                "startup: loading screen",
                Lane::Collection,
                actions::show_loading_screen(Some(screen.clone())),
            )));
        }
        if let Some(collection) = &self.collection {
            steps.push(Action::child(Operation::new(
                format!("startup: collection {}", collection.name()),
                Lane::Collection,
                collection_root(collection, false),
            )));
        }
        steps.extend(self.scenes.into_iter().map(|scene| Action::child(open_scene(scene))));
        if self.loading_screen.is_some() {
            steps.push(Action::child(Operation::new(
                "startup: hide loading screen",
                Lane::Collection,
                actions::hide_loading_screen(),
            )));
        }

        let root = Action::aggregate(AggregateAction::from_actions(steps).on_done(|_| None));
        Operation::new("startup", Lane::Collection, root).bypass_queue()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{ActionKind, TestBed};
    use crate::core::host::SimulatedHost;
    use crate::core::operation::Policy;

    type Op = Operation<SimulatedHost>;

    fn id(s: &str) -> SceneId {
        SceneId::from(s)
    }

    fn bed_with(scenes: &[&str]) -> TestBed {
        let mut bed = TestBed::new();
        for scene in scenes {
            bed.host.register_scene(*scene);
        }
        bed
    }

    fn run(bed: &mut TestBed, op: Op) -> Action<SimulatedHost> {
        let mut root = op.into_root();
        bed.run(&mut root, 50);
        root
    }

    #[test]
    fn builders_pick_lanes() {
        assert_eq!(open_scene::<SimulatedHost>("a").lane(), Lane::Standalone);
        assert_eq!(close_scene::<SimulatedHost>("a").lane(), Lane::Standalone);
        let collection = SceneCollection::new("level");
        assert_eq!(open_collection::<SimulatedHost>(&collection).lane(), Lane::Collection);
        assert_eq!(close_collection::<SimulatedHost>().lane(), Lane::Collection);
    }

    #[test]
    fn open_scene_twice_loads_once() {
        let mut bed = bed_with(&["a"]);
        let first = run(&mut bed, open_scene("a"));
        let second = run(&mut bed, open_scene("a"));

        assert_eq!(first.outcome(), Some(Outcome::Completed));
        assert_eq!(second.outcome(), Some(Outcome::Skipped));
        assert_eq!(bed.host.load_requests().len(), 1);
    }

    #[test]
    fn collection_switch_keeps_persistent_scenes() {
        let mut bed = bed_with(&["hud", "old", "a", "b", "loading"]);
        bed.scenes.set_persistent("hud", true);
        run(&mut bed, open_scene("hud"));
        run(&mut bed, open_scene("old"));

        let collection = SceneCollection::new("level")
            .with_scene("a")
            .with_scene("b")
            .with_loading_screen("loading");
        let root = run(&mut bed, open_collection(&collection));

        assert_eq!(root.outcome(), Some(Outcome::Completed));
        assert_eq!(root.produced(), None);
        assert_eq!(
            bed.scenes.open_scenes().cloned().collect::<Vec<_>>(),
            vec![id("hud"), id("a"), id("b")]
        );
        assert_eq!(bed.scenes.open_collection().unwrap().name, "level");
        assert!(bed.scenes.loading_screen().is_none());
        assert_eq!(bed.host.unload_requests(), &[id("old"), id("loading")]);
    }

    #[test]
    fn close_collection_closes_non_persistent_scenes() {
        let mut bed = bed_with(&["a", "b"]);
        bed.scenes.set_persistent("b", true);
        let collection = SceneCollection::new("level").with_scene("a").with_scene("b");
        run(&mut bed, open_collection(&collection));

        run(&mut bed, close_collection());

        assert!(!bed.scenes.is_open(&id("a")));
        assert!(bed.scenes.is_open(&id("b")));
        assert!(bed.scenes.open_collection().is_none());
    }

    #[test]
    fn close_collection_without_open_collection_is_skipped() {
        let mut bed = bed_with(&[]);
        let root = run(&mut bed, close_collection());
        assert_eq!(root.outcome(), Some(Outcome::Skipped));
    }

    #[test]
    fn startup_bypasses_queue() {
        let op: Op = StartupSequence::new()
            .with_loading_screen("loading")
            .with_collection(SceneCollection::new("menu").with_scene("menu"))
            .with_scene("audio")
            .with_scene("audio")
            .build();

        assert_eq!(op.policy(), Policy::BypassQueue);
        assert_eq!(op.label(), "startup");
        assert_eq!(op.root().kind(), ActionKind::Aggregate);
        // reconcile, loading screen, collection, one scene, hide
        let kinds: Vec<ActionKind> = op.root().children().iter().map(Action::kind).collect();
        assert_eq!(kinds.len(), 5);
        assert!(kinds.iter().all(|kind| *kind == ActionKind::Leaf));
    }
}
