//=========================================================================
// Scene Actions
//=========================================================================
//
// Leaf and composite actions that talk to the SceneHost.
//
//   load_scene          overridable (Load)   host load + track handle
//   unload_scene        overridable (Unload) host unload + untrack
//   dispatch_callbacks  run component hooks for open/close
//   open_scene          load → open callbacks
//   close_scene         close callbacks → unload
//   show/hide_loading_screen
//   reconcile           drop tracked scenes the host no longer has
//
//=========================================================================

//=== External Dependencies ===============================================

use log::{debug, info};

//=== Internal Dependencies ===============================================

use super::SceneEvent;
use crate::core::action::{
    Action, ActionContext, ActionState, OverridableAction, OverrideKey, Outcome, Step, Task,
};
use crate::core::host::{HostProgress, RequestId, SceneHost, SceneId};

//=== Load ================================================================

/// Default body of [`load_scene`].
struct LoadScene {
    scene: SceneId,
    request: Option<RequestId>,
}

impl<H: SceneHost> Task<H> for LoadScene {
    fn poll(&mut self, ctx: &mut ActionContext<'_, H>, state: &mut ActionState<H::Handle>) -> Step {
        let Some(request) = self.request else {
            return match ctx.host.load_async(&self.scene) {
                Some(request) => {
                    debug!("Requested load of {}", self.scene);
                    self.request = Some(request);
                    Step::Continue
                }
                None => Step::Done(Outcome::Skipped),
            };
        };

        match ctx.host.poll(request) {
            HostProgress::Pending(progress) => {
                state.set_progress(progress);
                Step::Continue
            }
            HostProgress::Loaded(handle) => {
                ctx.scenes.mark_open(self.scene.clone(), handle.clone());
                state.produce(handle);
                Step::Done(Outcome::Completed)
            }
            HostProgress::Unloaded | HostProgress::Lost => Step::Done(Outcome::Skipped),
        }
    }

    fn cancelled(&mut self, _ctx: &mut ActionContext<'_, H>, _state: &mut ActionState<H::Handle>) {
        if self.request.is_some() {
            // Host loads cannot be aborted; the scene arrives untracked.
            debug!("Load of {} cancelled while in flight", self.scene);
        }
    }
}

/// Loads `scene` through the host and tracks the resulting handle.
///
/// Skipped when the scene is missing, already open, or unknown to the
/// host. Overridable with [`OverrideKey::load`].
pub fn load_scene<H: SceneHost>(scene: Option<SceneId>) -> Action<H> {
    let Some(scene) = scene.filter(|s| !s.is_empty()) else {
        return Action::skipped();
    };
    let guard_scene = scene.clone();
    Action::overridable(
        OverridableAction::<H>::new(
            OverrideKey::load(scene.clone()),
            LoadScene {
                scene,
                request: None,
            },
        )
        .skip_if(move |ctx| ctx.scenes.is_open(&guard_scene)),
    )
}

//=== Unload ==============================================================

/// Default body of [`unload_scene`].
struct UnloadScene {
    scene: SceneId,
    request: Option<RequestId>,
}

impl UnloadScene {
    fn lost<H: SceneHost>(&self, ctx: &mut ActionContext<'_, H>) -> Step {
        debug!("{} vanished before unload finished", self.scene);
        ctx.scenes.mark_closed(&self.scene);
        Step::Done(Outcome::Skipped)
    }
}

impl<H: SceneHost> Task<H> for UnloadScene {
    fn poll(&mut self, ctx: &mut ActionContext<'_, H>, state: &mut ActionState<H::Handle>) -> Step {
        let Some(handle) = ctx.scenes.handle_of(&self.scene).cloned() else {
            return Step::Done(Outcome::Skipped);
        };

        let Some(request) = self.request else {
            if !ctx.host.is_valid(&handle) {
                return self.lost(ctx);
            }
            return match ctx.host.unload_async(&handle) {
                Some(request) => {
                    debug!("Requested unload of {}", self.scene);
                    self.request = Some(request);
                    Step::Continue
                }
                None => self.lost(ctx),
            };
        };

        match ctx.host.poll(request) {
            HostProgress::Pending(progress) => {
                if !ctx.host.is_valid(&handle) {
                    return self.lost(ctx);
                }
                state.set_progress(progress);
                Step::Continue
            }
            HostProgress::Unloaded => {
                ctx.scenes.mark_closed(&self.scene);
                Step::Done(Outcome::Completed)
            }
            HostProgress::Loaded(_) | HostProgress::Lost => self.lost(ctx),
        }
    }
}

/// Unloads a tracked scene.
///
/// The handle is looked up when the action starts. A scene that is not
/// tracked, or whose handle the host no longer recognizes, is skipped
/// and untracked. Overridable with [`OverrideKey::unload`].
pub fn unload_scene<H: SceneHost>(scene: Option<SceneId>) -> Action<H> {
    let Some(scene) = scene.filter(|s| !s.is_empty()) else {
        return Action::skipped();
    };
    let guard_scene = scene.clone();
    Action::overridable(
        OverridableAction::<H>::new(
            OverrideKey::unload(scene.clone()),
            UnloadScene {
                scene,
                request: None,
            },
        )
        .skip_if(move |ctx| match ctx.scenes.handle_of(&guard_scene).cloned() {
            None => true,
            Some(handle) if !ctx.host.is_valid(&handle) => {
                ctx.scenes.mark_closed(&guard_scene);
                true
            }
            Some(_) => false,
        }),
    )
}

//=== Callbacks ===========================================================

/// Runs every registered component hook for `event` on `scene`, one
/// after another.
///
/// Finishes on its first step when the scene has no components or is
/// not open.
pub fn dispatch_callbacks<H: SceneHost>(scene: Option<SceneId>, event: SceneEvent) -> Action<H> {
    let Some(scene) = scene.filter(|s| !s.is_empty()) else {
        return Action::skipped();
    };
    Action::<H>::deferred(move |ctx| {
        if !ctx.scenes.is_open(&scene) {
            return Action::skipped();
        }
        let actions = ctx.callbacks.collect(&scene, event);
        debug!("Dispatching {:?} to {} component(s) of {}", event, actions.len(), scene);
        Action::sequence(actions)
    })
}

//=== Composites ==========================================================

/// Load followed by open callbacks. The result is the scene handle.
///
/// Skipped as a whole when the scene is already open, so components are
/// never told twice.
pub fn open_scene<H: SceneHost>(scene: impl Into<SceneId>) -> Action<H> {
    let scene = scene.into();
    Action::<H>::deferred(move |ctx| {
        if ctx.scenes.is_open(&scene) {
            debug!("{} already open", scene);
            return Action::skipped();
        }
        Action::sequence(vec![
            load_scene(Some(scene.clone())),
            dispatch_callbacks(Some(scene), SceneEvent::Open),
        ])
    })
}

/// Close callbacks followed by unload.
pub fn close_scene<H: SceneHost>(scene: impl Into<SceneId>) -> Action<H> {
    let scene = scene.into();
    Action::sequence(vec![
        dispatch_callbacks(Some(scene.clone()), SceneEvent::Close),
        unload_scene(Some(scene)),
    ])
}

//=== Loading Screen ======================================================

/// Opens `scene` and records it as the active loading screen.
///
/// Skipped when no scene is given or a loading screen is already shown.
pub fn show_loading_screen<H: SceneHost>(scene: Option<SceneId>) -> Action<H> {
    let Some(scene) = scene.filter(|s| !s.is_empty()) else {
        return Action::skipped();
    };
    Action::<H>::deferred(move |ctx| {
        if ctx.scenes.loading_screen().is_some() {
            return Action::skipped();
        }
        let marked = scene.clone();
        Action::sequence(vec![
            open_scene(scene),
            Action::<H>::from_fn(move |ctx, _| {
                if ctx.scenes.is_open(&marked) {
                    ctx.scenes.set_loading_screen(Some(marked.clone()));
                }
                Step::Done(Outcome::Completed)
            }),
        ])
    })
}

/// Closes the active loading screen, if any.
pub fn hide_loading_screen<H: SceneHost>() -> Action<H> {
    Action::<H>::deferred(|ctx| match ctx.scenes.loading_screen().cloned() {
        Some(scene) => {
            ctx.scenes.set_loading_screen(None);
            close_scene(scene)
        }
        None => Action::skipped(),
    })
}

//=== Reconcile ===========================================================

/// Untracks scenes the host no longer reports as loaded.
pub fn reconcile<H: SceneHost>() -> Action<H> {
    Action::<H>::from_fn(|ctx, _| {
        let live = ctx.host.active_scenes();
        let dropped = ctx.scenes.retain_live(&live);
        if !dropped.is_empty() {
            info!("Dropped {} scene(s) destroyed outside the scheduler", dropped.len());
        }
        Step::Done(Outcome::Completed)
    })
}

//=========================================================================
// Unit Tests
//=========================================================================
