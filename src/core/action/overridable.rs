//=========================================================================
// Overridable Action
//=========================================================================
//
// Leaf action whose default body can be replaced at runtime.
//
// Flow (first step only):
//   skip_if(ctx)?          → Done(Skipped), registry never consulted
//   registry[key] present? → handler builds the replacement action
//   otherwise              → default task runs
//
// Once resolved, every later step drives whichever body was chosen.
//
//=========================================================================

//=== External Dependencies ===============================================

use log::debug;

//=== Internal Dependencies ===============================================

use super::{drive, Action, ActionContext, ActionState, OverrideKey, Outcome, Step, Task};
use crate::core::host::SceneHost;

//=== OverridableAction ===================================================

type SkipGuard<H> = Box<dyn FnMut(&mut ActionContext<'_, H>) -> bool>;

pub struct OverridableAction<H: SceneHost> {
    key: OverrideKey,
    skip_if: Option<SkipGuard<H>>,
    default: Box<dyn Task<H>>,
    delegate: Option<Box<Action<H>>>,
    resolved: bool,
}

impl<H: SceneHost> OverridableAction<H> {
    pub fn new(key: OverrideKey, default: impl Task<H> + 'static) -> Self {
        Self {
            key,
            skip_if: None,
            default: Box::new(default),
            delegate: None,
            resolved: false,
        }
    }

    /// Guard evaluated right before execution. Returning `true` finishes
    /// the action as `Skipped` without consulting the registry.
    pub fn skip_if<F>(mut self, guard: F) -> Self
    where
        F: FnMut(&mut ActionContext<'_, H>) -> bool + 'static,
    {
        self.skip_if = Some(Box::new(guard));
        self
    }

    pub fn key(&self) -> &OverrideKey {
        &self.key
    }

    /// Whether a registered handler took over this action.
    pub fn is_overridden(&self) -> bool {
        self.delegate.is_some()
    }

    //--- Execution --------------------------------------------------------

    fn resolve(&mut self, ctx: &mut ActionContext<'_, H>) -> Option<Step> {
        self.resolved = true;

        if let Some(guard) = self.skip_if.as_mut() {
            if guard(ctx) {
                debug!("Skipping {:?}: prerequisite no longer holds", self.key);
                return Some(Step::Done(Outcome::Skipped));
            }
        }

        if let Some(handler) = ctx.overrides.get(&self.key) {
            debug!("Delegating {:?} to registered override", self.key);
            let replacement = handler.replace(&self.key.target, ctx);
            self.delegate = Some(Box::new(replacement));
        }
        None
    }

    pub(super) fn poll(
        &mut self,
        ctx: &mut ActionContext<'_, H>,
        state: &mut ActionState<H::Handle>,
    ) -> Step {
        if !self.resolved {
            if let Some(step) = self.resolve(ctx) {
                return step;
            }
        }

        match self.delegate.as_mut() {
            Some(delegate) => drive(delegate, ctx, state),
            None => self.default.poll(ctx, state),
        }
    }

    pub(super) fn forward_cancel(&mut self) {
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.cancel();
        }
    }

    pub(super) fn cancelled(
        &mut self,
        ctx: &mut ActionContext<'_, H>,
        state: &mut ActionState<H::Handle>,
    ) {
        match self.delegate.as_mut() {
            Some(delegate) => {
                delegate.step(ctx);
            }
            None if self.resolved => self.default.cancelled(ctx, state),
            None => {}
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
