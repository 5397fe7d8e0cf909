//=========================================================================
// Aggregate Action
//=========================================================================
//
// Ordered composition of actions run strictly one after another.
//
// Progress:
//   (finished_children + current_child.progress) / total_children
//
// A child that finishes on its first step hands over to the next child
// within the same tick. A cancelled child aborts the whole aggregate.
//
//=========================================================================

//=== Internal Dependencies ===============================================

use super::{Action, ActionContext, ActionState, Outcome, Step};
use crate::core::host::SceneHost;

//=== AggregateAction =====================================================

type DoneHook<H> = Box<dyn FnOnce(&[Action<H>]) -> Option<<H as SceneHost>::Handle>>;

/// Sequential composition of child actions.
pub struct AggregateAction<H: SceneHost> {
    children: Vec<Action<H>>,
    current: usize,
    on_done: Option<DoneHook<H>>,
}

impl<H: SceneHost> AggregateAction<H> {
    /// Builds an aggregate, dropping `None` entries.
    pub fn new(children: impl IntoIterator<Item = Option<Action<H>>>) -> Self {
        Self {
            children: children.into_iter().flatten().collect(),
            current: 0,
            on_done: None,
        }
    }

    pub fn from_actions(children: impl IntoIterator<Item = Action<H>>) -> Self {
        Self::new(children.into_iter().map(Some))
    }

    /// Replaces the default result hook.
    ///
    /// The hook runs once after the last child finished and returns the
    /// handle the aggregate reports as its own result. By default this is
    /// the result of the first child that produced one.
    pub fn on_done<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&[Action<H>]) -> Option<H::Handle> + 'static,
    {
        self.on_done = Some(Box::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &[Action<H>] {
        &self.children
    }

    //--- Execution --------------------------------------------------------

    fn weighted_progress(&self) -> f32 {
        let total = self.children.len();
        if total == 0 {
            return 1.0;
        }
        let running = self
            .children
            .get(self.current)
            .map_or(0.0, Action::progress);
        (self.current.min(total) as f32 + running) / total as f32
    }

    pub(super) fn poll(
        &mut self,
        ctx: &mut ActionContext<'_, H>,
        state: &mut ActionState<H::Handle>,
    ) -> Step {
        while let Some(child) = self.children.get_mut(self.current) {
            match child.step(ctx) {
                Step::Continue => {
                    state.set_progress(self.weighted_progress());
                    return Step::Continue;
                }
                Step::Done(Outcome::Cancelled) => {
                    state.set_progress(self.weighted_progress());
                    return Step::Done(Outcome::Cancelled);
                }
                Step::Done(_) => {
                    self.current += 1;
                    state.set_progress(self.weighted_progress());
                }
            }
        }

        let produced = match self.on_done.take() {
            Some(hook) => hook(&self.children),
            None => self
                .children
                .iter()
                .find_map(|child| child.produced().cloned()),
        };
        if let Some(handle) = produced {
            state.produce(handle);
        }
        Step::Done(Outcome::Completed)
    }

    pub(super) fn forward_cancel(&mut self) {
        if let Some(child) = self.children.get_mut(self.current) {
            child.cancel();
        }
    }

    /// Lets the running child observe its cancel request. Children after
    /// it are never started.
    pub(super) fn cancelled(
        &mut self,
        ctx: &mut ActionContext<'_, H>,
        _state: &mut ActionState<H::Handle>,
    ) {
        if let Some(child) = self.children.get_mut(self.current) {
            child.step(ctx);
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
