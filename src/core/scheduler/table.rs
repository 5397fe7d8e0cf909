//=========================================================================
// Operation Table
//=========================================================================
//
// Storage for every operation the scheduler knows about.
//
//   live      operations that are queued or running, owned here
//   settled   final status of children whose parent is still live
//   history   status snapshots of finished operations, oldest evicted
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::{HashMap, VecDeque};

//=== Internal Dependencies ===============================================

use crate::core::host::SceneHost;
use crate::core::operation::{Operation, OperationId, OperationStatus};

//=== OperationTable ======================================================

pub struct OperationTable<H: SceneHost> {
    live: HashMap<OperationId, Operation<H>>,
    settled: HashMap<OperationId, (OperationId, OperationStatus<H::Handle>)>,
    history: VecDeque<(OperationId, OperationStatus<H::Handle>)>,
    capacity: usize,
}

impl<H: SceneHost> OperationTable<H> {
    /// Creates a table remembering up to `capacity` finished operations.
    pub fn new(capacity: usize) -> Self {
        Self {
            live: HashMap::new(),
            settled: HashMap::new(),
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    //--- Live Operations --------------------------------------------------

    pub fn insert(&mut self, id: OperationId, operation: Operation<H>) {
        self.live.insert(id, operation);
    }

    pub fn remove(&mut self, id: OperationId) -> Option<Operation<H>> {
        self.live.remove(&id)
    }

    pub fn get(&self, id: OperationId) -> Option<&Operation<H>> {
        self.live.get(&id)
    }

    pub fn get_mut(&mut self, id: OperationId) -> Option<&mut Operation<H>> {
        self.live.get_mut(&id)
    }

    /// Live operations spawned by `parent`.
    pub fn children_of(&self, parent: OperationId) -> Vec<OperationId> {
        let mut children: Vec<OperationId> = self
            .live
            .iter()
            .filter(|(_, op)| op.parent() == Some(parent))
            .map(|(id, _)| *id)
            .collect();
        children.sort();
        children
    }

    //--- History ----------------------------------------------------------

    /// Remembers the final status of a finished operation.
    ///
    /// A child of a live parent stays retrievable until that parent
    /// finishes, however many operations finish in between. Finishing
    /// releases the operation's own settled children.
    pub fn record(
        &mut self,
        id: OperationId,
        parent: Option<OperationId>,
        status: OperationStatus<H::Handle>,
    ) {
        self.settled.retain(|_, (owner, _)| *owner != id);
        if let Some(parent) = parent.filter(|parent| self.live.contains_key(parent)) {
            self.settled.insert(id, (parent, status.clone()));
        }

        if self.capacity == 0 {
            return;
        }
        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back((id, status));
    }

    pub fn finished(&self, id: OperationId) -> Option<&OperationStatus<H::Handle>> {
        if let Some((_, status)) = self.settled.get(&id) {
            return Some(status);
        }
        self.history
            .iter()
            .rev()
            .find(|(finished, _)| *finished == id)
            .map(|(_, status)| status)
    }

    //--- Status -----------------------------------------------------------

    /// Status of a live or remembered operation.
    pub fn status(&self, id: OperationId) -> Option<OperationStatus<H::Handle>> {
        if let Some(op) = self.live.get(&id) {
            return Some(OperationStatus {
                phase: op.phase(),
                progress: op.progress(),
                result: None,
            });
        }
        self.finished(id).cloned()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
