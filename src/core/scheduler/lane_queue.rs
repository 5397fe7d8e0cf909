//=========================================================================
// Lane Queue
//=========================================================================
//
// FIFO of operations waiting for their lane to become free.
//
// The scheduler pops the head at tick boundaries, when the lane's active
// operation has finished.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::VecDeque;

//=== Internal Dependencies ===============================================

use crate::core::operation::OperationId;

//=== LaneQueue ===========================================================

#[derive(Debug, Default)]
pub struct LaneQueue {
    queue: VecDeque<OperationId>,
}

impl LaneQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Appends an operation to the back of the queue.
    pub fn push(&mut self, id: OperationId) {
        self.queue.push_back(id);
    }

    /// Removes the operation that has waited longest.
    pub fn pop(&mut self) -> Option<OperationId> {
        self.queue.pop_front()
    }

    /// Removes `id` wherever it is queued. Returns `true` if it was found.
    pub fn remove(&mut self, id: OperationId) -> bool {
        match self.queue.iter().position(|queued| *queued == id) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.queue.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationId> {
        self.queue.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Takes every queued operation, leaving the queue empty.
    pub fn take(&mut self) -> Vec<OperationId> {
        std::mem::take(&mut self.queue).into()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
