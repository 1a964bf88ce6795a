use std::collections::HashMap;

use crate::tree::NodeId;

/// Suggestion requests currently in flight, keyed by the node that asked.
///
/// The registry is the coalescing point: a node that already has a request
/// out cannot start a second one. It only records decisions; the actual
/// tasks live with the driver.
#[derive(Debug, Default)]
pub struct PendingRequests {
    in_flight: HashMap<NodeId, u64>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request for `node` under `epoch`. Returns false if one is
    /// already outstanding.
    pub fn try_begin(&mut self, node: NodeId, epoch: u64) -> bool {
        if self.in_flight.contains_key(&node) {
            return false;
        }
        self.in_flight.insert(node, epoch);
        true
    }

    /// Clears the entry if it belongs to `epoch`. Returns whether it did.
    pub fn finish(&mut self, node: NodeId, epoch: u64) -> bool {
        match self.in_flight.get(&node) {
            Some(&e) if e == epoch => {
                self.in_flight.remove(&node);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.in_flight.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Forgets everything, e.g. when the tree is replaced.
    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}
