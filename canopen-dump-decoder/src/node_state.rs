//! Per-node transfer state
//!
//! One entry per node id 1..=127, allocated once. The table itself is never
//! reallocated; only each entry's accumulator grows or shrinks.

use crate::classifier::MAX_NODE_ID;
use crate::types::Multiplexer;

const NODE_COUNT: usize = MAX_NODE_ID as usize;

/// Initial accumulator capacity; most segmented transfers are small
const INITIAL_CAPACITY: usize = 8;

/// In-flight SDO state of a single node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    /// Object addressed by the current segmented transfer
    pub active_multiplexer: Option<Multiplexer>,
    /// Segment payload collected so far
    pub accumulator: Vec<u8>,
    /// Device type (object 0x1000) seen in an expedited upload
    pub device_type: Option<u32>,
}

impl NodeState {
    fn new() -> Self {
        Self {
            active_multiplexer: None,
            accumulator: Vec::with_capacity(INITIAL_CAPACITY),
            device_type: None,
        }
    }

    /// Drop stale segment data and make room for `size` bytes
    pub fn begin_transfer(&mut self, size: usize) {
        self.accumulator.clear();
        self.accumulator.reserve(size);
    }

    pub fn append_segment(&mut self, data: &[u8]) {
        self.accumulator.extend_from_slice(data);
    }

    /// Device profile number: low 16 bits of the device type
    pub fn device_profile(&self) -> Option<u16> {
        self.device_type.map(|device_type| (device_type & 0xFFFF) as u16)
    }
}

/// Fixed table of node states indexed by node id
#[derive(Debug)]
pub struct NodeTable {
    nodes: Box<[NodeState; NODE_COUNT]>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self {
            nodes: Box::new(std::array::from_fn(|_| NodeState::new())),
        }
    }

    /// Forget every in-flight transfer and cached device type
    pub fn reset(&mut self) {
        for node in self.nodes.iter_mut() {
            *node = NodeState::new();
        }
    }

    /// State of a node; `None` for 0 (broadcast) and ids above 127
    pub fn get(&self, node_id: u8) -> Option<&NodeState> {
        Self::slot(node_id).map(|slot| &self.nodes[slot])
    }

    pub fn get_mut(&mut self, node_id: u8) -> Option<&mut NodeState> {
        Self::slot(node_id).map(move |slot| &mut self.nodes[slot])
    }

    fn slot(node_id: u8) -> Option<usize> {
        match node_id {
            1..=MAX_NODE_ID => Some(usize::from(node_id) - 1),
            _ => None,
        }
    }
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_node_range() {
        let table = NodeTable::new();
        assert!(table.get(0).is_none());
        assert!(table.get(1).is_some());
        assert!(table.get(127).is_some());
        assert!(table.get(128).is_none());
        assert!(table.get(255).is_none());
    }

    #[test]
    fn test_nodes_are_independent() {
        let mut table = NodeTable::new();
        table.get_mut(3).unwrap().append_segment(&[1, 2, 3]);
        table.get_mut(4).unwrap().append_segment(&[9]);

        assert_eq!(table.get(3).unwrap().accumulator, vec![1, 2, 3]);
        assert_eq!(table.get(4).unwrap().accumulator, vec![9]);
    }

    #[test]
    fn test_begin_transfer_discards_stale_data() {
        let mut table = NodeTable::new();
        let node = table.get_mut(12).unwrap();
        node.append_segment(b"stale");
        node.begin_transfer(64);

        assert!(node.accumulator.is_empty());
        assert!(node.accumulator.capacity() >= 64);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut table = NodeTable::new();
        {
            let node = table.get_mut(7).unwrap();
            node.device_type = Some(0x0002_0192);
            node.active_multiplexer = Some(Multiplexer::new(0x1008, 0));
            node.append_segment(b"abc");
        }
        assert_eq!(table.get(7).unwrap().device_profile(), Some(0x0192));

        table.reset();
        assert_eq!(table.get(7).unwrap(), &NodeState::new());
    }
}
