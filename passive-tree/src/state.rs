use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

bitflags! {
    /// Per-node interaction state. Each bit is independent; a node may hold
    /// any combination.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeStates: u8 {
        const ACTIVE = 1;
        const HOVERED = 1 << 1;
        const PATHING = 1 << 2;
        const HIGHLIGHTED = 1 << 3;
        const COMPARED = 1 << 4;
        const MOVED = 1 << 5;
    }
}

const FLAG_COUNT: usize = 6;

/// Per-tree mutable state: one node-index set per flag bit, plus the
/// transient hover text counter. The graph itself stays immutable; every
/// session owns exactly one tracker and a single actor mutates it.
#[derive(Debug, Clone)]
pub struct StateTracker {
    sets: [HashSet<usize>; FLAG_COUNT],
    hover_text: HashMap<usize, usize>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self {
            sets: std::array::from_fn(|_| HashSet::new()),
            hover_text: HashMap::new(),
        }
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn bit_positions(flags: NodeStates) -> impl Iterator<Item = usize> {
        flags
            .iter()
            .map(|flag| flag.bits().trailing_zeros() as usize)
    }

    /// Set the given bits on a node, leaving its other bits untouched.
    pub fn add_state(&mut self, node: usize, flags: NodeStates) {
        for bit in Self::bit_positions(flags) {
            self.sets[bit].insert(node);
        }
    }

    /// Clear the given bits on a node, leaving its other bits untouched.
    pub fn remove_state(&mut self, node: usize, flags: NodeStates) {
        for bit in Self::bit_positions(flags) {
            self.sets[bit].remove(&node);
        }
    }

    /// Remove the given flags from every node currently holding them.
    pub fn clear_state(&mut self, flags: NodeStates) {
        for bit in Self::bit_positions(flags) {
            self.sets[bit].clear();
        }
    }

    /// True iff the node holds *every* queried bit.
    pub fn has_state(&self, node: usize, flags: NodeStates) -> bool {
        Self::bit_positions(flags).all(|bit| self.sets[bit].contains(&node))
    }

    /// Point-in-time snapshot of the nodes holding every queried bit.
    /// Iteration order is unspecified.
    pub fn nodes_with_state(&self, flags: NodeStates) -> Vec<usize> {
        let mut bits = Self::bit_positions(flags);
        let Some(first) = bits.next() else {
            return Vec::new();
        };
        let rest: Vec<usize> = bits.collect();
        self.sets[first]
            .iter()
            .copied()
            .filter(|node| rest.iter().all(|&bit| self.sets[bit].contains(node)))
            .collect()
    }

    pub fn set_hover_text(&mut self, node: usize, count: usize) {
        self.hover_text.insert(node, count);
    }

    pub fn hover_text(&self, node: usize) -> Option<usize> {
        self.hover_text.get(&node).copied()
    }

    pub fn clear_hover_text(&mut self) {
        self.hover_text.clear();
    }

    /// Drop every flag and the hover text. Used when resetting a session to
    /// an empty-but-valid allocation.
    pub fn clear_all(&mut self) {
        for set in &mut self.sets {
            set.clear();
        }
        self.hover_text.clear();
    }
}
