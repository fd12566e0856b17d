use crate::{EdgeKey, NodeId};

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Engine-scoped record of structural innovations.
///
/// Splitting the same edge with the same recurrence flag anywhere in the
/// population yields the same hidden node id, which is what lets the
/// compatibility metric recognise the resulting genomes as matching. The
/// registry also owns the monotonic hidden-node counter and the species id
/// counter used for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Innovations {
    pub(crate) forward_splits: HashMap<EdgeKey, NodeId, RandomState>,
    pub(crate) recurrent_splits: HashMap<EdgeKey, NodeId, RandomState>,
    pub(crate) next_node: NodeId,
    pub(crate) next_species: i32,
}

impl Innovations {
    /// `first_hidden` is the lowest node id not claimed by sensors
    /// and outputs.
    pub fn new(first_hidden: NodeId) -> Innovations {
        Innovations {
            forward_splits: HashMap::default(),
            recurrent_splits: HashMap::default(),
            next_node: first_hidden,
            next_species: 0,
        }
    }

    /// Returns the hidden node id assigned to splitting `edge`, allocating a
    /// fresh id the first time this `(edge, recurrent)` pair is seen.
    pub fn node_for_split(&mut self, edge: EdgeKey, recurrent: bool) -> NodeId {
        let splits = if recurrent {
            &mut self.recurrent_splits
        } else {
            &mut self.forward_splits
        };
        match splits.entry(edge) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = self.next_node;
                self.next_node += 1;
                entry.insert(id);
                id
            }
        }
    }

    /// Fresh species id, used only for diagnostics.
    pub fn next_species_id(&mut self) -> i32 {
        let id = self.next_species;
        self.next_species += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_split_yields_same_id() {
        let mut innovations = Innovations::new(3);
        let first = innovations.node_for_split((0, 2), false);
        let second = innovations.node_for_split((0, 2), false);
        assert_eq!(first, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn recurrence_flag_distinguishes_splits() {
        let mut innovations = Innovations::new(3);
        let forward = innovations.node_for_split((0, 2), false);
        let recurrent = innovations.node_for_split((0, 2), true);
        assert_ne!(forward, recurrent);
        assert_eq!(innovations.node_for_split((0, 2), true), recurrent);
    }

    #[test]
    fn species_ids_are_monotonic() {
        let mut innovations = Innovations::new(10);
        assert_eq!(innovations.next_species_id(), 0);
        assert_eq!(innovations.next_species_id(), 1);
        assert_eq!(innovations.next_species_id(), 2);
    }
}
