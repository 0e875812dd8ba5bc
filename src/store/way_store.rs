//! Way Store (C3, spec §4.3): `WayID -> sequence<NodeID>`.
//!
//! Grounded on the teacher's `OsmEntityStorage<E>` pattern in
//! `geodata/importer.rs` (hash map keyed by OSM id, `insert`/`get`).

use crate::coords::{NodeId, WayId};
use crate::error::StoreError;
use std::collections::HashMap;

/// `WayID -> owned sequence<NodeID>`, spec §4.3.
#[derive(Default)]
pub struct WayStore {
    ways: HashMap<WayId, Vec<NodeId>>,
}

impl WayStore {
    pub fn new() -> WayStore {
        WayStore::default()
    }

    pub fn reserve(&mut self, n: usize) {
        self.ways.reserve(n);
    }

    /// Copies `nodes` into the store. Spec invariant: a way must have at
    /// least 2 nodes; enforced here rather than left to the caller so a
    /// malformed way is never observable by the assembler.
    pub fn insert<I: IntoIterator<Item = NodeId>>(&mut self, id: WayId, nodes: I) -> Result<(), StoreError> {
        let seq: Vec<NodeId> = nodes.into_iter().collect();
        if seq.len() < 2 {
            return Err(StoreError::InvariantViolation(format!(
                "way {id} has {} node(s), need at least 2",
                seq.len()
            )));
        }
        self.ways.insert(id, seq);
        Ok(())
    }

    pub fn at(&self, id: WayId) -> Result<&[NodeId], StoreError> {
        self.ways.get(&id).map(Vec::as_slice).ok_or(StoreError::NotFound(id))
    }

    pub fn size(&self) -> usize {
        self.ways.len()
    }

    /// All `(id, node sequence)` pairs, used when persisting the store to
    /// an index file (spec §6).
    pub fn entries(&self) -> Vec<(WayId, Vec<NodeId>)> {
        self.ways.iter().map(|(&id, nodes)| (id, nodes.clone())).collect()
    }

    pub fn clear(&mut self) {
        self.ways.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_returns_exactly_the_inserted_sequence() {
        let mut store = WayStore::new();
        store.insert(1, vec![10, 20, 30]).unwrap();
        assert_eq!(store.at(1).unwrap(), &[10, 20, 30]);
    }

    #[test]
    fn short_ways_are_rejected() {
        let mut store = WayStore::new();
        let err = store.insert(1, vec![10]).unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation(_)));
    }

    #[test]
    fn missing_way_is_not_found() {
        let store = WayStore::new();
        assert!(matches!(store.at(99), Err(StoreError::NotFound(99))));
    }
}
