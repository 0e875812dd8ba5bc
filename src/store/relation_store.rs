//! Relation Store (C4, spec §4.4): an ordered sequence of
//! `{RelationID, outer: vec<WayID>, inner: vec<WayID>}`.
//!
//! Only way-member multipolygon relations are stored (spec §3). The name
//! `insert_front` is kept from the source even though this store simply
//! appends — see the Open Question note in `DESIGN.md`; order is not
//! observable in tile output.

use crate::coords::{RelationId, WayId};

pub struct RelationEntry {
    pub relation_id: RelationId,
    pub outer: Vec<WayId>,
    pub inner: Vec<WayId>,
}

/// Ordered sequence of relation entries, spec §4.4.
#[derive(Default)]
pub struct RelationStore {
    entries: Vec<RelationEntry>,
}

impl RelationStore {
    pub fn new() -> RelationStore {
        RelationStore::default()
    }

    /// Appends a new entry. Named `insert_front` in the source; the name
    /// is historic and does not describe where the entry lands.
    pub fn insert_front(&mut self, relation_id: RelationId, outer: Vec<WayId>, inner: Vec<WayId>) {
        self.entries.push(RelationEntry { relation_id, outer, inner });
    }

    pub fn at(&self, index: usize) -> Option<&RelationEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_returns_both_member_lists() {
        let mut store = RelationStore::new();
        store.insert_front(1, vec![10, 11], vec![20]);
        let entry = store.at(0).unwrap();
        assert_eq!(entry.relation_id, 1);
        assert_eq!(entry.outer, vec![10, 11]);
        assert_eq!(entry.inner, vec![20]);
    }

    #[test]
    fn len_tracks_insertions() {
        let mut store = RelationStore::new();
        store.insert_front(1, vec![], vec![]);
        store.insert_front(2, vec![], vec![]);
        assert_eq!(store.len(), 2);
    }
}
