//! Node Store (C2, spec §4.2): `NodeID -> LatpLon`, in a `Normal`
//! (hash map) or `Compact` (dense array) variant.
//!
//! Grounded on the teacher's `geodata/importer.rs` `OsmEntityStorage<E>`
//! (insert-then-lookup-by-id over a `HashMap`), extended with the
//! dense-array mode and the persisted store-kind tag spec §4.2/§6
//! require.

use crate::coords::{CompactNodeId, LatpLon, NodeId};
use crate::error::StoreError;
use std::collections::HashMap;
use std::convert::TryFrom;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStoreKind {
    Normal,
    Compact,
}

enum Inner {
    Normal(HashMap<NodeId, LatpLon>),
    Compact(Vec<Option<LatpLon>>),
}

/// `NodeID -> LatpLon`, spec §4.2.
pub struct NodeStore {
    inner: Inner,
}

impl NodeStore {
    pub fn new(kind: NodeStoreKind) -> NodeStore {
        NodeStore {
            inner: match kind {
                NodeStoreKind::Normal => Inner::Normal(HashMap::new()),
                NodeStoreKind::Compact => Inner::Compact(Vec::new()),
            },
        }
    }

    pub fn kind(&self) -> NodeStoreKind {
        match &self.inner {
            Inner::Normal(_) => NodeStoreKind::Normal,
            Inner::Compact(_) => NodeStoreKind::Compact,
        }
    }

    pub fn reserve(&mut self, n: usize) {
        match &mut self.inner {
            Inner::Normal(map) => map.reserve(n),
            Inner::Compact(vec) => vec.reserve(n),
        }
    }

    pub fn insert(&mut self, id: NodeId, coord: LatpLon) -> Result<(), StoreError> {
        match &mut self.inner {
            Inner::Normal(map) => {
                map.insert(id, coord);
                Ok(())
            }
            Inner::Compact(vec) => {
                let idx = CompactNodeId::try_from(id)
                    .map_err(|_| StoreError::InvariantViolation(format!("compact NodeID {id} out of range")))?
                    as usize;
                if idx >= vec.len() {
                    vec.resize(idx + 1, None);
                }
                vec[idx] = Some(coord);
                Ok(())
            }
        }
    }

    pub fn at(&self, id: NodeId) -> Result<LatpLon, StoreError> {
        match &self.inner {
            Inner::Normal(map) => map.get(&id).copied().ok_or(StoreError::NotFound(id)),
            Inner::Compact(vec) => {
                let idx = usize::try_from(id).map_err(|_| StoreError::NotFound(id))?;
                vec.get(idx).copied().flatten().ok_or(StoreError::NotFound(id))
            }
        }
    }

    pub fn size(&self) -> usize {
        match &self.inner {
            Inner::Normal(map) => map.len(),
            Inner::Compact(vec) => vec.len(),
        }
    }

    /// All populated `(id, coord)` pairs, used when persisting the store
    /// to an index file (spec §6).
    pub fn entries(&self) -> Vec<(NodeId, LatpLon)> {
        match &self.inner {
            Inner::Normal(map) => map.iter().map(|(&id, &coord)| (id, coord)).collect(),
            Inner::Compact(vec) => vec
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| slot.map(|coord| (i as NodeId, coord)))
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        match &mut self.inner {
            Inner::Normal(map) => map.clear(),
            Inner::Compact(vec) => vec.clear(),
        }
    }

    /// Validates a reopened store's persisted kind tag against the mode
    /// the caller expects (spec §4.2, §6).
    pub fn validate_reopen_kind(expected: NodeStoreKind, found: NodeStoreKind) -> Result<(), StoreError> {
        if expected == found {
            Ok(())
        } else {
            Err(StoreError::StoreKindMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_mode_round_trips_and_counts_once() {
        let mut store = NodeStore::new(NodeStoreKind::Normal);
        let coord = LatpLon::from_degrees(51.5, -0.1);
        store.insert(42, coord).unwrap();
        assert_eq!(store.at(42).unwrap(), coord);
        assert_eq!(store.size(), 1);
        store.insert(42, coord).unwrap();
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn compact_mode_extends_on_insert_and_reports_not_found_for_gaps() {
        let mut store = NodeStore::new(NodeStoreKind::Compact);
        let coord = LatpLon::from_degrees(1.0, 2.0);
        store.insert(5, coord).unwrap();
        assert_eq!(store.size(), 6);
        assert_eq!(store.at(5).unwrap(), coord);
        assert!(matches!(store.at(2), Err(StoreError::NotFound(2))));
    }

    #[test]
    fn clear_empties_the_store() {
        let mut store = NodeStore::new(NodeStoreKind::Normal);
        store.insert(1, LatpLon::default()).unwrap();
        store.clear();
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn reopen_kind_mismatch_is_fatal() {
        let err = NodeStore::validate_reopen_kind(NodeStoreKind::Compact, NodeStoreKind::Normal).unwrap_err();
        assert!(matches!(err, StoreError::StoreKindMismatch));
    }
}
