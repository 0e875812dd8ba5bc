//! PBF Replay Log (C5, spec §4.5): a persisted log of decoded primitives
//! with tags, letting a subsequent run skip the PBF decode and replay
//! entries straight into the tag-processing script.
//!
//! Ways and relations are referenced by a [`crate::arena::Handle`] into
//! their respective store rather than copied — see `DESIGN.md` for why
//! this store keeps its own `Vec`-backed sequences rather than living
//! inside the shared byte arena (mirrors the split between
//! `geodata::saver` writing a flat format and `geodata::reader` mmap-ing
//! it back, rather than forcing ingest-time writes through the same mmap
//! the reader later opens).

use crate::arena::Handle;
use crate::coords::{LatpLon, NodeId, RelationId, WayId};
use std::collections::HashMap;

pub type TagMap = HashMap<String, String>;

pub struct NodeLogEntry {
    pub id: NodeId,
    pub coord: LatpLon,
    pub tags: TagMap,
}

pub struct WayLogEntry {
    pub id: WayId,
    pub way_handle: Handle,
    pub tags: TagMap,
}

pub struct RelationLogEntry {
    pub id: RelationId,
    pub relation_handle: Handle,
    pub tags: TagMap,
}

/// Three sequential-read sequences, spec §4.5.
#[derive(Default)]
pub struct ReplayLog {
    nodes: Vec<NodeLogEntry>,
    ways: Vec<WayLogEntry>,
    relations: Vec<RelationLogEntry>,
}

impl ReplayLog {
    pub fn new() -> ReplayLog {
        ReplayLog::default()
    }

    pub fn push_node(&mut self, id: NodeId, coord: LatpLon, tags: TagMap) {
        self.nodes.push(NodeLogEntry { id, coord, tags });
    }

    pub fn push_way(&mut self, id: WayId, way_handle: Handle, tags: TagMap) {
        self.ways.push(WayLogEntry { id, way_handle, tags });
    }

    pub fn push_relation(&mut self, id: RelationId, relation_handle: Handle, tags: TagMap) {
        self.relations.push(RelationLogEntry {
            id,
            relation_handle,
            tags,
        });
    }

    pub fn node_at(&self, index: usize) -> Option<&NodeLogEntry> {
        self.nodes.get(index)
    }

    pub fn way_at(&self, index: usize) -> Option<&WayLogEntry> {
        self.ways.get(index)
    }

    pub fn relation_at(&self, index: usize) -> Option<&RelationLogEntry> {
        self.relations.get(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_read_returns_entries_in_push_order() {
        let mut log = ReplayLog::new();
        log.push_node(1, LatpLon::default(), TagMap::new());
        log.push_node(2, LatpLon::default(), TagMap::new());
        assert_eq!(log.node_at(0).unwrap().id, 1);
        assert_eq!(log.node_at(1).unwrap().id, 2);
        assert_eq!(log.node_count(), 2);
    }

    #[test]
    fn way_entries_carry_a_handle_not_a_copy() {
        let mut log = ReplayLog::new();
        let handle = Handle::from_offset(128);
        let mut tags = TagMap::new();
        tags.insert("highway".into(), "residential".into());
        log.push_way(7, handle, tags);
        let entry = log.way_at(0).unwrap();
        assert_eq!(entry.way_handle.offset(), 128);
        assert_eq!(entry.tags.get("highway").unwrap(), "residential");
    }
}
