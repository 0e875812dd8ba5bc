//! The on-disk index file format (spec §6): a named-region header
//! carrying the `node_store_type` tag, followed by the node, way, and
//! relation stores and the replay log.
//!
//! The binary layout (length-prefixed records, little-endian integers)
//! follows the teacher's `geodata/saver.rs`/`geodata/reader.rs` split:
//! a linear writer here, a direct-read loader on the other side, no
//! intermediate in-memory staging buffer beyond what `byteorder` needs
//! per field.

use crate::arena::Handle;
use crate::coords::{LatpLon, NodeId, RelationId, WayId};
use crate::error::StoreError;
use crate::store::node_store::NodeStoreKind;
use crate::store::replay_log::TagMap;
use crate::store::{NodeStore, RelationStore, ReplayLog, WayStore};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"OSM1";

fn kind_tag(kind: NodeStoreKind) -> u8 {
    match kind {
        NodeStoreKind::Normal => 0,
        NodeStoreKind::Compact => 1,
    }
}

fn kind_from_tag(tag: u8) -> Result<NodeStoreKind, StoreError> {
    match tag {
        0 => Ok(NodeStoreKind::Normal),
        1 => Ok(NodeStoreKind::Compact),
        other => Err(StoreError::BadInput(format!("unknown node store kind tag {other}"))),
    }
}

/// Reads just the header far enough to recover the persisted
/// `node_store_type` tag, for `OsmStore::reopen`'s validation step.
pub fn read_store_kind_tag(path: &Path) -> Result<NodeStoreKind, StoreError> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(StoreError::BadInput("index file missing OSM1 magic".into()));
    }
    let tag = file.read_u8()?;
    kind_from_tag(tag)
}

fn write_string(w: &mut impl Write, s: &str) -> Result<(), StoreError> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string(r: &mut impl Read) -> Result<String, StoreError> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| StoreError::BadInput(e.to_string()))
}

fn write_tags(w: &mut impl Write, tags: &TagMap) -> Result<(), StoreError> {
    w.write_u32::<LittleEndian>(tags.len() as u32)?;
    for (k, v) in tags {
        write_string(w, k)?;
        write_string(w, v)?;
    }
    Ok(())
}

fn read_tags(r: &mut impl Read) -> Result<TagMap, StoreError> {
    let count = r.read_u32::<LittleEndian>()?;
    let mut tags = TagMap::new();
    for _ in 0..count {
        let k = read_string(r)?;
        let v = read_string(r)?;
        tags.insert(k, v);
    }
    Ok(tags)
}

/// Persists the node/way/relation stores and the replay log to `path`
/// (spec §6 "an optional persisted *index file*").
pub fn persist(
    path: &Path,
    node_kind: NodeStoreKind,
    nodes: &NodeStore,
    ways: &WayStore,
    relations: &RelationStore,
    log: &ReplayLog,
) -> Result<(), StoreError> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    w.write_all(MAGIC)?;
    w.write_u8(kind_tag(node_kind))?;

    let node_entries = nodes.entries();
    w.write_u32::<LittleEndian>(node_entries.len() as u32)?;
    for (id, coord) in &node_entries {
        w.write_i64::<LittleEndian>(*id)?;
        w.write_i32::<LittleEndian>(coord.latp)?;
        w.write_i32::<LittleEndian>(coord.lon)?;
    }

    let way_entries = ways.entries();
    w.write_u32::<LittleEndian>(way_entries.len() as u32)?;
    for (id, seq) in &way_entries {
        w.write_i64::<LittleEndian>(*id)?;
        w.write_u32::<LittleEndian>(seq.len() as u32)?;
        for node_id in seq {
            w.write_i64::<LittleEndian>(*node_id)?;
        }
    }

    w.write_u32::<LittleEndian>(relations.len() as u32)?;
    for entry in relations.iter() {
        w.write_i64::<LittleEndian>(entry.relation_id)?;
        w.write_u32::<LittleEndian>(entry.outer.len() as u32)?;
        for way_id in &entry.outer {
            w.write_i64::<LittleEndian>(*way_id)?;
        }
        w.write_u32::<LittleEndian>(entry.inner.len() as u32)?;
        for way_id in &entry.inner {
            w.write_i64::<LittleEndian>(*way_id)?;
        }
    }

    w.write_u32::<LittleEndian>(log.node_count() as u32)?;
    for i in 0..log.node_count() {
        let entry = log.node_at(i).unwrap();
        w.write_i64::<LittleEndian>(entry.id)?;
        w.write_i32::<LittleEndian>(entry.coord.latp)?;
        w.write_i32::<LittleEndian>(entry.coord.lon)?;
        write_tags(&mut w, &entry.tags)?;
    }

    w.write_u32::<LittleEndian>(log.way_count() as u32)?;
    for i in 0..log.way_count() {
        let entry = log.way_at(i).unwrap();
        w.write_i64::<LittleEndian>(entry.id)?;
        w.write_u64::<LittleEndian>(entry.way_handle.offset())?;
        write_tags(&mut w, &entry.tags)?;
    }

    w.write_u32::<LittleEndian>(log.relation_count() as u32)?;
    for i in 0..log.relation_count() {
        let entry = log.relation_at(i).unwrap();
        w.write_i64::<LittleEndian>(entry.id)?;
        w.write_u64::<LittleEndian>(entry.relation_handle.offset())?;
        write_tags(&mut w, &entry.tags)?;
    }

    w.flush()?;
    Ok(())
}

/// A freshly loaded index file's node entries and tagged replay-log
/// entries, ready to be replayed into the stores/tag script (spec §4.5).
pub struct LoadedIndex {
    pub node_kind: NodeStoreKind,
    pub nodes: Vec<(NodeId, LatpLon)>,
    pub ways: Vec<(WayId, Vec<NodeId>)>,
    pub relations: Vec<(RelationId, Vec<WayId>, Vec<WayId>)>,
    pub replay_nodes: Vec<(NodeId, LatpLon, TagMap)>,
    pub replay_ways: Vec<(WayId, Handle, TagMap)>,
    pub replay_relations: Vec<(RelationId, Handle, TagMap)>,
}

pub fn load(path: &Path) -> Result<LoadedIndex, StoreError> {
    let file = File::open(path)?;
    let mut r = BufReader::new(file);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(StoreError::BadInput("index file missing OSM1 magic".into()));
    }
    let node_kind = kind_from_tag(r.read_u8()?)?;

    let node_count = r.read_u32::<LittleEndian>()?;
    let mut nodes = Vec::with_capacity(node_count as usize);
    for _ in 0..node_count {
        let id = r.read_i64::<LittleEndian>()?;
        let latp = r.read_i32::<LittleEndian>()?;
        let lon = r.read_i32::<LittleEndian>()?;
        nodes.push((id, LatpLon { latp, lon }));
    }

    let way_count = r.read_u32::<LittleEndian>()?;
    let mut ways = Vec::with_capacity(way_count as usize);
    for _ in 0..way_count {
        let id = r.read_i64::<LittleEndian>()?;
        let len = r.read_u32::<LittleEndian>()?;
        let mut seq = Vec::with_capacity(len as usize);
        for _ in 0..len {
            seq.push(r.read_i64::<LittleEndian>()?);
        }
        ways.push((id, seq));
    }

    let relation_count = r.read_u32::<LittleEndian>()?;
    let mut relations = Vec::with_capacity(relation_count as usize);
    for _ in 0..relation_count {
        let id = r.read_i64::<LittleEndian>()?;
        let outer_len = r.read_u32::<LittleEndian>()?;
        let mut outer = Vec::with_capacity(outer_len as usize);
        for _ in 0..outer_len {
            outer.push(r.read_i64::<LittleEndian>()?);
        }
        let inner_len = r.read_u32::<LittleEndian>()?;
        let mut inner = Vec::with_capacity(inner_len as usize);
        for _ in 0..inner_len {
            inner.push(r.read_i64::<LittleEndian>()?);
        }
        relations.push((id, outer, inner));
    }

    let replay_node_count = r.read_u32::<LittleEndian>()?;
    let mut replay_nodes = Vec::with_capacity(replay_node_count as usize);
    for _ in 0..replay_node_count {
        let id = r.read_i64::<LittleEndian>()?;
        let latp = r.read_i32::<LittleEndian>()?;
        let lon = r.read_i32::<LittleEndian>()?;
        let tags = read_tags(&mut r)?;
        replay_nodes.push((id, LatpLon { latp, lon }, tags));
    }

    let replay_way_count = r.read_u32::<LittleEndian>()?;
    let mut replay_ways = Vec::with_capacity(replay_way_count as usize);
    for _ in 0..replay_way_count {
        let id = r.read_i64::<LittleEndian>()?;
        let handle = Handle::from_offset(r.read_u64::<LittleEndian>()?);
        let tags = read_tags(&mut r)?;
        replay_ways.push((id, handle, tags));
    }

    let replay_relation_count = r.read_u32::<LittleEndian>()?;
    let mut replay_relations = Vec::with_capacity(replay_relation_count as usize);
    for _ in 0..replay_relation_count {
        let id = r.read_i64::<LittleEndian>()?;
        let handle = Handle::from_offset(r.read_u64::<LittleEndian>()?);
        let tags = read_tags(&mut r)?;
        replay_relations.push((id, handle, tags));
    }

    Ok(LoadedIndex {
        node_kind,
        nodes,
        ways,
        relations,
        replay_nodes,
        replay_ways,
        replay_relations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::node_store::NodeStoreKind;

    #[test]
    fn persisted_index_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");

        let mut nodes = NodeStore::new(NodeStoreKind::Normal);
        nodes.insert(1, LatpLon::from_degrees(10.0, 20.0)).unwrap();
        let mut ways = WayStore::new();
        ways.insert(2, vec![1, 2, 3]).unwrap();
        let relations = RelationStore::new();
        let mut log = ReplayLog::new();
        let mut tags = TagMap::new();
        tags.insert("highway".into(), "residential".into());
        log.push_node(7, LatpLon::from_degrees(1.0, 2.0), tags);
        let mut way_tags = TagMap::new();
        way_tags.insert("highway".into(), "residential".into());
        log.push_way(2, Handle::from_offset(2), way_tags);
        let mut relation_tags = TagMap::new();
        relation_tags.insert("type".into(), "multipolygon".into());
        log.push_relation(9, Handle::from_offset(9), relation_tags);

        persist(&path, NodeStoreKind::Normal, &nodes, &ways, &relations, &log).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.node_kind, NodeStoreKind::Normal);
        assert_eq!(loaded.nodes, nodes.entries());
        assert_eq!(loaded.ways, ways.entries());
        assert_eq!(loaded.replay_nodes[0].2.get("highway").unwrap(), "residential");
        assert_eq!(loaded.replay_ways.len(), 1);
        assert_eq!(loaded.replay_ways[0].1.offset(), 2);
        assert_eq!(loaded.replay_relations.len(), 1);
        assert_eq!(loaded.replay_relations[0].2.get("type").unwrap(), "multipolygon");
    }

    #[test]
    fn store_kind_tag_is_recoverable_without_loading_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        let nodes = NodeStore::new(NodeStoreKind::Compact);
        let ways = WayStore::new();
        let relations = RelationStore::new();
        let log = ReplayLog::new();
        persist(&path, NodeStoreKind::Compact, &nodes, &ways, &relations, &log).unwrap();
        assert_eq!(read_store_kind_tag(&path).unwrap(), NodeStoreKind::Compact);
    }
}
