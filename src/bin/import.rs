//! Drives ingest into the OSM stores from an OSM XML extract, optionally
//! writing a replay log/index file alongside it. Mirrors the teacher's
//! `importer.rs` binary's role, targeting the new store instead of a
//! flat geodata capnp-ish file.
//!
//! PBF decoding itself is an external collaborator per this crate's
//! scope (see `DESIGN.md`); this binary reads OSM XML directly with
//! `quick-xml` so the crate is runnable end to end without that
//! collaborator.

use anyhow::{Context, Result};
use clap::Parser;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::path::PathBuf;
use tile_store_engine::arena::Handle;
use tile_store_engine::config::Config;
use tile_store_engine::coords::LatpLon;
use tile_store_engine::osm_store::OsmStore;
use tile_store_engine::store::node_store::NodeStoreKind;
use tile_store_engine::store::replay_log::TagMap;

/// Imports an OSM XML extract into the node/way/relation stores.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input OSM XML file.
    input: PathBuf,

    /// Use the dense-array node store; requires pre-renumbered input.
    #[arg(long)]
    compact_node_store: bool,

    /// Advisory reservation hint, in millions of nodes.
    #[arg(long, default_value_t = 0.0)]
    init_nodes_millions: f64,

    /// Advisory reservation hint, in millions of ways.
    #[arg(long, default_value_t = 0.0)]
    init_ways_millions: f64,

    /// If set, write a replay-log index file here.
    #[arg(long)]
    index_file_path: Option<PathBuf>,

    /// If set, the backing arena is file-backed at this path.
    #[arg(long)]
    store_file_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config {
        compact_node_store: args.compact_node_store,
        init_nodes_millions: args.init_nodes_millions,
        init_ways_millions: args.init_ways_millions,
        store_file_path: args.store_file_path.clone(),
        ..Config::default()
    };

    let mut store = OsmStore::new(&config).context("failed to create the OSM store")?;
    let is_pbf = args.input.extension().map_or(false, |ext| ext == "pbf");
    let record_replay = args.index_file_path.is_some();
    if is_pbf {
        import_pbf(&args.input, &mut store, config.compact_node_store, record_replay)
            .with_context(|| format!("failed to import {}", args.input.display()))?;
    } else {
        import_xml(&args.input, &mut store, config.compact_node_store, record_replay)
            .with_context(|| format!("failed to import {}", args.input.display()))?;
    }

    store.log_summary();

    if let Some(index_path) = &args.index_file_path {
        persist_index(&store, index_path, config.compact_node_store)
            .with_context(|| format!("failed to write index file {}", index_path.display()))?;
        log::info!("wrote index file to {}", index_path.display());
    }

    Ok(())
}

#[cfg(feature = "pbf")]
fn import_pbf(path: &std::path::Path, store: &mut OsmStore, compact: bool, record_replay: bool) -> Result<()> {
    use osmpbf::{Element, ElementReader};

    let mut next_compact_id: i64 = 0;
    let reader = ElementReader::from_path(path)?;
    reader.for_each(|element| {
        let result = match element {
            Element::Node(node) => {
                let id = if compact {
                    let assigned = next_compact_id;
                    next_compact_id += 1;
                    assigned
                } else {
                    node.id()
                };
                let coord = LatpLon::from_degrees(node.lat(), node.lon());
                let result = store.insert_node(id, coord);
                if result.is_ok() && record_replay {
                    let tags: TagMap = node.tags().map(|(k, v)| (k.to_string(), v.to_string())).collect();
                    store.replay_log_mut().push_node(id, coord, tags);
                }
                result
            }
            Element::DenseNode(node) => {
                let id = if compact {
                    let assigned = next_compact_id;
                    next_compact_id += 1;
                    assigned
                } else {
                    node.id()
                };
                let coord = LatpLon::from_degrees(node.lat(), node.lon());
                let result = store.insert_node(id, coord);
                if result.is_ok() && record_replay {
                    let tags: TagMap = node.tags().map(|(k, v)| (k.to_string(), v.to_string())).collect();
                    store.replay_log_mut().push_node(id, coord, tags);
                }
                result
            }
            Element::Way(way) => {
                let refs: Vec<i64> = way.refs().collect();
                if refs.len() >= 2 {
                    let result = store.insert_way(way.id(), refs);
                    if result.is_ok() && record_replay {
                        let tags: TagMap = way.tags().map(|(k, v)| (k.to_string(), v.to_string())).collect();
                        store.replay_log_mut().push_way(way.id(), Handle::from_offset(way.id() as u64), tags);
                    }
                    result
                } else {
                    log::warn!("way {} has fewer than 2 nodes, skipping", way.id());
                    Ok(())
                }
            }
            Element::Relation(relation) => {
                if record_replay {
                    let tags: TagMap = relation.tags().map(|(k, v)| (k.to_string(), v.to_string())).collect();
                    store
                        .replay_log_mut()
                        .push_relation(relation.id(), Handle::from_offset(relation.id() as u64), tags);
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            log::warn!("skipping malformed PBF element: {e}");
        }
    })?;
    Ok(())
}

#[cfg(not(feature = "pbf"))]
fn import_pbf(_path: &std::path::Path, _store: &mut OsmStore, _compact: bool, _record_replay: bool) -> Result<()> {
    anyhow::bail!("this binary was built without the \"pbf\" feature; rebuild with --features pbf")
}

/// A node whose `<tag>` children (if any) haven't been fully read yet, so
/// it can't be inserted until its `</node>` closes.
struct PendingNode {
    store_id: i64,
    lat: f64,
    lon: f64,
    tags: TagMap,
}

fn import_xml(path: &std::path::Path, store: &mut OsmStore, compact: bool, record_replay: bool) -> Result<()> {
    let mut reader = Reader::from_file(path)?;
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut current_node: Option<PendingNode> = None;
    let mut current_way_id: Option<i64> = None;
    let mut current_way_nodes: Vec<i64> = Vec::new();
    let mut current_way_tags: TagMap = TagMap::new();
    let mut next_compact_id: i64 = 0;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => match e.name().as_ref() {
                b"node" => {
                    if let Some((raw_id, lat, lon)) = parse_node_attrs(&e)? {
                        let store_id = if compact {
                            let assigned = next_compact_id;
                            next_compact_id += 1;
                            assigned
                        } else {
                            raw_id
                        };
                        current_node = Some(PendingNode { store_id, lat, lon, tags: TagMap::new() });
                    }
                }
                b"way" => {
                    current_way_id = parse_id_attr(&e)?;
                    current_way_nodes.clear();
                    current_way_tags.clear();
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"node" => {
                    if let Some((raw_id, lat, lon)) = parse_node_attrs(&e)? {
                        let store_id = if compact {
                            let assigned = next_compact_id;
                            next_compact_id += 1;
                            assigned
                        } else {
                            raw_id
                        };
                        insert_node(store, store_id, lat, lon, TagMap::new(), record_replay)?;
                    }
                }
                b"nd" => {
                    if let Some(ref_id) = parse_ref_attr(&e)? {
                        current_way_nodes.push(ref_id);
                    }
                }
                b"tag" => {
                    if let Some((k, v)) = parse_tag_attrs(&e)? {
                        if let Some(node) = current_node.as_mut() {
                            node.tags.insert(k, v);
                        } else if current_way_id.is_some() {
                            current_way_tags.insert(k, v);
                        }
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"node" => {
                    if let Some(node) = current_node.take() {
                        insert_node(store, node.store_id, node.lat, node.lon, node.tags, record_replay)?;
                    }
                }
                b"way" => {
                    if let Some(id) = current_way_id.take() {
                        if current_way_nodes.len() >= 2 {
                            store.insert_way(id, current_way_nodes.clone())?;
                            if record_replay {
                                store.replay_log_mut().push_way(
                                    id,
                                    Handle::from_offset(id as u64),
                                    std::mem::take(&mut current_way_tags),
                                );
                            }
                        } else {
                            log::warn!("way {id} has fewer than 2 nodes, skipping");
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn insert_node(store: &mut OsmStore, id: i64, lat: f64, lon: f64, tags: TagMap, record_replay: bool) -> Result<()> {
    let coord = LatpLon::from_degrees(lat, lon);
    store.insert_node(id, coord)?;
    if record_replay {
        store.replay_log_mut().push_node(id, coord, tags);
    }
    Ok(())
}

fn parse_node_attrs(e: &BytesStart) -> Result<Option<(i64, f64, f64)>> {
    let mut id = None;
    let mut lat = None;
    let mut lon = None;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value()?.into_owned();
        match attr.key.as_ref() {
            b"id" => id = value.parse::<i64>().ok(),
            b"lat" => lat = value.parse::<f64>().ok(),
            b"lon" => lon = value.parse::<f64>().ok(),
            _ => {}
        }
    }
    Ok(match (id, lat, lon) {
        (Some(id), Some(lat), Some(lon)) => Some((id, lat, lon)),
        _ => None,
    })
}

fn parse_id_attr(e: &BytesStart) -> Result<Option<i64>> {
    Ok(e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"id")
        .and_then(|a| a.unescape_value().ok())
        .and_then(|v| v.parse::<i64>().ok()))
}

fn parse_ref_attr(e: &BytesStart) -> Result<Option<i64>> {
    Ok(e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"ref")
        .and_then(|a| a.unescape_value().ok())
        .and_then(|v| v.parse::<i64>().ok()))
}

fn parse_tag_attrs(e: &BytesStart) -> Result<Option<(String, String)>> {
    let mut k = None;
    let mut v = None;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value()?.into_owned();
        match attr.key.as_ref() {
            b"k" => k = Some(value),
            b"v" => v = Some(value),
            _ => {}
        }
    }
    Ok(match (k, v) {
        (Some(k), Some(v)) => Some((k, v)),
        _ => None,
    })
}

fn persist_index(store: &OsmStore, path: &std::path::Path, compact: bool) -> Result<()> {
    let kind = if compact { NodeStoreKind::Compact } else { NodeStoreKind::Normal };
    tile_store_engine::persistence::persist(
        path,
        kind,
        store.nodes(),
        store.ways(),
        store.relations(),
        store.replay_log(),
    )?;
    Ok(())
}
