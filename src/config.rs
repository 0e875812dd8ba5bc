//! Run configuration (spec §6's option table).

use geo::Rect;
use std::path::PathBuf;

/// Options recognized by the core. Binaries populate this from CLI flags;
/// library callers can build it directly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Use the dense-array `NodeStore` instead of the hash-map one.
    /// Requires the caller to have pre-renumbered node IDs.
    pub compact_node_store: bool,
    /// Advisory reservation hint, in millions of nodes.
    pub init_nodes_millions: f64,
    /// Advisory reservation hint, in millions of ways.
    pub init_ways_millions: f64,
    /// Zoom at which the tile index is keyed.
    pub base_zoom: u8,
    /// Inclusive emit range.
    pub start_zoom: u8,
    pub end_zoom: u8,
    /// Worker-pool size; 0 means autodetect via `num_cpus`.
    pub threads: usize,
    /// If set, PBF decode also writes a replay log to this path.
    pub index_file_path: Option<PathBuf>,
    /// If set, the backing arena is file-backed at this path instead of
    /// living purely on the heap.
    pub store_file_path: Option<PathBuf>,
    /// Optional geographic filter applied by the emitter driver.
    pub clipping_box: Option<Rect<f64>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            compact_node_store: false,
            init_nodes_millions: 0.0,
            init_ways_millions: 0.0,
            base_zoom: 14,
            start_zoom: 0,
            end_zoom: 14,
            threads: 0,
            index_file_path: None,
            store_file_path: None,
            clipping_box: None,
        }
    }
}

impl Config {
    /// Resolves `threads == 0` to detected hardware concurrency, matching
    /// the teacher's own `num_cpus::get()` use in `http_server.rs`.
    pub fn resolved_thread_count(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Initial node-store reservation derived from the millions hint.
    pub fn initial_node_capacity(&self) -> usize {
        (self.init_nodes_millions * 1_000_000.0) as usize
    }

    /// Initial way-store reservation derived from the millions hint.
    pub fn initial_way_capacity(&self) -> usize {
        (self.init_ways_millions * 1_000_000.0) as usize
    }
}
