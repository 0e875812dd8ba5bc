//! Drives the zoom rollup and parallel tile emitter over a previously
//! built index file, writing one file per tile as the default local
//! stand-in for the external MBTiles/SQLite writer (spec §6).

use anyhow::{Context, Result};
use clap::Parser;
use geo::Rect;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tile_store_engine::arena::{self, Arena};
use tile_store_engine::config::Config;
use tile_store_engine::emitter::{self, MapsplitFilter};
use tile_store_engine::persistence;
use tile_store_engine::rollup::sub_layer_range;
use tile_store_engine::store::{GeometryNamespace, GeometryStore, NodeStore};
use tile_store_engine::tile_index::{GeometryKind, OutputObjectRef, TileIndex};

/// Emits vector tiles over a zoom range from a previously built index file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Index file produced by `import --index-file-path`.
    index_file: PathBuf,

    /// Directory to write one file per emitted tile into.
    #[arg(long, default_value = "tiles")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 14)]
    base_zoom: u8,

    #[arg(long, default_value_t = 0)]
    start_zoom: u8,

    #[arg(long, default_value_t = 14)]
    end_zoom: u8,

    /// Worker-pool size; 0 autodetects.
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Optional mapsplit ancestor filter: "zoom,x,y".
    #[arg(long)]
    mapsplit: Option<String>,

    /// Optional clipping box: "min_lon,min_lat,max_lon,max_lat".
    #[arg(long)]
    clipping_box: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let loaded = persistence::load(&args.index_file)
        .with_context(|| format!("failed to load index file {}", args.index_file.display()))?;

    let mut nodes = NodeStore::new(loaded.node_kind);
    for (id, coord) in &loaded.nodes {
        nodes.insert(*id, *coord)?;
    }

    let clipping_box = args.clipping_box.as_deref().map(parse_clipping_box).transpose()?;
    let config = Config {
        base_zoom: args.base_zoom,
        start_zoom: args.start_zoom,
        end_zoom: args.end_zoom,
        threads: args.threads,
        clipping_box,
        ..Config::default()
    };

    let mapsplit = args
        .mapsplit
        .as_deref()
        .map(parse_mapsplit)
        .transpose()?;

    // A minimal in-memory tile index built straight from the way
    // geometries, standing in for the tag-script-populated OsmMemTiles
    // this core treats as an external collaborator's output (spec §6).
    let mut geometries = GeometryStore::new(Arena::new_heap(arena::DEFAULT_INITIAL_SIZE));
    let mut tile_index = TileIndex::new(config.base_zoom);
    for (_way_id, way_nodes) in &loaded.ways {
        if let Some(line) = tile_store_engine::assembler::node_list_linestring(way_nodes, &nodes) {
            let handle = geometries.store_linestring(GeometryNamespace::OsmGenerated, line.clone())?;
            let oo = OutputObjectRef {
                layer_id: 0,
                geometry_kind: GeometryKind::Linestring,
                geometry_handle: handle,
                min_zoom: 0,
                attributes_ref: 0,
            };
            tile_index.add_linestring(&line, oo);
        }
    }
    let geometries = Arc::new(geometries);

    let work = emitter::build_work_list(&[&tile_index], &config, mapsplit);
    log::info!("emitting {} tile(s) across zoom {}..={}", work.len(), config.start_zoom, config.end_zoom);

    fs::create_dir_all(&args.output_dir)?;
    let output_dir = args.output_dir.clone();
    emitter::run(work, config.threads, move |zoom, tile, objects| {
        let path = output_dir.join(format!("{zoom}-{}-{}.mvt", tile.x, tile.y));
        let bytes = encode_tile(&geometries, objects);
        if let Err(e) = fs::write(&path, bytes) {
            log::error!("failed to write {}: {e}", path.display());
        }
    });

    Ok(())
}

/// Stand-in tile encoder for the external MVT writer (spec §6): walks
/// `objects` one layer at a time via `sub_layer_range` and emits each
/// linestring's point count, giving the caller a payload that actually
/// reflects the tile's rolled-up content instead of an empty file.
fn encode_tile(geometries: &GeometryStore, objects: &[OutputObjectRef]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(objects.len() as u32).to_le_bytes());
    let mut start = 0;
    while start < objects.len() {
        let layer = objects[start].layer_id;
        let range = sub_layer_range(objects, layer);
        for obj in &objects[range.clone()] {
            let point_count = match obj.geometry_kind {
                GeometryKind::Linestring => geometries
                    .retrieve_linestring(obj.geometry_handle)
                    .map(|line| line.0.len())
                    .unwrap_or(0),
                GeometryKind::Point => 1,
                GeometryKind::Polygon => geometries
                    .retrieve_multipolygon(obj.geometry_handle)
                    .map(|mp| mp.0.len())
                    .unwrap_or(0),
            };
            out.extend_from_slice(&(point_count as u32).to_le_bytes());
        }
        start = range.end.max(start + 1);
    }
    out
}

fn parse_mapsplit(s: &str) -> Result<MapsplitFilter> {
    let parts: Vec<&str> = s.split(',').collect();
    anyhow::ensure!(parts.len() == 3, "expected zoom,x,y");
    Ok(MapsplitFilter {
        source_zoom: parts[0].parse()?,
        source_x: parts[1].parse()?,
        source_y: parts[2].parse()?,
    })
}

fn parse_clipping_box(s: &str) -> Result<Rect<f64>> {
    let parts: Vec<&str> = s.split(',').collect();
    anyhow::ensure!(parts.len() == 4, "expected min_lon,min_lat,max_lon,max_lat");
    let values: Vec<f64> = parts.iter().map(|p| p.parse()).collect::<Result<_, _>>()?;
    Ok(Rect::new((values[0], values[1]), (values[2], values[3])))
}
