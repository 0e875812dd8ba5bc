//! Zoom Rollup & Tile Iterator (C10, spec §4.10): produces the object
//! list for any tile at zoom `z <= base_zoom`, merging data across
//! sources and, below the base zoom, across the child tiles a coarser
//! tile covers.
//!
//! Grounded on `original_source/src/tile_data.cpp`'s
//! `MergeTileCoordsAtZoom`/`MergeSingleTileDataAtZoom` and its
//! binary-search sub-layer slicing in `GetObjectsAtSubLayer`.

use crate::tile::TileCoord;
use crate::tile_index::{OutputObjectRef, TileIndex};
use std::collections::BTreeSet;

/// Unions the base-zoom tile sets of every source, expressed at `zoom`.
pub fn tile_set_at_zoom(sources: &[&TileIndex], zoom: u8) -> BTreeSet<TileCoord> {
    let mut out = BTreeSet::new();
    for source in sources {
        let shift = source.base_zoom().saturating_sub(zoom) as u32;
        for tile in source.tiles() {
            out.insert(tile.ancestor(shift));
        }
    }
    out
}

/// The sorted, deduplicated object list for tile `(x, y)` at `zoom`,
/// merged across every source (spec §4.10).
pub fn objects_for_tile(sources: &[&TileIndex], target: TileCoord, zoom: u8) -> Vec<OutputObjectRef> {
    let mut objects = Vec::new();
    for source in sources {
        let base_zoom = source.base_zoom();
        if zoom == base_zoom {
            objects.extend_from_slice(source.at(target));
            continue;
        }
        let scale = 1u32 << (base_zoom - zoom);
        for x in target.x * scale..(target.x + 1) * scale {
            for y in target.y * scale..(target.y + 1) * scale {
                for obj in source.at(TileCoord::new(x, y)) {
                    if obj.min_zoom <= zoom {
                        objects.push(*obj);
                    }
                }
            }
        }
    }
    objects.sort_unstable();
    objects.dedup();
    objects
}

/// Binary-searches the contiguous range of `objects` whose `layer_id ==
/// layer`, assuming `objects` is sorted by the `OutputObjectRef`
/// ordering key (spec §4.10 sub-layer slicing).
pub fn sub_layer_range(objects: &[OutputObjectRef], layer: u32) -> std::ops::Range<usize> {
    let start = objects.partition_point(|o| o.layer_id < layer);
    let end = objects.partition_point(|o| o.layer_id <= layer);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::store::geometry_store::{GeometryNamespace, GeometryStore};
    use crate::tile_index::GeometryKind;

    fn obj(layer: u32, min_zoom: u8, seed: u64) -> OutputObjectRef {
        let mut store = GeometryStore::new(Arena::new_heap(64));
        let handle = store
            .store_point(GeometryNamespace::OsmGenerated, geo::point!(x: seed as f64, y: seed as f64))
            .unwrap();
        OutputObjectRef {
            layer_id: layer,
            geometry_kind: GeometryKind::Point,
            geometry_handle: handle,
            min_zoom,
            attributes_ref: 0,
        }
    }

    #[test]
    fn base_zoom_lookup_is_a_direct_pass_through() {
        let mut index = TileIndex::new(14);
        let tile = TileCoord::new(3, 4);
        index.add(tile, obj(1, 0, 1));
        let objects = objects_for_tile(&[&index], tile, 14);
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn coarser_zoom_merges_children_and_filters_min_zoom() {
        let mut index = TileIndex::new(14);
        index.add(TileCoord::new(4, 4), obj(1, 0, 1));
        index.add(TileCoord::new(4, 5), obj(1, 20, 2)); // min_zoom above target, filtered out
        index.add(TileCoord::new(5, 5), obj(1, 5, 3));

        let target = TileCoord::new(4, 4).ancestor(1);
        let objects = objects_for_tile(&[&index], target, 13);
        assert_eq!(objects.len(), 2);
        assert!(objects.iter().all(|o| o.min_zoom <= 13));
    }

    #[test]
    fn duplicate_objects_across_sources_are_deduplicated() {
        let mut a = TileIndex::new(14);
        let mut b = TileIndex::new(14);
        let tile = TileCoord::new(1, 1);
        let shared = obj(1, 0, 42);
        a.add(tile, shared);
        b.add(tile, shared);
        let objects = objects_for_tile(&[&a, &b], tile, 14);
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn sub_layer_range_brackets_matching_entries() {
        let mut objects = vec![obj(1, 0, 1), obj(2, 0, 2), obj(2, 0, 3), obj(3, 0, 4)];
        objects.sort_unstable();
        let range = sub_layer_range(&objects, 2);
        assert!(objects[range.clone()].iter().all(|o| o.layer_id == 2));
        assert_eq!(range.len(), 2);
    }
}
