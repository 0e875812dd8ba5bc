//! Tile Index (C8, spec §4.8): a per-source `TileCoord -> list of
//! OutputObjectRef` map at a fixed base zoom.
//!
//! Grounded on the teacher's `TileIdToReferences` map in
//! `geodata/saver.rs`, generalized from that file's write-time
//! tile-id-keyed grouping to a standalone, queryable index.

use crate::store::geometry_store::GeometryHandle;
use crate::tile::{bbox_to_tile_range, polyline_tiles, TileCoord};
use geo::{BoundingRect, LineString, Polygon};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    Linestring,
    Polygon,
}

/// A reference to a produced geometry plus the metadata needed to order,
/// filter, and resolve it during rollup and emission (spec §3
/// OutputObject). `geometry_handle` is the full [`GeometryHandle`], not
/// the bare arena offset — that's what `GeometryStore::retrieve_*` needs
/// to actually find the geometry again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputObjectRef {
    pub layer_id: u32,
    pub geometry_kind: GeometryKind,
    pub geometry_handle: GeometryHandle,
    pub min_zoom: u8,
    pub attributes_ref: u32,
}

impl OutputObjectRef {
    fn sort_key(&self) -> (u32, u8, GeometryHandle, u32) {
        (
            self.layer_id,
            self.geometry_kind as u8,
            self.geometry_handle,
            self.attributes_ref,
        )
    }
}

impl PartialOrd for GeometryKind {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some((*self as u8).cmp(&(*other as u8)))
    }
}
impl Ord for GeometryKind {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl PartialOrd for OutputObjectRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OutputObjectRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// `map<TileCoord, vec<OutputObjectRef>>` at a fixed base zoom, spec §4.8.
pub struct TileIndex {
    base_zoom: u8,
    tiles: BTreeMap<TileCoord, Vec<OutputObjectRef>>,
}

impl TileIndex {
    pub fn new(base_zoom: u8) -> TileIndex {
        TileIndex {
            base_zoom,
            tiles: BTreeMap::new(),
        }
    }

    pub fn base_zoom(&self) -> u8 {
        self.base_zoom
    }

    pub fn add(&mut self, tile: TileCoord, object: OutputObjectRef) {
        self.tiles.entry(tile).or_default().push(object);
    }

    /// Inserts a polygon into every tile covered by its bounding box at
    /// the base zoom; precise clipping is the per-tile encoder's job.
    pub fn add_polygon(&mut self, polygon: &Polygon<f64>, object: OutputObjectRef) {
        let bbox = match polygon.bounding_rect() {
            Some(r) => r,
            None => return,
        };
        let min = crate::coords::LatpLon::from_degrees(bbox.min().y, bbox.min().x);
        let max = crate::coords::LatpLon::from_degrees(bbox.max().y, bbox.max().x);
        for tile in bbox_to_tile_range(min, max, self.base_zoom).iter() {
            self.add(tile, object);
        }
    }

    /// Inserts a linestring into every tile its polyline traverses at the
    /// base zoom (Bresenham-style traversal, spec §4.8).
    pub fn add_linestring(&mut self, line: &LineString<f64>, object: OutputObjectRef) {
        let points: Vec<crate::coords::LatpLon> = line
            .points()
            .map(|p| crate::coords::LatpLon::from_degrees(p.y(), p.x()))
            .collect();
        for tile in polyline_tiles(&points, self.base_zoom) {
            self.add(tile, object);
        }
    }

    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.tiles.keys().copied()
    }

    pub fn at(&self, tile: TileCoord) -> &[OutputObjectRef] {
        self.tiles.get(&tile).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, Handle};
    use crate::store::geometry_store::GeometryNamespace;

    fn dummy_ref(layer: u32) -> OutputObjectRef {
        let mut store = crate::store::geometry_store::GeometryStore::new(Arena::new_heap(64));
        let handle = store
            .store_point(GeometryNamespace::OsmGenerated, geo::point!(x: 0.0, y: 0.0))
            .unwrap();
        OutputObjectRef {
            layer_id: layer,
            geometry_kind: GeometryKind::Point,
            geometry_handle: handle,
            min_zoom: 0,
            attributes_ref: 0,
        }
    }

    #[test]
    fn add_and_at_round_trip() {
        let mut index = TileIndex::new(14);
        let tile = TileCoord::new(1, 2);
        index.add(tile, dummy_ref(1));
        assert_eq!(index.at(tile).len(), 1);
        assert_eq!(index.at(TileCoord::new(9, 9)).len(), 0);
    }

    #[test]
    fn output_object_ref_orders_by_layer_then_kind_then_handle() {
        let mut a = dummy_ref(1);
        let mut b = dummy_ref(2);
        let shared = GeometryHandle::from_parts_for_tests(Handle::from_offset(1), GeometryNamespace::OsmGenerated, 0, 0);
        a.geometry_handle = shared;
        b.geometry_handle = shared;
        assert!(a < b);
    }
}
