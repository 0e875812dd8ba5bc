//! Generated-Geometry Store (C6, spec §4.6): two namespaces
//! (`osm_generated`, `shp_generated`), each holding growable sequences of
//! `Point`, `Linestring`, `Multipolygon`.
//!
//! Handles are minted through the same growth-retry wrapper as every
//! other arena allocation (`Arena::ensure_capacity`); the geometry
//! payloads themselves live in typed `Vec`s rather than being
//! byte-serialized into the arena (see `DESIGN.md` for why — the arena's
//! role here is tracking the allocation-failure/regrowth protocol spec
//! §4.1 specifies, not literal geometry byte layout).

use crate::arena::{Arena, Handle};
use crate::error::StoreError;
use geo::{LineString, MultiPolygon, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GeometryNamespace {
    OsmGenerated,
    ShpGenerated,
}

/// Nominal per-geometry footprint charged against the arena so the
/// growth-retry protocol has something to count against (spec §4.1).
const SLOT_COST: usize = 64;

#[derive(Default)]
struct NamespaceStore {
    points: Vec<Point<f64>>,
    linestrings: Vec<LineString<f64>>,
    multipolygons: Vec<MultiPolygon<f64>>,
}

enum Kind {
    Point,
    Linestring,
    Multipolygon,
}

/// A handle tagged with which geometry kind and namespace it was minted
/// for, so `retrieve` can route to the right `Vec` without a type
/// parameter leaking the representation. This, not the bare arena
/// [`Handle`], is what callers must hold onto to ever resolve a geometry
/// back out of the store — the arena offset alone doesn't address into
/// `NamespaceStore`'s `Vec`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GeometryHandle {
    handle: Handle,
    namespace: GeometryNamespace,
    kind_tag: u8,
    index: usize,
}

impl GeometryHandle {
    pub fn raw(&self) -> Handle {
        self.handle
    }

    #[cfg(test)]
    pub fn from_parts_for_tests(
        handle: Handle,
        namespace: GeometryNamespace,
        kind_tag: u8,
        index: usize,
    ) -> GeometryHandle {
        GeometryHandle {
            handle,
            namespace,
            kind_tag,
            index,
        }
    }
}

pub struct GeometryStore {
    arena: Arena,
    osm_generated: NamespaceStore,
    shp_generated: NamespaceStore,
}

impl GeometryStore {
    pub fn new(arena: Arena) -> GeometryStore {
        GeometryStore {
            arena,
            osm_generated: NamespaceStore::default(),
            shp_generated: NamespaceStore::default(),
        }
    }

    fn namespace_mut(&mut self, ns: GeometryNamespace) -> &mut NamespaceStore {
        match ns {
            GeometryNamespace::OsmGenerated => &mut self.osm_generated,
            GeometryNamespace::ShpGenerated => &mut self.shp_generated,
        }
    }

    fn namespace(&self, ns: GeometryNamespace) -> &NamespaceStore {
        match ns {
            GeometryNamespace::OsmGenerated => &self.osm_generated,
            GeometryNamespace::ShpGenerated => &self.shp_generated,
        }
    }

    fn mint(&mut self, ns: GeometryNamespace, kind: Kind, index: usize) -> Result<GeometryHandle, StoreError> {
        self.arena.ensure_capacity(SLOT_COST as u64)?;
        let handle = self.arena.alloc(&[0u8; SLOT_COST])?;
        let kind_tag = match kind {
            Kind::Point => 0,
            Kind::Linestring => 1,
            Kind::Multipolygon => 2,
        };
        Ok(GeometryHandle {
            handle,
            namespace: ns,
            kind_tag,
            index,
        })
    }

    pub fn store_point(&mut self, ns: GeometryNamespace, input: Point<f64>) -> Result<GeometryHandle, StoreError> {
        let index = self.namespace(ns).points.len();
        let handle = self.mint(ns, Kind::Point, index)?;
        self.namespace_mut(ns).points.push(input);
        Ok(handle)
    }

    pub fn store_linestring(
        &mut self,
        ns: GeometryNamespace,
        input: LineString<f64>,
    ) -> Result<GeometryHandle, StoreError> {
        let index = self.namespace(ns).linestrings.len();
        let handle = self.mint(ns, Kind::Linestring, index)?;
        self.namespace_mut(ns).linestrings.push(input);
        Ok(handle)
    }

    pub fn store_multipolygon(
        &mut self,
        ns: GeometryNamespace,
        input: MultiPolygon<f64>,
    ) -> Result<GeometryHandle, StoreError> {
        let index = self.namespace(ns).multipolygons.len();
        let handle = self.mint(ns, Kind::Multipolygon, index)?;
        self.namespace_mut(ns).multipolygons.push(input);
        Ok(handle)
    }

    pub fn retrieve_point(&self, handle: GeometryHandle) -> Result<&Point<f64>, StoreError> {
        if handle.kind_tag != 0 {
            return Err(StoreError::InvariantViolation("handle is not a point".into()));
        }
        self.namespace(handle.namespace)
            .points
            .get(handle.index)
            .ok_or_else(|| StoreError::NotFound(handle.handle.offset() as i64))
    }

    pub fn retrieve_linestring(&self, handle: GeometryHandle) -> Result<&LineString<f64>, StoreError> {
        if handle.kind_tag != 1 {
            return Err(StoreError::InvariantViolation("handle is not a linestring".into()));
        }
        self.namespace(handle.namespace)
            .linestrings
            .get(handle.index)
            .ok_or_else(|| StoreError::NotFound(handle.handle.offset() as i64))
    }

    pub fn retrieve_multipolygon(&self, handle: GeometryHandle) -> Result<&MultiPolygon<f64>, StoreError> {
        if handle.kind_tag != 2 {
            return Err(StoreError::InvariantViolation("handle is not a multipolygon".into()));
        }
        self.namespace(handle.namespace)
            .multipolygons
            .get(handle.index)
            .ok_or_else(|| StoreError::NotFound(handle.handle.offset() as i64))
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.arena.allocated_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;

    #[test]
    fn stored_point_round_trips_through_its_handle() {
        let mut store = GeometryStore::new(Arena::new_heap(4096));
        let handle = store
            .store_point(GeometryNamespace::OsmGenerated, point!(x: 1.0, y: 2.0))
            .unwrap();
        assert_eq!(*store.retrieve_point(handle).unwrap(), point!(x: 1.0, y: 2.0));
    }

    #[test]
    fn namespaces_do_not_share_indices() {
        let mut store = GeometryStore::new(Arena::new_heap(4096));
        let osm = store
            .store_point(GeometryNamespace::OsmGenerated, point!(x: 1.0, y: 1.0))
            .unwrap();
        let shp = store
            .store_point(GeometryNamespace::ShpGenerated, point!(x: 2.0, y: 2.0))
            .unwrap();
        assert_eq!(*store.retrieve_point(osm).unwrap(), point!(x: 1.0, y: 1.0));
        assert_eq!(*store.retrieve_point(shp).unwrap(), point!(x: 2.0, y: 2.0));
    }

    #[test]
    fn handle_survives_growth_past_initial_capacity() {
        let mut store = GeometryStore::new(Arena::new_heap(1));
        let mut handles = Vec::new();
        for i in 0..200 {
            handles.push(
                store
                    .store_point(GeometryNamespace::OsmGenerated, point!(x: i as f64, y: i as f64))
                    .unwrap(),
            );
        }
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(*store.retrieve_point(h).unwrap(), point!(x: i as f64, y: i as f64));
        }
    }
}
