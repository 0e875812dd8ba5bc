//! Geometry Assembler (C7, spec §4.7): builds linestrings and polygons
//! from way node-lists, and multipolygons from relation way-members via
//! ring-stitching.
//!
//! `merge_ways` is a literal port of `mergeMultiPolygonWays` in
//! `original_source/include/osm_store.h` — the endpoint-match table and
//! the "seed on stall" step are kept exactly as the source states them,
//! since §4.7 specifies this algorithm precisely rather than leaving it
//! to the implementer. Everything else in this module (ring building,
//! winding correction, inner/outer containment) is expressed with the
//! `geo` crate the way `denisbog-osm-tile` uses it for tag-to-geometry
//! conversion.

use crate::coords::NodeId;
use crate::store::{NodeStore, WayStore};
use geo::orient::{Direction, Orient};
use geo::{LineString, MultiPolygon, Polygon};

/// Resolves a way's node list to a linestring (spec §4.7
/// `nodeListLinestring`). Returns `None` (after logging a warning) if any
/// node id is unresolved, per the "skip that way" edge case.
pub fn node_list_linestring(way_nodes: &[NodeId], node_store: &NodeStore) -> Option<LineString<f64>> {
    let mut points = Vec::with_capacity(way_nodes.len());
    for &id in way_nodes {
        match node_store.at(id) {
            Ok(coord) => points.push((coord.lon_degrees(), coord.latp_degrees())),
            Err(_) => {
                log::warn!("unknown node {id} while building a linestring, skipping way");
                return None;
            }
        }
    }
    Some(LineString::from(points))
}

/// Resolves a way's node list into a single, winding-corrected outer ring
/// (spec §4.7 `nodeListPolygon`).
pub fn node_list_polygon(way_nodes: &[NodeId], node_store: &NodeStore) -> Option<Polygon<f64>> {
    let mut line = node_list_linestring(way_nodes, node_store)?;
    close_ring(&mut line);
    let polygon = Polygon::new(line, vec![]);
    Some(polygon.orient(Direction::Default))
}

fn close_ring(line: &mut LineString<f64>) {
    if line.0.first() != line.0.last() {
        if let Some(first) = line.0.first().copied() {
            line.0.push(first);
        }
    }
}

/// Literal port of `mergeMultiPolygonWays` (spec §4.7). Stitches a set of
/// ways into closed node-id rings via endpoint matching, seeding a new
/// partial whenever a pass makes no progress but ways remain (handles
/// disjoint outer components).
pub fn merge_ways(way_ids: &[crate::coords::WayId], way_store: &WayStore) -> Vec<Vec<NodeId>> {
    let mut sequences: Vec<Vec<NodeId>> = Vec::new();
    for &id in way_ids {
        match way_store.at(id) {
            Ok(nodes) => sequences.push(nodes.to_vec()),
            Err(_) => log::warn!("unknown way {id} while merging a multipolygon ring"),
        }
    }

    let mut done = vec![false; sequences.len()];
    let mut rings: Vec<Vec<NodeId>> = Vec::new();
    let mut partials: Vec<Vec<NodeId>> = Vec::new();

    let remaining = |done: &[bool]| done.iter().any(|&d| !d);

    while remaining(&done) {
        let mut added = 0usize;
        for i in 0..sequences.len() {
            if done[i] {
                continue;
            }
            let n = &sequences[i];
            let (n_first, n_last) = (n[0], *n.last().unwrap());
            if n_first == n_last {
                rings.push(n.clone());
                done[i] = true;
                added += 1;
                continue;
            }
            let mut spliced = false;
            for r in partials.iter_mut() {
                let (r_first, r_last) = (r[0], *r.last().unwrap());
                if r_last == n_first {
                    r.extend(n.iter().skip(1).copied());
                    spliced = true;
                } else if r_last == n_last {
                    r.extend(n.iter().rev().skip(1).copied());
                    spliced = true;
                } else if n_last == r_first {
                    let mut new_r: Vec<NodeId> = n.clone();
                    new_r.extend(r.iter().skip(1).copied());
                    *r = new_r;
                    spliced = true;
                } else if n_first == r_first {
                    let mut new_r: Vec<NodeId> = n.iter().rev().copied().collect();
                    new_r.extend(r.iter().skip(1).copied());
                    *r = new_r;
                    spliced = true;
                }
                if spliced {
                    break;
                }
            }
            if spliced {
                done[i] = true;
                added += 1;
                continue;
            }
        }
        // Close any partial ring whose ends now meet, promoting it out of
        // the working set so later seeds don't try to splice onto it.
        let mut i = 0;
        while i < partials.len() {
            let r = &partials[i];
            if r.len() > 1 && r[0] == *r.last().unwrap() {
                rings.push(partials.remove(i));
            } else {
                i += 1;
            }
        }
        if added == 0 {
            if let Some(i) = done.iter().position(|&d| !d) {
                partials.push(sequences[i].clone());
                done[i] = true;
                added = 1;
            }
        }
        if added == 0 {
            break;
        }
    }

    for r in partials {
        if r.len() > 1 && r[0] == *r.last().unwrap() {
            rings.push(r);
        } else {
            log::warn!("multipolygon ring failed to close, discarding {} node(s)", r.len());
        }
    }
    rings
}

fn ring_to_linestring(ring: &[NodeId], node_store: &NodeStore) -> Option<LineString<f64>> {
    node_list_linestring(ring, node_store)
}

/// Assembles a multipolygon from outer/inner way members (spec §4.7
/// `wayListMultipolygon`). Empty outer set yields an empty multipolygon.
pub fn way_list_multipolygon(
    outer_ways: &[crate::coords::WayId],
    inner_ways: &[crate::coords::WayId],
    way_store: &WayStore,
    node_store: &NodeStore,
) -> MultiPolygon<f64> {
    if outer_ways.is_empty() {
        return MultiPolygon::new(vec![]);
    }

    let outer_rings = merge_ways(outer_ways, way_store);
    let inner_rings = merge_ways(inner_ways, way_store);

    let outer_lines: Vec<LineString<f64>> = outer_rings
        .iter()
        .filter_map(|ring| ring_to_linestring(ring, node_store))
        .collect();
    let inner_lines: Vec<LineString<f64>> = inner_rings
        .iter()
        .filter_map(|ring| ring_to_linestring(ring, node_store))
        .collect();

    let outer_shells: Vec<Polygon<f64>> = outer_lines.iter().cloned().map(|l| Polygon::new(l, vec![])).collect();
    let mut interiors_by_outer: Vec<Vec<LineString<f64>>> = vec![Vec::new(); outer_shells.len()];

    for inner in &inner_lines {
        let inner_poly = Polygon::new(inner.clone(), vec![]);
        if let Some(owner_idx) = outer_shells.iter().position(|outer| is_within(&inner_poly, outer)) {
            interiors_by_outer[owner_idx].push(inner.clone());
        }
    }

    let outer_polys: Vec<Polygon<f64>> = outer_lines
        .into_iter()
        .zip(interiors_by_outer)
        .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
        .collect();

    let multipolygon = MultiPolygon::new(outer_polys);
    multipolygon.orient(Direction::Default)
}

fn is_within(inner: &Polygon<f64>, outer: &Polygon<f64>) -> bool {
    use geo::Within;
    inner.is_within(outer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::LatpLon;
    use crate::store::node_store::NodeStoreKind;

    fn square_node_store(offset: f64) -> NodeStore {
        let mut store = NodeStore::new(NodeStoreKind::Normal);
        let pts = [
            (offset, offset),
            (offset, offset + 1.0),
            (offset + 1.0, offset + 1.0),
            (offset + 1.0, offset),
        ];
        for (i, (lat, lon)) in pts.iter().enumerate() {
            store.insert(i as i64 + 1, LatpLon::from_degrees(*lat, *lon)).unwrap();
        }
        store
    }

    #[test]
    fn s1_single_already_closed_way_becomes_one_ring() {
        let mut ways = WayStore::new();
        ways.insert(1, vec![1, 2, 3, 4, 1]).unwrap();
        let rings = merge_ways(&[1], &ways);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].first(), rings[0].last());
    }

    #[test]
    fn s2_two_ways_splice_last_to_first() {
        let mut ways = WayStore::new();
        ways.insert(1, vec![1, 2, 3]).unwrap();
        ways.insert(2, vec![3, 4, 1]).unwrap();
        let rings = merge_ways(&[1, 2], &ways);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0], vec![1, 2, 3, 4, 1]);
    }

    #[test]
    fn s3_two_ways_splice_last_to_last_reverses_second() {
        let mut ways = WayStore::new();
        ways.insert(1, vec![1, 2, 3]).unwrap();
        ways.insert(2, vec![1, 4, 3]).unwrap();
        let rings = merge_ways(&[1, 2], &ways);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].first(), rings[0].last());
    }

    #[test]
    fn s4_disjoint_outer_components_each_get_a_seed() {
        let mut ways = WayStore::new();
        ways.insert(1, vec![1, 2, 3, 1]).unwrap();
        ways.insert(2, vec![10, 11, 12, 10]).unwrap();
        let rings = merge_ways(&[1, 2], &ways);
        assert_eq!(rings.len(), 2);
    }

    #[test]
    fn s5_unknown_way_is_skipped_with_a_warning_not_a_panic() {
        let ways = WayStore::new();
        let rings = merge_ways(&[999], &ways);
        assert!(rings.is_empty());
    }

    #[test]
    fn s6_empty_outer_set_yields_empty_multipolygon() {
        let ways = WayStore::new();
        let nodes = NodeStore::new(NodeStoreKind::Normal);
        let mp = way_list_multipolygon(&[], &[], &ways, &nodes);
        assert!(mp.0.is_empty());
    }

    #[test]
    fn inner_ring_attaches_to_its_containing_outer() {
        let mut ways = WayStore::new();
        ways.insert(1, vec![1, 2, 3, 4, 1]).unwrap();
        let mut nodes = square_node_store(0.0);
        // Inner square fully inside (0,0)-(1,1): ids 5..8 at (0.2..0.8).
        let inner_pts = [(0.2, 0.2), (0.2, 0.8), (0.8, 0.8), (0.8, 0.2)];
        for (i, (lat, lon)) in inner_pts.iter().enumerate() {
            nodes.insert(i as i64 + 5, LatpLon::from_degrees(*lat, *lon)).unwrap();
        }
        ways.insert(2, vec![5, 6, 7, 8, 5]).unwrap();

        let mp = way_list_multipolygon(&[1], &[2], &ways, &nodes);
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
    }
}
