//! Tile coordinates and the fixed-point tile math shared by the tile index,
//! zoom rollup, and emitter driver (spec §3, §4.8, §4.10).

use crate::coords::LatpLon;

pub const TILE_SIZE: u32 = 256;

/// A tile coordinate at a given zoom, XYZ scheme (Google convention: y=0 at
/// the north edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32) -> TileCoord {
        TileCoord { x, y }
    }

    /// The coordinate of the tile that contains this one at a coarser zoom,
    /// `zoom_delta` levels up.
    pub fn ancestor(&self, zoom_delta: u32) -> TileCoord {
        TileCoord {
            x: self.x >> zoom_delta,
            y: self.y >> zoom_delta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    pub fn single(tile: TileCoord) -> TileRange {
        TileRange {
            min_x: tile.x,
            max_x: tile.x,
            min_y: tile.y,
            max_y: tile.y,
        }
    }

    pub fn extend(&mut self, tile: TileCoord) {
        self.min_x = self.min_x.min(tile.x);
        self.max_x = self.max_x.max(tile.x);
        self.min_y = self.min_y.min(tile.y);
        self.max_y = self.max_y.max(tile.y);
    }

    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.min_x..=self.max_x)
            .flat_map(move |x| (self.min_y..=self.max_y).map(move |y| TileCoord { x, y }))
    }
}

/// Projects a Mercator-projected coordinate to pixel space at a given zoom,
/// the way the teacher's `coords_to_xy` does, but taking an already
/// `latp`-projected coordinate instead of reprojecting raw lat/lon on every
/// call.
pub fn coords_to_xy(coord: LatpLon, zoom: u8) -> (u32, u32) {
    let dimension_in_pixels = (TILE_SIZE as u64) << zoom;
    let rescale = |projected_degrees: f64| {
        let factor = (projected_degrees + 180.0) / 360.0;
        (factor * dimension_in_pixels as f64)
            .round()
            .clamp(0.0, dimension_in_pixels as f64 - 1.0) as u32
    };
    let x = rescale(coord.lon_degrees());
    // y runs from the north edge down, so the projected latitude axis is flipped.
    let y = rescale(-coord.latp_degrees());
    (x, y)
}

/// The tile that contains a coordinate at the given zoom.
pub fn coords_to_tile(coord: LatpLon, zoom: u8) -> TileCoord {
    let (x, y) = coords_to_xy(coord, zoom);
    TileCoord {
        x: x / TILE_SIZE,
        y: y / TILE_SIZE,
    }
}

/// Base-zoom tile range a given output-object bounding box spans, used by
/// the tile index (§4.8) to fan a polygon's bounding box out to every
/// covered tile.
pub fn bbox_to_tile_range(min: LatpLon, max: LatpLon, base_zoom: u8) -> TileRange {
    let a = coords_to_tile(min, base_zoom);
    let b = coords_to_tile(max, base_zoom);
    TileRange {
        min_x: a.x.min(b.x),
        max_x: a.x.max(b.x),
        min_y: a.y.min(b.y),
        max_y: a.y.max(b.y),
    }
}

/// Bresenham-style traversal of the tiles a polyline crosses at the base
/// zoom (§4.8). Returns every tile containing a segment endpoint plus every
/// tile the segment passes through.
pub fn polyline_tiles(points: &[LatpLon], base_zoom: u8) -> Vec<TileCoord> {
    let mut out = Vec::new();
    if points.is_empty() {
        return out;
    }
    if points.len() == 1 {
        out.push(coords_to_tile(points[0], base_zoom));
        return out;
    }
    for pair in points.windows(2) {
        let (x0, y0) = coords_to_xy(pair[0], base_zoom);
        let (x1, y1) = coords_to_xy(pair[1], base_zoom);
        for (x, y) in bresenham(x0 as i64, y0 as i64, x1 as i64, y1 as i64) {
            out.push(TileCoord {
                x: (x as u32) / TILE_SIZE,
                y: (y as u32) / TILE_SIZE,
            });
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

fn bresenham(mut x0: i64, mut y0: i64, x1: i64, y1: i64) -> Vec<(i64, i64)> {
    let mut pts = Vec::new();
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        pts.push((x0, y0));
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
    pts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_at_zoom_matches_floor_division() {
        let t = TileCoord::new(8000, 5000);
        assert_eq!(t.ancestor(4), TileCoord::new(500, 312));
    }

    #[test]
    fn tile_coord_round_trips_through_pixel_math() {
        let coord = LatpLon::from_degrees(51.5074, -0.1278);
        let tile = coords_to_tile(coord, 14);
        // London should land well away from the antimeridian / poles.
        assert!(tile.x > 0 && tile.y > 0);
    }

    #[test]
    fn polyline_tiles_includes_both_endpoints() {
        let a = LatpLon::from_degrees(51.5, -0.1);
        let b = LatpLon::from_degrees(51.6, -0.2);
        let tiles = polyline_tiles(&[a, b], 14);
        assert!(tiles.contains(&coords_to_tile(a, 14)));
        assert!(tiles.contains(&coords_to_tile(b, 14)));
    }
}
