//! Identifiers and the fixed-point Mercator coordinate (spec §3).

/// 64-bit OSM node identifier (normal mode).
pub type NodeId = i64;
/// 64-bit OSM way identifier.
pub type WayId = i64;
/// 64-bit OSM relation identifier. Used as a map key in a range disjoint
/// from `WayId` wherever the two share a lookup table.
pub type RelationId = i64;

/// Dense, pre-renumbered node index used by the compact node store.
pub type CompactNodeId = u32;

const FIXED_POINT_SCALE: f64 = 1e7;

/// Mercator-projected latitude and longitude, fixed-point scaled by 1e7.
///
/// `latp` is the Web Mercator-projected latitude, not the raw geographic
/// latitude — see [`lat_to_latp`]. Dividing either field by `1e7` yields
/// floating-point degrees (for `latp`, Mercator-projected degrees).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatpLon {
    pub latp: i32,
    pub lon: i32,
}

impl LatpLon {
    pub fn from_degrees(lat_deg: f64, lon_deg: f64) -> LatpLon {
        LatpLon {
            latp: (lat_to_latp(lat_deg) * FIXED_POINT_SCALE).round() as i32,
            lon: (lon_deg * FIXED_POINT_SCALE).round() as i32,
        }
    }

    pub fn latp_degrees(&self) -> f64 {
        self.latp as f64 / FIXED_POINT_SCALE
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon as f64 / FIXED_POINT_SCALE
    }

    /// Raw geographic latitude in degrees (undoes the Mercator projection).
    pub fn lat_degrees(&self) -> f64 {
        latp_to_lat(self.latp_degrees())
    }
}

/// Projects a geographic latitude (degrees) to Mercator-projected latitude
/// (degrees). This is the only coordinate reprojection the engine performs
/// (spec §1 Non-goals).
pub fn lat_to_latp(lat_deg: f64) -> f64 {
    lat_deg.to_radians().tan().asinh().to_degrees()
}

/// Inverse of [`lat_to_latp`].
pub fn latp_to_lat(latp_deg: f64) -> f64 {
    latp_deg.to_radians().sinh().atan().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_round_trips() {
        for lat in [-80.0, -45.0, -0.001, 0.0, 12.34, 51.5074, 84.9] {
            let latp = lat_to_latp(lat);
            let back = latp_to_lat(latp);
            assert!((lat - back).abs() < 1e-9, "lat={lat} back={back}");
        }
    }

    #[test]
    fn fixed_point_round_trips_to_micro_degree_precision() {
        let ll = LatpLon::from_degrees(51.5074, -0.1278);
        assert!((ll.lon_degrees() - (-0.1278)).abs() < 1e-6);
        assert!((lat_to_latp(51.5074) - ll.latp_degrees()).abs() < 1e-6);
    }
}
