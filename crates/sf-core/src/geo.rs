//! Geographic coordinate type and spatial utilities.
//!
//! `GeoPoint` uses `f64` latitude/longitude.  Polygon containment and
//! segment-crossing tests for no-fly zones compare coordinates directly, so
//! single precision would put zone boundaries off by up to a metre.

/// A WGS-84 geographic coordinate.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine great-circle distance in metres.
    pub fn distance_m(self, other: GeoPoint) -> f64 {
        const R: f64 = 6_371_000.0; // mean Earth radius, metres

        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        R * c
    }

    /// Linear interpolation towards `other`; `t` is clamped to `[0, 1]`.
    ///
    /// Adequate for positions along a single graph edge (tens to hundreds of
    /// metres) where great-circle curvature is negligible.
    #[inline]
    pub fn lerp(self, other: GeoPoint, t: f64) -> GeoPoint {
        let t = t.clamp(0.0, 1.0);
        GeoPoint {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }

    /// Approximate bounding-box check, much cheaper than `distance_m` for
    /// quick rejection.
    #[inline]
    pub fn within_bbox(self, center: GeoPoint, half_deg: f64) -> bool {
        (self.lat - center.lat).abs() <= half_deg
            && (self.lon - center.lon).abs() <= half_deg
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}
