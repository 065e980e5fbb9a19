//! Planar geometry on raw lat/lon coordinates.
//!
//! Zones are city-scale, so lat/lon is treated as a flat plane: latitude on
//! the y axis and longitude on the x axis.

use sf_core::GeoPoint;

/// Orientation tolerance in squared degrees.
const EPS: f64 = 1e-12;

#[inline]
fn orient(p: GeoPoint, q: GeoPoint, r: GeoPoint) -> f64 {
    (q.lon - p.lon) * (r.lat - p.lat) - (q.lat - p.lat) * (r.lon - p.lon)
}

#[inline]
fn within(a: f64, b: f64, value: f64) -> bool {
    value >= a.min(b) - EPS && value <= a.max(b) + EPS
}

/// `r` lies in the bounding box of segment `p`–`q`.
#[inline]
fn on_segment(p: GeoPoint, q: GeoPoint, r: GeoPoint) -> bool {
    within(p.lat, q.lat, r.lat) && within(p.lon, q.lon, r.lon)
}

/// Whether segments `a1`–`a2` and `b1`–`b2` touch or cross.
pub fn segments_intersect(a1: GeoPoint, a2: GeoPoint, b1: GeoPoint, b2: GeoPoint) -> bool {
    let o1 = orient(a1, a2, b1);
    let o2 = orient(a1, a2, b2);
    let o3 = orient(b1, b2, a1);
    let o4 = orient(b1, b2, a2);

    if o1.abs() <= EPS && on_segment(a1, a2, b1) { return true; }
    if o2.abs() <= EPS && on_segment(a1, a2, b2) { return true; }
    if o3.abs() <= EPS && on_segment(b1, b2, a1) { return true; }
    if o4.abs() <= EPS && on_segment(b1, b2, a2) { return true; }

    let a_crosses = (o1 > EPS && o2 < -EPS) || (o1 < -EPS && o2 > EPS);
    let b_crosses = (o3 > EPS && o4 < -EPS) || (o3 < -EPS && o4 > EPS);
    a_crosses && b_crosses
}

/// Ray-casting containment test.  Points on the boundary count as inside.
///
/// The ring may be open or closed (first vertex repeated); rings with fewer
/// than three vertices contain nothing.
pub fn point_in_polygon(p: GeoPoint, ring: &[GeoPoint]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (vi, vj) = (ring[i], ring[j]);
        if orient(vj, vi, p).abs() <= EPS && on_segment(vj, vi, p) {
            return true;
        }
        if (vi.lat > p.lat) != (vj.lat > p.lat)
            && p.lon < (vj.lon - vi.lon) * (p.lat - vi.lat) / (vj.lat - vi.lat) + vi.lon
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Whether segment `a`–`b` enters `ring`: either endpoint inside, or the
/// segment crosses any ring edge.
pub fn segment_touches_polygon(a: GeoPoint, b: GeoPoint, ring: &[GeoPoint]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    if point_in_polygon(a, ring) || point_in_polygon(b, ring) {
        return true;
    }
    let n = ring.len();
    (0..n).any(|i| segments_intersect(a, b, ring[i], ring[(i + 1) % n]))
}

/// Axis-aligned bounding box of a ring as `(min, max)` corners.
pub fn bounding_box(ring: &[GeoPoint]) -> Option<(GeoPoint, GeoPoint)> {
    let first = *ring.first()?;
    let (min, max) = ring.iter().fold((first, first), |(lo, hi), p| {
        (
            GeoPoint::new(lo.lat.min(p.lat), lo.lon.min(p.lon)),
            GeoPoint::new(hi.lat.max(p.lat), hi.lon.max(p.lon)),
        )
    });
    Some((min, max))
}
