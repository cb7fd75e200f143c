//! Geographic utilities: local planar projection and point-to-segment math.
//!
//! Snapping works in a local equirectangular frame centred on the query latitude.
//! The approximation error grows with distance from the reference latitude, which
//! is irrelevant at the tens-of-meters scale the snap thresholds operate on.

use crate::GpsPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Lower bound for `cos(ref_lat)` so the projection stays finite near the poles.
pub const MIN_COS_LAT: f64 = 0.1;

/// Squared segment lengths below this (m²) are treated as degenerate.
const DEGENERATE_LENGTH_SQ: f64 = 1e-12;

/// A point in a local planar frame, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &PlanarPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Clamped cosine of the reference latitude.
#[inline]
pub fn ref_cos(ref_lat: f64) -> f64 {
    ref_lat.to_radians().cos().max(MIN_COS_LAT)
}

/// Project lat/lon degrees to planar meters around `ref_lat`.
#[inline]
pub fn project(lat: f64, lon: f64, ref_lat: f64) -> PlanarPoint {
    PlanarPoint {
        x: lon.to_radians() * ref_cos(ref_lat) * EARTH_RADIUS_METERS,
        y: lat.to_radians() * EARTH_RADIUS_METERS,
    }
}

/// Inverse of [`project`] for the same `ref_lat`. Returns `(lat, lon)` degrees.
#[inline]
pub fn unproject(x: f64, y: f64, ref_lat: f64) -> (f64, f64) {
    let lat = (y / EARTH_RADIUS_METERS).to_degrees();
    let lon = (x / (ref_cos(ref_lat) * EARTH_RADIUS_METERS)).to_degrees();
    (lat, lon)
}

/// Project a [`GpsPoint`] around `ref_lat`.
#[inline]
pub fn project_point(point: &GpsPoint, ref_lat: f64) -> PlanarPoint {
    project(point.latitude, point.longitude, ref_lat)
}

/// Un-project a planar point back to a [`GpsPoint`].
#[inline]
pub fn unproject_point(point: &PlanarPoint, ref_lat: f64) -> GpsPoint {
    let (lat, lon) = unproject(point.x, point.y, ref_lat);
    GpsPoint::new(lat, lon)
}

/// Closest point on segment `a`-`b` to `p`, and the distance to it.
///
/// All three points must share one planar frame. Returns `None` for a
/// degenerate segment (`a == b`), which contributes no snap candidate.
///
/// # Example
/// ```
/// use road_snap::geo_utils::{closest_point_on_segment, PlanarPoint};
///
/// let (c, d) = closest_point_on_segment(
///     PlanarPoint::new(5.0, 5.0),
///     PlanarPoint::new(0.0, 0.0),
///     PlanarPoint::new(10.0, 0.0),
/// )
/// .unwrap();
/// assert_eq!(c, PlanarPoint::new(5.0, 0.0));
/// assert_eq!(d, 5.0);
/// ```
pub fn closest_point_on_segment(
    p: PlanarPoint,
    a: PlanarPoint,
    b: PlanarPoint,
) -> Option<(PlanarPoint, f64)> {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq <= DEGENERATE_LENGTH_SQ {
        return None;
    }

    let t = (((p.x - a.x) * abx + (p.y - a.y) * aby) / len_sq).clamp(0.0, 1.0);
    let closest = PlanarPoint::new(a.x + t * abx, a.y + t * aby);
    Some((closest, p.distance_to(&closest)))
}

/// Great-circle distance between two points in meters (haversine formula).
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}

/// Convert a distance in meters to degrees of (latitude, longitude) at `ref_lat`.
///
/// Uses the same clamped cosine as [`project`], so a box of this size around a
/// point contains everything within `meters` in the local frame.
pub fn meters_to_degrees(meters: f64, ref_lat: f64) -> (f64, f64) {
    let dlat = (meters / EARTH_RADIUS_METERS).to_degrees();
    let dlng = (meters / (EARTH_RADIUS_METERS * ref_cos(ref_lat))).to_degrees();
    (dlat, dlng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_point_interior() {
        let (c, d) = closest_point_on_segment(
            PlanarPoint::new(5.0, 5.0),
            PlanarPoint::new(0.0, 0.0),
            PlanarPoint::new(10.0, 0.0),
        )
        .unwrap();
        assert_eq!(c, PlanarPoint::new(5.0, 0.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_closest_point_clamps_to_endpoint() {
        let (c, d) = closest_point_on_segment(
            PlanarPoint::new(-3.0, 4.0),
            PlanarPoint::new(0.0, 0.0),
            PlanarPoint::new(10.0, 0.0),
        )
        .unwrap();
        assert_eq!(c, PlanarPoint::new(0.0, 0.0));
        assert!((d - 5.0).abs() < 1e-12);

        let (c, _) = closest_point_on_segment(
            PlanarPoint::new(14.0, 1.0),
            PlanarPoint::new(0.0, 0.0),
            PlanarPoint::new(10.0, 0.0),
        )
        .unwrap();
        assert_eq!(c, PlanarPoint::new(10.0, 0.0));
    }

    #[test]
    fn test_degenerate_segment_yields_no_candidate() {
        let a = PlanarPoint::new(3.0, 3.0);
        assert!(closest_point_on_segment(PlanarPoint::new(0.0, 0.0), a, a).is_none());
    }

    #[test]
    fn test_project_unproject_round_trip() {
        let ref_lat = 48.839428;
        // Points within a few km of the reference latitude
        for (dlat, dlon) in [(0.0, 0.0), (0.01, -0.02), (-0.03, 0.04), (0.02, 0.02)] {
            let p = project(ref_lat + dlat, -99.744865 + dlon, ref_lat);
            let (lat, lon) = unproject(p.x, p.y, ref_lat);
            let back = project(lat, lon, ref_lat);
            assert!((back.x - p.x).abs() < 1e-6);
            assert!((back.y - p.y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cos_clamped_near_pole() {
        assert_eq!(ref_cos(90.0), MIN_COS_LAT);
        assert_eq!(ref_cos(-89.9), MIN_COS_LAT);
        let p = project(89.99, 10.0, 89.99);
        assert!(p.x.is_finite());
    }

    #[test]
    fn test_local_frame_agrees_with_haversine() {
        let a = GpsPoint::new(48.8394, -99.7448);
        let b = GpsPoint::new(48.8400, -99.7460);
        let pa = project_point(&a, a.latitude);
        let pb = project_point(&b, a.latitude);
        let planar = pa.distance_to(&pb);
        let great_circle = haversine_distance(&a, &b);
        assert!((planar - great_circle).abs() < 0.5);
    }

    #[test]
    fn test_meters_to_degrees() {
        let (dlat, dlng) = meters_to_degrees(111_195.0, 0.0);
        assert!((dlat - 1.0).abs() < 1e-3);
        assert!((dlng - 1.0).abs() < 1e-3);
        let (_, dlng_north) = meters_to_degrees(1000.0, 60.0);
        assert!(dlng_north > meters_to_degrees(1000.0, 0.0).1);
    }
}
