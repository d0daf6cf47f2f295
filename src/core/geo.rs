//! Great-circle distance and straight-line interpolation.
//!
//! Interpolation is component-wise on latitude/longitude rather than along
//! the geodesic. Routing paths are dense enough that the difference is
//! invisible at map scale.

use crate::core::point::{GeoPoint, Waypoint};

/// Mean Earth radius, metres
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine great-circle distance in metres between two coordinates.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (d_lat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Haversine distance in metres between two points
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_m(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Haversine distance in metres between two path waypoints
pub fn waypoint_distance(a: Waypoint, b: Waypoint) -> f64 {
    haversine_m(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Interpolate one component. Written as `a(1-t) + bt` so both ends are exact.
#[inline]
fn lerp_f64(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// Linear interpolation between two points; the result carries `a`'s label.
pub fn lerp(a: &GeoPoint, b: &GeoPoint, t: f64) -> GeoPoint {
    GeoPoint::new(
        lerp_f64(a.latitude, b.latitude, t),
        lerp_f64(a.longitude, b.longitude, t),
        a.label.clone(),
    )
}

/// Linear interpolation between two path waypoints
pub fn lerp_waypoint(a: Waypoint, b: Waypoint, t: f64) -> Waypoint {
    Waypoint::new(
        lerp_f64(a.latitude, b.latitude, t),
        lerp_f64(a.longitude, b.longitude, t),
    )
}

/// Sum of segment distances along a path
pub fn path_length(waypoints: &[Waypoint]) -> f64 {
    waypoints
        .windows(2)
        .map(|w| waypoint_distance(w[0], w[1]))
        .sum()
}
