//! Great-circle helpers on decimal-degree coordinates.
//!
//! No range validation is performed: out-of-range input produces a
//! degenerate but defined result.

use crate::types::Located;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two `(lat, lon)` positions.
pub fn distance<A: Located + ?Sized, B: Located + ?Sized>(a: &A, b: &B) -> f64 {
    let (lat1, lon1) = a.lat_lon();
    let (lat2, lon2) = b.lat_lon();
    haversine_distance(lat1, lon1, lat2, lon2)
}

pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b`, degrees in [0, 360).
pub fn bearing<A: Located + ?Sized, B: Located + ?Sized>(a: &A, b: &B) -> f64 {
    let (lat1, lon1) = a.lat_lon();
    let (lat2, lon2) = b.lat_lon();
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let y = delta_lon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Shortest angular difference between two bearings, in [0, 180].
pub fn bearing_delta(first: f64, second: f64) -> f64 {
    let diff = (second - first).abs();
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Sum of consecutive-pair distances. Empty and single-point input yield 0.
pub fn path_length<P: Located>(points: &[P]) -> f64 {
    points.windows(2).map(|pair| distance(&pair[0], &pair[1])).sum()
}
