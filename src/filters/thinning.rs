use crate::geo_math::distance;
use crate::types::TrackPoint;

pub const DEFAULT_MIN_POINT_DISTANCE_M: f64 = 40.0;

/// Greedy minimum-distance decimation.
///
/// Keeps the first point, then every point at least `min_distance_m` from the
/// last kept one. Never looks ahead; the last input point is not force-kept.
pub fn thin_points(points: &[TrackPoint], min_distance_m: f64) -> Vec<TrackPoint> {
    let mut kept: Vec<TrackPoint> = Vec::new();

    for point in points {
        match kept.last() {
            Some(last_kept) if distance(last_kept, point) < min_distance_m => {}
            _ => kept.push(*point),
        }
    }

    log::debug!(
        "Thinning at {} m kept {} of {} points",
        min_distance_m,
        kept.len(),
        points.len()
    );
    kept
}
