use crate::geo_math::{bearing, bearing_delta};
use crate::types::TrackPoint;

pub const DEFAULT_ZIGZAG_THRESHOLD_DEG: f64 = 60.0;

/// Drop interior points whose incoming and outgoing bearings differ by
/// `threshold_deg` or more.
///
/// Sharp reversals at smoothing scale are treated as measurement artifacts.
/// The threshold is a heuristic: pedestrian traces usually want a looser
/// value than vehicle traces.
///
/// Each interior point is judged against its original neighbours, not
/// against the already-filtered output. First and last points are always
/// kept; sequences shorter than 3 pass through unchanged.
pub fn remove_zigzags(points: &[TrackPoint], threshold_deg: f64) -> Vec<TrackPoint> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut kept = Vec::with_capacity(points.len());
    kept.push(points[0]);

    for i in 1..last {
        let incoming = bearing(&points[i - 1], &points[i]);
        let outgoing = bearing(&points[i], &points[i + 1]);
        if bearing_delta(incoming, outgoing) < threshold_deg {
            kept.push(points[i]);
        }
    }

    kept.push(points[last]);
    log::debug!("Zigzag removal kept {} of {} points", kept.len(), points.len());
    kept
}
