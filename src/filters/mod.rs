pub mod accuracy;
pub mod kalman;
pub mod thinning;
pub mod zigzag;

pub use accuracy::filter_by_accuracy;
pub use kalman::{smooth, KalmanParams, KalmanState};
pub use thinning::thin_points;
pub use zigzag::remove_zigzags;

use serde::{Deserialize, Serialize};

use crate::geo_math::path_length;
use crate::types::{Fix, TrackPoint};

/// Fewest accuracy-passed fixes worth refining
pub const MIN_USABLE_FIXES: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    pub accuracy_threshold_m: f64,
    pub kalman: KalmanParams,
    pub zigzag_threshold_deg: f64,
    pub min_point_distance_m: f64,
    /// Decimal places kept on smoothed coordinates
    pub coordinate_decimals: u32,
}

impl Default for RefineParams {
    fn default() -> Self {
        RefineParams {
            accuracy_threshold_m: accuracy::DEFAULT_ACCURACY_THRESHOLD_M,
            kalman: KalmanParams::default(),
            zigzag_threshold_deg: zigzag::DEFAULT_ZIGZAG_THRESHOLD_DEG,
            min_point_distance_m: thinning::DEFAULT_MIN_POINT_DISTANCE_M,
            coordinate_decimals: 7,
        }
    }
}

/// Output of the local refinement stages.
#[derive(Clone, Debug, Default)]
pub struct Refinement {
    /// Fixes that passed the accuracy gate, unsmoothed. These feed snapping.
    pub accurate: Vec<Fix>,
    pub refined: Vec<TrackPoint>,
    /// Length of the refined path in meters
    pub refined_distance_m: f64,
}

/// Run accuracy gate, Kalman pass, zigzag removal and thinning in order.
///
/// Returns `None` when fewer than [`MIN_USABLE_FIXES`] fixes survive the
/// accuracy gate. That is an ordinary "not enough data" outcome.
pub fn refine(fixes: &[Fix], params: &RefineParams) -> Option<Refinement> {
    let accurate = filter_by_accuracy(fixes, params.accuracy_threshold_m);
    if accurate.len() < MIN_USABLE_FIXES {
        log::info!(
            "Only {} of {} fixes passed the accuracy gate, skipping refinement",
            accurate.len(),
            fixes.len()
        );
        return None;
    }

    let track: Vec<TrackPoint> = accurate.iter().map(TrackPoint::from).collect();
    let smoothed = smooth(&track, params.kalman, params.coordinate_decimals);
    let dezigged = remove_zigzags(&smoothed, params.zigzag_threshold_deg);
    let refined = thin_points(&dezigged, params.min_point_distance_m);
    let refined_distance_m = path_length(&refined);

    log::info!(
        "Refined {} raw fixes to {} points ({:.1} m)",
        fixes.len(),
        refined.len(),
        refined_distance_m
    );

    Some(Refinement {
        accurate,
        refined,
        refined_distance_m,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn fixes(coords: &[(f64, f64, Option<f64>)]) -> Vec<Fix> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        coords
            .iter()
            .enumerate()
            .map(|(i, &(lat, lon, acc))| Fix::new(lat, lon, start + Duration::seconds(i as i64 * 10), acc))
            .collect()
    }

    #[test]
    fn test_two_survivors_are_enough() {
        let input = fixes(&[
            (13.0827, 80.2707, Some(5.0)),
            (13.0830, 80.2710, Some(20.0)),
            (13.0835, 80.2715, Some(8.0)),
        ]);
        let refinement = refine(&input, &RefineParams::default()).unwrap();
        assert_eq!(refinement.accurate.len(), 2);
        assert_eq!(refinement.refined[0], input[0].track_point());
    }

    #[test]
    fn test_insufficient_data() {
        let input = fixes(&[(13.0827, 80.2707, Some(5.0)), (13.0830, 80.2710, Some(20.0))]);
        assert!(refine(&input, &RefineParams::default()).is_none());
        assert!(refine(&[], &RefineParams::default()).is_none());
    }

    #[test]
    fn test_refined_distance_matches_path_length() {
        let coords: Vec<(f64, f64, Option<f64>)> =
            (0..50).map(|i| (13.08 + i as f64 * 0.0004, 80.27, Some(4.0))).collect();
        let refinement = refine(&fixes(&coords), &RefineParams::default()).unwrap();
        assert!(refinement.refined.len() >= 2);
        assert_eq!(refinement.refined_distance_m, path_length(&refinement.refined));
        assert!(refinement.refined_distance_m > 0.0);
    }

    #[test]
    fn test_accurate_fixes_stay_unsmoothed() {
        let coords: Vec<(f64, f64, Option<f64>)> =
            (0..5).map(|i| (1.0 + i as f64 * 0.001, 2.0, None)).collect();
        let input = fixes(&coords);
        let refinement = refine(&input, &RefineParams::default()).unwrap();
        assert_eq!(refinement.accurate, input);
    }
}
