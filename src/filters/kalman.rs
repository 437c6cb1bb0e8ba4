use serde::{Deserialize, Serialize};

use crate::types::TrackPoint;

/// Noise parameters shared by both axes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanParams {
    pub process_noise: f64,
    pub measurement_noise: f64,
    pub initial_covariance: f64,
}

impl Default for KalmanParams {
    fn default() -> Self {
        KalmanParams {
            process_noise: 0.00001,
            measurement_noise: 0.0001,
            initial_covariance: 1.0,
        }
    }
}

/// Scalar Kalman filter for one coordinate axis.
#[derive(Clone, Debug)]
struct AxisFilter {
    estimate: f64,
    covariance: f64,
}

impl AxisFilter {
    fn new(initial: f64, params: &KalmanParams) -> Self {
        AxisFilter {
            estimate: initial,
            covariance: params.initial_covariance,
        }
    }

    fn update(&mut self, measurement: f64, params: &KalmanParams) -> f64 {
        self.covariance += params.process_noise;
        let gain = self.covariance / (self.covariance + params.measurement_noise);
        self.estimate += gain * (measurement - self.estimate);
        self.covariance *= 1.0 - gain;
        self.estimate
    }
}

/// Per-trajectory filter state: latitude and longitude tracked independently,
/// no cross-axis covariance.
///
/// Lives for exactly one smoothing pass.
#[derive(Clone, Debug)]
pub struct KalmanState {
    lat: AxisFilter,
    lon: AxisFilter,
    params: KalmanParams,
}

impl KalmanState {
    /// Seed the filter from the first point of a trajectory
    pub fn new(first: &TrackPoint, params: KalmanParams) -> Self {
        KalmanState {
            lat: AxisFilter::new(first.latitude, &params),
            lon: AxisFilter::new(first.longitude, &params),
            params,
        }
    }

    /// Feed one measurement and return the new `(lat, lon)` estimate
    pub fn update(&mut self, latitude: f64, longitude: f64) -> (f64, f64) {
        let lat = self.lat.update(latitude, &self.params);
        let lon = self.lon.update(longitude, &self.params);
        (lat, lon)
    }

    pub fn covariance(&self) -> (f64, f64) {
        (self.lat.covariance, self.lon.covariance)
    }
}

/// Round a coordinate to `decimals` places (7 places is roughly 1 cm).
pub fn round_coordinate(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Single forward pass over `points`.
///
/// The output has the same length and order as the input, each point keeps
/// its originating timestamp, and the first point is emitted unchanged. All
/// later estimates are rounded to `decimals` places.
pub fn smooth(points: &[TrackPoint], params: KalmanParams, decimals: u32) -> Vec<TrackPoint> {
    let Some(first) = points.first() else {
        return Vec::new();
    };

    let mut state = KalmanState::new(first, params);
    let mut smoothed = Vec::with_capacity(points.len());
    smoothed.push(*first);

    for point in &points[1..] {
        let (lat, lon) = state.update(point.latitude, point.longitude);
        smoothed.push(TrackPoint {
            latitude: round_coordinate(lat, decimals),
            longitude: round_coordinate(lon, decimals),
            timestamp: point.timestamp,
        });
    }

    log::debug!(
        "Kalman pass over {} points, final covariance {:?}",
        points.len(),
        state.covariance()
    );
    smoothed
}
