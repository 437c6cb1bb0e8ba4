use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single raw GPS sample as delivered by the trajectory source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
    /// Reported accuracy radius in meters, when the device provided one
    pub accuracy: Option<f64>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, captured_at: DateTime<Utc>, accuracy: Option<f64>) -> Self {
        Fix {
            latitude,
            longitude,
            captured_at,
            accuracy,
        }
    }

    pub fn track_point(&self) -> TrackPoint {
        TrackPoint {
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: Some(self.captured_at),
        }
    }
}

/// Point of a processed sequence. Timestamps are carried through where the
/// producing stage knows them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        TrackPoint {
            latitude,
            longitude,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// `[longitude, latitude]`, the axis order every external service speaks
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl From<&Fix> for TrackPoint {
    fn from(fix: &Fix) -> Self {
        fix.track_point()
    }
}

/// Anything with a position on the globe. Lets the geometry stages run over
/// raw fixes and processed points alike.
pub trait Located {
    fn lat_lon(&self) -> (f64, f64);
}

impl Located for Fix {
    fn lat_lon(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

impl Located for TrackPoint {
    fn lat_lon(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

impl Located for (f64, f64) {
    fn lat_lon(&self) -> (f64, f64) {
        *self
    }
}

/// Wire shape of one record returned by the trajectory source.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixRecord {
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl From<FixRecord> for Fix {
    fn from(record: FixRecord) -> Self {
        let [longitude, latitude] = record.coordinates;
        Fix::new(latitude, longitude, record.captured_at, record.accuracy)
    }
}
