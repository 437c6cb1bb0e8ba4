//! External collaborators of the pipeline.
//!
//! Each service sits behind a trait so orchestration can run against the
//! HTTP clients in production and in-memory fakes in tests. The futures are
//! `Send` so a whole pipeline run can be spawned onto a tokio runtime.

pub mod directions;
pub mod snap;
pub mod trajectory;

pub use directions::HttpDirectionsClient;
pub use snap::HttpSnapClient;
pub use trajectory::HttpTrajectorySource;

use std::future::Future;

use chrono::NaiveDate;

use crate::error::ServiceError;
use crate::types::{Fix, TrackPoint};

/// One day of fixes for one entity.
pub trait TrajectorySource {
    /// Payloads that are not a list of fixes come back as an empty list.
    fn fetch_fixes(
        &self,
        entity_id: &str,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Fix>, ServiceError>> + Send;
}

/// Snap-to-road.
pub trait SnapService {
    /// Result is parallel-indexed with `points`; `None` means no match.
    fn snap(
        &self,
        points: &[TrackPoint],
    ) -> impl Future<Output = Result<Vec<Option<TrackPoint>>, ServiceError>> + Send;
}

/// Route for one chunk of waypoints as reported by the directions service.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteLeg {
    pub distance_m: f64,
    /// Encoded polyline
    pub geometry: String,
}

/// Turn-by-turn directions over a bounded list of waypoints.
pub trait DirectionsService {
    fn route(&self, waypoints: &[TrackPoint]) -> impl Future<Output = Result<RouteLeg, ServiceError>> + Send;

    /// Precision of the polyline in [`RouteLeg::geometry`]
    fn polyline_precision(&self) -> u32 {
        crate::polyline::DEFAULT_PRECISION
    }
}

/// Check the HTTP status and read the body as text.
pub(crate) async fn read_body(service: &'static str, response: reqwest::Response) -> Result<String, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ServiceError::HttpStatus {
            service,
            status: status.as_u16(),
        });
    }
    response
        .text()
        .await
        .map_err(|e| ServiceError::from_reqwest(service, e))
}
