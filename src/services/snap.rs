use serde::{Deserialize, Serialize};

use super::{read_body, SnapService};
use crate::config::SnapConfig;
use crate::error::ServiceError;
use crate::types::TrackPoint;

const SERVICE: &str = "snap";

#[derive(Debug, Serialize)]
struct SnapRequest<'a> {
    locations: &'a [[f64; 2]],
    radius: f64,
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
    locations: Vec<Option<SnappedLocation>>,
}

#[derive(Debug, Deserialize)]
struct SnappedLocation {
    /// `[longitude, latitude]`
    location: [f64; 2],
}

/// Parse a snap response body into `(lat, lon)` matches, checking that it
/// stays parallel to the `expected` request length.
pub fn parse_snap_response(body: &str, expected: usize) -> Result<Vec<Option<TrackPoint>>, ServiceError> {
    let response: SnapResponse = serde_json::from_str(body).map_err(|e| ServiceError::malformed(SERVICE, e))?;

    if response.locations.len() != expected {
        return Err(ServiceError::MalformedResponse {
            service: SERVICE,
            message: format!("expected {} locations, got {}", expected, response.locations.len()),
        });
    }

    Ok(response
        .locations
        .into_iter()
        .map(|slot| slot.map(|snapped| TrackPoint::new(snapped.location[1], snapped.location[0])))
        .collect())
}

/// Snap-to-road client (`POST {base}/v2/snap/{profile}/json`).
pub struct HttpSnapClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    profile: String,
    radius_m: f64,
}

impl HttpSnapClient {
    pub fn new(client: reqwest::Client, config: &SnapConfig) -> Self {
        HttpSnapClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            profile: config.profile.clone(),
            radius_m: config.radius_m,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v2/snap/{}/json", self.base_url, self.profile)
    }
}

impl SnapService for HttpSnapClient {
    async fn snap(&self, points: &[TrackPoint]) -> Result<Vec<Option<TrackPoint>>, ServiceError> {
        let locations: Vec<[f64; 2]> = points.iter().map(TrackPoint::lon_lat).collect();
        let body = SnapRequest {
            locations: &locations,
            radius: self.radius_m,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, key);
        }

        log::debug!("Snapping {} points within {} m", points.len(), self.radius_m);
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;

        let text = read_body(SERVICE, response).await?;
        parse_snap_response(&text, points.len())
    }
}
