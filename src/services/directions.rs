use serde::Deserialize;

use super::{read_body, DirectionsService, RouteLeg};
use crate::config::DirectionsConfig;
use crate::error::ServiceError;
use crate::types::TrackPoint;

const SERVICE: &str = "directions";

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    distance: f64,
    geometry: String,
}

/// First route of a directions response
pub fn parse_directions_response(body: &str) -> Result<RouteLeg, ServiceError> {
    let response: DirectionsResponse =
        serde_json::from_str(body).map_err(|e| ServiceError::malformed(SERVICE, e))?;

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or(ServiceError::NoRoute { service: SERVICE })?;

    Ok(RouteLeg {
        distance_m: route.distance,
        geometry: route.geometry,
    })
}

/// `lon,lat;lon,lat;...`
pub fn format_waypoints(waypoints: &[TrackPoint]) -> String {
    waypoints
        .iter()
        .map(|p| format!("{},{}", p.longitude, p.latitude))
        .collect::<Vec<_>>()
        .join(";")
}

/// Directions client (`GET {base}/directions/v5/mapbox/{profile}/{waypoints}`).
pub struct HttpDirectionsClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    profile: String,
    precision: u32,
}

impl HttpDirectionsClient {
    pub fn new(client: reqwest::Client, config: &DirectionsConfig) -> Self {
        HttpDirectionsClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            profile: config.profile.clone(),
            precision: config.polyline_precision,
        }
    }

    fn route_url(&self, waypoints: &[TrackPoint]) -> String {
        format!(
            "{}/directions/v5/mapbox/{}/{}",
            self.base_url,
            self.profile,
            format_waypoints(waypoints)
        )
    }

    fn geometries(&self) -> &'static str {
        if self.precision == 6 {
            "polyline6"
        } else {
            "polyline"
        }
    }
}

impl DirectionsService for HttpDirectionsClient {
    async fn route(&self, waypoints: &[TrackPoint]) -> Result<RouteLeg, ServiceError> {
        let response = self
            .client
            .get(self.route_url(waypoints))
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("geometries", self.geometries()),
                ("overview", "full"),
            ])
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;

        let body = read_body(SERVICE, response).await?;
        parse_directions_response(&body)
    }

    fn polyline_precision(&self) -> u32 {
        self.precision
    }
}
