use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::filters::RefineParams;
use crate::polyline::DEFAULT_PRECISION;

/// Provider-imposed waypoint limit of one directions request
pub const MAX_WAYPOINTS_PER_REQUEST: usize = 25;

/// Geometry precisions the directions service can be asked for
/// (`geometries=polyline` and `geometries=polyline6`)
pub const SUPPORTED_POLYLINE_PRECISIONS: [u32; 2] = [5, 6];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Fixes are fetched from `{base_url}/entities/{id}/fixes?date=YYYY-MM-DD`
    pub base_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            base_url: "http://localhost:8080/api".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub profile: String,
    pub radius_m: f64,
}

impl Default for SnapConfig {
    fn default() -> Self {
        SnapConfig {
            base_url: "https://api.openrouteservice.org".to_string(),
            api_key: None,
            profile: "driving-car".to_string(),
            radius_m: 50.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionsConfig {
    pub base_url: String,
    pub access_token: String,
    pub profile: String,
    /// Waypoints per request, 2..=25
    pub chunk_size: usize,
    /// Precision of the returned polyline geometry, 5 or 6
    pub polyline_precision: u32,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        DirectionsConfig {
            base_url: "https://api.mapbox.com".to_string(),
            access_token: String::new(),
            profile: "driving".to_string(),
            chunk_size: MAX_WAYPOINTS_PER_REQUEST,
            polyline_precision: DEFAULT_PRECISION,
        }
    }
}

/// Everything the pipeline needs from the outside world. Endpoints,
/// credentials and tuning parameters are injected here, never hard-coded at
/// the call sites.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerConfig {
    pub source: SourceConfig,
    pub snap: SnapConfig,
    pub directions: DirectionsConfig,
    pub refine: RefineParams,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        RefinerConfig {
            source: SourceConfig::default(),
            snap: SnapConfig::default(),
            directions: DirectionsConfig::default(),
            refine: RefineParams::default(),
            request_timeout_secs: 30,
            user_agent: concat!("route_refiner/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

fn check_url(name: &'static str, url: &str) -> Result<(), ConfigError> {
    match reqwest::Url::parse(url) {
        Ok(parsed)
            if matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|host| !host.is_empty()) =>
        {
            Ok(())
        }
        _ => Err(ConfigError::InvalidUrl {
            name,
            url: url.to_string(),
        }),
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("expected a finite value >= 0, got {}", value),
        })
    }
}

impl RefinerConfig {
    /// Load a JSON config file. Missing fields fall back to defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: RefinerConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("source.base_url", &self.source.base_url)?;
        check_url("snap.base_url", &self.snap.base_url)?;
        check_url("directions.base_url", &self.directions.base_url)?;

        check_non_negative("snap.radius_m", self.snap.radius_m)?;
        check_non_negative("refine.accuracy_threshold_m", self.refine.accuracy_threshold_m)?;
        check_non_negative("refine.zigzag_threshold_deg", self.refine.zigzag_threshold_deg)?;
        check_non_negative("refine.min_point_distance_m", self.refine.min_point_distance_m)?;
        check_non_negative("refine.kalman.process_noise", self.refine.kalman.process_noise)?;

        // r > 0 keeps the Kalman gain denominator away from zero
        let r = self.refine.kalman.measurement_noise;
        if !(r.is_finite() && r > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "refine.kalman.measurement_noise",
                reason: format!("must be > 0, got {}", r),
            });
        }

        let chunk = self.directions.chunk_size;
        if !(2..=MAX_WAYPOINTS_PER_REQUEST).contains(&chunk) {
            return Err(ConfigError::InvalidParameter {
                name: "directions.chunk_size",
                reason: format!("must be within 2..={}, got {}", MAX_WAYPOINTS_PER_REQUEST, chunk),
            });
        }

        let precision = self.directions.polyline_precision;
        if !SUPPORTED_POLYLINE_PRECISIONS.contains(&precision) {
            return Err(ConfigError::InvalidParameter {
                name: "directions.polyline_precision",
                reason: format!("must be 5 or 6, got {}", precision),
            });
        }

        Ok(())
    }

    /// Shared HTTP client for all three services
    pub fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .user_agent(self.user_agent.clone())
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RefinerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.snap.radius_m, 50.0);
        assert_eq!(config.directions.chunk_size, 25);
        assert_eq!(config.refine.accuracy_threshold_m, 15.0);
        assert_eq!(config.refine.zigzag_threshold_deg, 60.0);
        assert_eq!(config.refine.min_point_distance_m, 40.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "directions": { "access_token": "pk.test", "profile": "walking" },
            "refine": { "zigzag_threshold_deg": 90.0 }
        }"#;
        let config: RefinerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.directions.access_token, "pk.test");
        assert_eq!(config.directions.profile, "walking");
        assert_eq!(config.directions.chunk_size, 25);
        assert_eq!(config.refine.zigzag_threshold_deg, 90.0);
        assert_eq!(config.refine.kalman.measurement_noise, 0.0001);
    }

    #[test]
    fn test_chunk_size_bounds() {
        let mut config = RefinerConfig::default();
        config.directions.chunk_size = 26;
        assert!(config.validate().is_err());
        config.directions.chunk_size = 1;
        assert!(config.validate().is_err());
        config.directions.chunk_size = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_measurement_noise() {
        let mut config = RefinerConfig::default();
        config.refine.kalman.measurement_noise = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter { name: "refine.kalman.measurement_noise", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_url() {
        for bad in ["api.openrouteservice.org", "http://", "ftp://example.com", "", "http://exa mple.com"] {
            let mut config = RefinerConfig::default();
            config.snap.base_url = bad.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidUrl { name: "snap.base_url", .. })),
                "accepted {:?}",
                bad
            );
        }

        let mut config = RefinerConfig::default();
        config.source.base_url = "http://10.0.0.5:8080/api/".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_polyline_precision_matches_requestable_geometries() {
        let mut config = RefinerConfig::default();
        for precision in [0, 1, 4, 7, 9] {
            config.directions.polyline_precision = precision;
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidParameter { name: "directions.polyline_precision", .. })
            ));
        }
        for precision in SUPPORTED_POLYLINE_PRECISIONS {
            config.directions.polyline_precision = precision;
            assert!(config.validate().is_ok());
        }
    }
}
