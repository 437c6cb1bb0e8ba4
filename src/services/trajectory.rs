use chrono::NaiveDate;
use serde_json::Value;

use super::{read_body, TrajectorySource};
use crate::config::SourceConfig;
use crate::error::ServiceError;
use crate::types::{Fix, FixRecord};

const SERVICE: &str = "trajectory";

/// Parse a trajectory payload.
///
/// Anything other than a JSON array is "no data". Records inside the array
/// that don't match the expected shape are skipped with a warning.
pub fn parse_fix_payload(body: &str) -> Vec<Fix> {
    let records = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(records)) => records,
        Ok(_) => {
            log::warn!("Trajectory payload is not an array, treating as no data");
            return Vec::new();
        }
        Err(e) => {
            log::warn!("Trajectory payload is not JSON ({}), treating as no data", e);
            return Vec::new();
        }
    };

    let total = records.len();
    let fixes: Vec<Fix> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| match serde_json::from_value::<FixRecord>(record) {
            Ok(record) => Some(Fix::from(record)),
            Err(e) => {
                log::warn!("Skipping malformed fix record {}: {}", i, e);
                None
            }
        })
        .collect();

    log::debug!("Parsed {} of {} fix records", fixes.len(), total);
    fixes
}

pub struct HttpTrajectorySource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTrajectorySource {
    pub fn new(client: reqwest::Client, config: &SourceConfig) -> Self {
        HttpTrajectorySource {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/entities/{id}/fixes` with the id encoded as one path segment
    fn fixes_url(&self, entity_id: &str) -> Result<reqwest::Url, ServiceError> {
        let invalid = || ServiceError::Network {
            service: SERVICE,
            message: format!("invalid base URL {}", self.base_url),
        };
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push("entities")
            .push(entity_id)
            .push("fixes");
        Ok(url)
    }
}

impl TrajectorySource for HttpTrajectorySource {
    async fn fetch_fixes(&self, entity_id: &str, date: NaiveDate) -> Result<Vec<Fix>, ServiceError> {
        let response = self
            .client
            .get(self.fixes_url(entity_id)?)
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await
            .map_err(|e| ServiceError::from_reqwest(SERVICE, e))?;

        let body = read_body(SERVICE, response).await?;
        Ok(parse_fix_payload(&body))
    }
}
