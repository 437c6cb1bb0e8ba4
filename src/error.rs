use thiserror::Error;

pub use crate::polyline::DecodeError;

/// Failure talking to one of the external services.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("{service}: request timed out")]
    Timeout { service: &'static str },

    #[error("{service}: network error: {message}")]
    Network { service: &'static str, message: String },

    #[error("{service}: HTTP error: {status}")]
    HttpStatus { service: &'static str, status: u16 },

    #[error("{service}: malformed response: {message}")]
    MalformedResponse { service: &'static str, message: String },

    #[error("{service}: no route returned")]
    NoRoute { service: &'static str },
}

impl ServiceError {
    pub fn service(&self) -> &'static str {
        match self {
            ServiceError::Timeout { service }
            | ServiceError::Network { service, .. }
            | ServiceError::HttpStatus { service, .. }
            | ServiceError::MalformedResponse { service, .. }
            | ServiceError::NoRoute { service } => service,
        }
    }

    pub(crate) fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout { service }
        } else if let Some(status) = err.status() {
            ServiceError::HttpStatus {
                service,
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            ServiceError::MalformedResponse {
                service,
                message: err.to_string(),
            }
        } else {
            ServiceError::Network {
                service,
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn malformed(service: &'static str, err: impl std::fmt::Display) -> Self {
        ServiceError::MalformedResponse {
            service,
            message: err.to_string(),
        }
    }
}

/// Why one directions chunk contributed nothing to the route.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChunkError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("directions geometry: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Invalid base URL for {name}: {url}")]
    InvalidUrl { name: &'static str, url: String },
}
