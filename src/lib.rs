//! Refines one entity-day of raw GPS fixes and reconciles it against
//! external snap-to-road and directions services.
//!
//! Flow: raw fixes → accuracy gate → Kalman pass → zigzag removal → thinning
//! (the refined path), while the accuracy-passed fixes go through
//! [`reconciler::RouteReconciler`] to become a road-snapped route.

pub mod config;
pub mod error;
pub mod filters;
pub mod geo_math;
pub mod pipeline;
pub mod polyline;
pub mod reconciler;
pub mod services;
pub mod types;

pub use config::RefinerConfig;
pub use error::{ChunkError, ConfigError, DecodeError, ServiceError};
pub use pipeline::{PipelineResult, PipelineRunner, PipelineStatus, RunOutcome};
pub use types::{Fix, TrackPoint};
