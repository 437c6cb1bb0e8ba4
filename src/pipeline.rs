use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::RefinerConfig;
use crate::filters::{refine, RefineParams};
use crate::reconciler::{ReconcileFailure, ReconcileState, RouteReconciler};
use crate::services::{
    DirectionsService, HttpDirectionsClient, HttpSnapClient, HttpTrajectorySource, SnapService, TrajectorySource,
};
use crate::types::{Fix, TrackPoint};

/// Shown to the user for any external service failure. Details go to the log.
pub const SERVICE_FAILURE_NOTICE: &str = "Route data could not be loaded. Please try again later.";

/// Identifies one pipeline run and tells whether a newer run has started
/// since.
#[derive(Clone, Debug)]
pub struct RunGuard {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl RunGuard {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineStatus {
    Complete,
    /// The chunk loop stopped at an undersized trailing chunk. Not an error:
    /// the route covers every chunk that could be requested.
    PartialRoute { chunks_completed: usize, chunk_count: usize },
    /// Fewer than two usable fixes
    NoData,
    /// A service call failed. Whatever completed before the failure is kept.
    ServiceFailure { notice: String, chunks_completed: usize },
}

/// Everything the presentation layer renders for one entity-day.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineResult {
    pub entity_id: String,
    pub date: NaiveDate,
    pub generation: u64,
    pub raw: Vec<Fix>,
    pub refined: Vec<TrackPoint>,
    pub snapped: Vec<TrackPoint>,
    pub route: Vec<TrackPoint>,
    /// Length of the refined (smoothed and thinned) path
    pub refined_distance_m: f64,
    /// Directions-service total over the completed chunks, if any completed
    pub route_distance_m: Option<f64>,
    pub status: PipelineStatus,
}

impl PipelineResult {
    fn empty(entity_id: &str, date: NaiveDate, generation: u64, status: PipelineStatus) -> Self {
        PipelineResult {
            entity_id: entity_id.to_string(),
            date,
            generation,
            raw: Vec::new(),
            refined: Vec::new(),
            snapped: Vec::new(),
            route: Vec::new(),
            refined_distance_m: 0.0,
            route_distance_m: None,
            status,
        }
    }

    /// Distance to show next to the map: the road-route total when at least
    /// one chunk was routed, otherwise the refined-path length.
    pub fn display_distance_m(&self) -> f64 {
        self.route_distance_m.unwrap_or(self.refined_distance_m)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    Published(PipelineResult),
    /// A newer run started before this one finished; its output was dropped
    Superseded { generation: u64 },
}

/// Re-entrant entry point: one `run` per (entity, date) trigger.
///
/// Every call takes a new generation number. Only the newest generation may
/// publish, so a slow run that finishes after a newer one never overwrites
/// the newer output.
pub struct PipelineRunner<T, S, D> {
    source: T,
    snap: S,
    directions: D,
    params: RefineParams,
    chunk_size: usize,
    latest_generation: Arc<AtomicU64>,
    published: Mutex<Option<PipelineResult>>,
}

impl PipelineRunner<HttpTrajectorySource, HttpSnapClient, HttpDirectionsClient> {
    pub fn from_config(config: &RefinerConfig) -> Self {
        let client = config.http_client();
        PipelineRunner::new(
            HttpTrajectorySource::new(client.clone(), &config.source),
            HttpSnapClient::new(client.clone(), &config.snap),
            HttpDirectionsClient::new(client, &config.directions),
            config.refine.clone(),
            config.directions.chunk_size,
        )
    }
}

impl<T, S, D> PipelineRunner<T, S, D>
where
    T: TrajectorySource + Sync,
    S: SnapService + Sync,
    D: DirectionsService + Sync,
{
    pub fn new(source: T, snap: S, directions: D, params: RefineParams, chunk_size: usize) -> Self {
        PipelineRunner {
            source,
            snap,
            directions,
            params,
            chunk_size,
            latest_generation: Arc::new(AtomicU64::new(0)),
            published: Mutex::new(None),
        }
    }

    /// Most recently published result
    pub fn latest(&self) -> Option<PipelineResult> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn begin(&self) -> RunGuard {
        let generation = self.latest_generation.fetch_add(1, Ordering::SeqCst) + 1;
        RunGuard {
            generation,
            latest: Arc::clone(&self.latest_generation),
        }
    }

    fn publish(&self, guard: &RunGuard, result: PipelineResult) -> RunOutcome {
        let mut slot = self
            .published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Checked under the lock so a newer run can't publish in between
        if !guard.is_current() {
            log::info!("Dropping output of superseded run {}", guard.generation());
            return RunOutcome::Superseded {
                generation: guard.generation(),
            };
        }

        *slot = Some(result.clone());
        RunOutcome::Published(result)
    }

    pub async fn run(&self, entity_id: &str, date: NaiveDate) -> RunOutcome {
        let guard = self.begin();
        let generation = guard.generation();
        log::info!("Run {}: entity {} on {}", generation, entity_id, date);

        let fixes = match self.source.fetch_fixes(entity_id, date).await {
            Ok(fixes) => fixes,
            Err(e) => {
                log::error!("Run {}: trajectory fetch failed: {}", generation, e);
                let status = PipelineStatus::ServiceFailure {
                    notice: SERVICE_FAILURE_NOTICE.to_string(),
                    chunks_completed: 0,
                };
                return self.publish(&guard, PipelineResult::empty(entity_id, date, generation, status));
            }
        };

        if !guard.is_current() {
            return RunOutcome::Superseded { generation };
        }

        let Some(refinement) = refine(&fixes, &self.params) else {
            let result = PipelineResult::empty(entity_id, date, generation, PipelineStatus::NoData);
            return self.publish(&guard, result);
        };

        let accurate: Vec<TrackPoint> = refinement.accurate.iter().map(TrackPoint::from).collect();
        let reconciliation = RouteReconciler::new(&self.snap, &self.directions, self.chunk_size)
            .with_guard(guard.clone())
            .reconcile(&accurate)
            .await;

        let chunks_completed = reconciliation.chunks_completed;
        let status = match (&reconciliation.state, &reconciliation.failure) {
            (ReconcileState::Superseded, _) => return RunOutcome::Superseded { generation },
            (_, Some(failure)) => {
                if let ReconcileFailure::Chunk { index, .. } = failure {
                    log::warn!("Run {}: route truncated at chunk {}", generation, index);
                }
                PipelineStatus::ServiceFailure {
                    notice: SERVICE_FAILURE_NOTICE.to_string(),
                    chunks_completed,
                }
            }
            (_, None) if reconciliation.stopped_early => PipelineStatus::PartialRoute {
                chunks_completed,
                chunk_count: reconciliation.chunk_count,
            },
            (_, None) => PipelineStatus::Complete,
        };

        let result = PipelineResult {
            entity_id: entity_id.to_string(),
            date,
            generation,
            raw: fixes,
            refined: refinement.refined,
            snapped: reconciliation.snapped,
            route: reconciliation.route,
            refined_distance_m: refinement.refined_distance_m,
            route_distance_m: (chunks_completed > 0).then_some(reconciliation.route_distance_m),
            status,
        };
        self.publish(&guard, result)
    }
}
