use std::ops::Range;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{ChunkError, ServiceError};
use crate::pipeline::RunGuard;
use crate::polyline;
use crate::services::{DirectionsService, SnapService};
use crate::types::TrackPoint;

/// Where a reconciliation currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileState {
    Idle,
    Snapping,
    /// `chunk` is zero-based, `of` is the number of chunks the snapped
    /// sequence splits into
    Routing { chunk: usize, of: usize },
    Done,
    Failed,
    /// A newer pipeline run started; nothing further was requested
    Superseded,
}

impl ReconcileState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcileState::Done | ReconcileState::Failed | ReconcileState::Superseded
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileFailure {
    /// Nothing was routed
    Snap(ServiceError),
    /// Chunk `index` failed; earlier chunks are kept
    Chunk { index: usize, error: ChunkError },
}

/// Output of one reconciliation, whatever state it ended in.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    pub state: ReconcileState,
    pub snapped: Vec<TrackPoint>,
    /// Decoded route geometry of every completed chunk, in order
    pub route: Vec<TrackPoint>,
    /// Sum of the distances reported by the directions service
    pub route_distance_m: f64,
    pub chunk_count: usize,
    pub chunks_completed: usize,
    /// The chunk loop stopped at an undersized trailing chunk
    pub stopped_early: bool,
    pub failure: Option<ReconcileFailure>,
}

impl Reconciliation {
    fn new() -> Self {
        Reconciliation {
            state: ReconcileState::Idle,
            snapped: Vec::new(),
            route: Vec::new(),
            route_distance_m: 0.0,
            chunk_count: 0,
            chunks_completed: 0,
            stopped_early: false,
            failure: None,
        }
    }
}

/// Split `len` points into consecutive, non-overlapping ranges of at most
/// `chunk_size`. The last range may be shorter.
pub fn chunk_ranges(len: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let chunk_size = chunk_size.max(1);
    (0..len)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(len))
        .collect()
}

/// Drives snap-to-road followed by chunked directions requests.
///
/// All network calls are strictly sequential: snapping completes before the
/// first directions request, and each chunk waits for the previous one.
pub struct RouteReconciler<'a, S, D> {
    snap: &'a S,
    directions: &'a D,
    chunk_size: usize,
    guard: Option<RunGuard>,
    state: ReconcileState,
}

impl<'a, S, D> RouteReconciler<'a, S, D>
where
    S: SnapService + Sync,
    D: DirectionsService + Sync,
{
    pub fn new(snap: &'a S, directions: &'a D, chunk_size: usize) -> Self {
        RouteReconciler {
            snap,
            directions,
            chunk_size,
            guard: None,
            state: ReconcileState::Idle,
        }
    }

    /// Abandon the reconciliation as soon as `guard` reports a newer run
    pub fn with_guard(mut self, guard: RunGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    fn transition(&mut self, next: ReconcileState) {
        log::debug!("Reconciler {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn superseded(&self) -> bool {
        self.guard.as_ref().map_or(false, |guard| !guard.is_current())
    }

    /// Snap `points`, then route the snapped sequence chunk by chunk.
    pub async fn reconcile(&mut self, points: &[TrackPoint]) -> Reconciliation {
        let mut result = Reconciliation::new();

        if self.superseded() {
            self.transition(ReconcileState::Superseded);
            result.state = self.state;
            return result;
        }

        self.transition(ReconcileState::Snapping);
        let matches = match self.snap.snap(points).await {
            Ok(matches) => matches,
            Err(e) => {
                log::error!("Snap request failed, skipping routing: {}", e);
                result.failure = Some(ReconcileFailure::Snap(e));
                self.transition(ReconcileState::Failed);
                result.state = self.state;
                return result;
            }
        };

        // Match responses carry no capture times
        let snapped_at = Utc::now();
        result.snapped = matches
            .into_iter()
            .flatten()
            .map(|point| point.with_timestamp(snapped_at))
            .collect();
        log::info!("Snapped {} of {} points to the road network", result.snapped.len(), points.len());

        let ranges = chunk_ranges(result.snapped.len(), self.chunk_size);
        result.chunk_count = ranges.len();

        for (index, range) in ranges.into_iter().enumerate() {
            if range.len() < 2 {
                log::debug!("Chunk {} has {} point(s), stopping", index, range.len());
                result.stopped_early = true;
                break;
            }
            if self.superseded() {
                self.transition(ReconcileState::Superseded);
                result.state = self.state;
                return result;
            }

            self.transition(ReconcileState::Routing {
                chunk: index,
                of: result.chunk_count,
            });

            match self.route_chunk(&result.snapped[range]).await {
                Ok((geometry, distance_m)) => {
                    result.route.extend(geometry);
                    result.route_distance_m += distance_m;
                    result.chunks_completed += 1;
                }
                Err(error) => {
                    log::warn!(
                        "Directions chunk {}/{} failed, keeping {} completed chunk(s): {}",
                        index + 1,
                        result.chunk_count,
                        result.chunks_completed,
                        error
                    );
                    result.failure = Some(ReconcileFailure::Chunk { index, error });
                    self.transition(ReconcileState::Failed);
                    result.state = self.state;
                    return result;
                }
            }
        }

        self.transition(ReconcileState::Done);
        result.state = self.state;
        log::info!(
            "Reconciled route: {} chunk(s), {} points, {:.1} m",
            result.chunks_completed,
            result.route.len(),
            result.route_distance_m
        );
        result
    }

    /// Request and decode one chunk. Nothing is applied to the accumulated
    /// route unless both steps succeed.
    async fn route_chunk(&self, waypoints: &[TrackPoint]) -> Result<(Vec<TrackPoint>, f64), ChunkError> {
        let leg = self.directions.route(waypoints).await?;
        let geometry = polyline::decode_track(&leg.geometry, self.directions.polyline_precision())?;
        Ok((geometry, leg.distance_m))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geo_math::path_length;
    use crate::services::RouteLeg;
    use std::sync::Mutex;

    /// Snaps every point onto itself except the indices listed in `misses`.
    pub struct FakeSnap {
        pub misses: Vec<usize>,
        pub fail: bool,
        pub calls: Mutex<usize>,
    }

    impl FakeSnap {
        pub fn matching_all() -> Self {
            FakeSnap {
                misses: Vec::new(),
                fail: false,
                calls: Mutex::new(0),
            }
        }
    }

    impl SnapService for FakeSnap {
        async fn snap(&self, points: &[TrackPoint]) -> Result<Vec<Option<TrackPoint>>, ServiceError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(ServiceError::HttpStatus {
                    service: "snap",
                    status: 503,
                });
            }
            Ok(points
                .iter()
                .enumerate()
                .map(|(i, p)| (!self.misses.contains(&i)).then(|| TrackPoint::new(p.latitude, p.longitude)))
                .collect())
        }
    }

    /// Routes straight through the waypoints. `fail_at` / `garble_at` inject
    /// a service error or an undecodable geometry for that request index.
    pub struct FakeDirections {
        pub requests: Mutex<Vec<usize>>,
        pub fail_at: Option<usize>,
        pub garble_at: Option<usize>,
    }

    impl FakeDirections {
        pub fn new() -> Self {
            FakeDirections {
                requests: Mutex::new(Vec::new()),
                fail_at: None,
                garble_at: None,
            }
        }

        pub fn request_sizes(&self) -> Vec<usize> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl DirectionsService for FakeDirections {
        async fn route(&self, waypoints: &[TrackPoint]) -> Result<RouteLeg, ServiceError> {
            let index = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(waypoints.len());
                requests.len() - 1
            };
            if self.fail_at == Some(index) {
                return Err(ServiceError::Timeout { service: "directions" });
            }
            let geometry = if self.garble_at == Some(index) {
                "_p~iF~ps|U_".to_string()
            } else {
                let coords: Vec<(f64, f64)> = waypoints.iter().map(|p| (p.latitude, p.longitude)).collect();
                polyline::encode(&coords)
            };
            Ok(RouteLeg {
                distance_m: 1000.0 + path_length(waypoints),
                geometry,
            })
        }
    }

    pub fn line(n: usize) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint::new(13.08 + i as f64 * 0.001, 80.27))
            .collect()
    }

    #[test]
    fn test_chunk_ranges() {
        assert_eq!(chunk_ranges(30, 25), vec![0..25, 25..30]);
        assert_eq!(chunk_ranges(25, 25), vec![0..25]);
        assert_eq!(chunk_ranges(26, 25), vec![0..25, 25..26]);
        assert!(chunk_ranges(0, 25).is_empty());
    }

    #[tokio::test]
    async fn test_thirty_points_two_requests() {
        let snap = FakeSnap::matching_all();
        let directions = FakeDirections::new();
        let mut reconciler = RouteReconciler::new(&snap, &directions, 25);

        let result = reconciler.reconcile(&line(30)).await;

        assert_eq!(directions.request_sizes(), vec![25, 5]);
        assert_eq!(result.state, ReconcileState::Done);
        assert_eq!(result.chunk_count, 2);
        assert_eq!(result.chunks_completed, 2);
        assert_eq!(result.route.len(), 30);
        assert!(!result.stopped_early);
        assert!(reconciler.state().is_terminal());
    }

    #[tokio::test]
    async fn test_single_point_tail_stops_loop() {
        let snap = FakeSnap::matching_all();
        let directions = FakeDirections::new();
        let mut reconciler = RouteReconciler::new(&snap, &directions, 25);

        let result = reconciler.reconcile(&line(26)).await;

        assert_eq!(directions.request_sizes(), vec![25]);
        assert_eq!(result.state, ReconcileState::Done);
        assert!(result.stopped_early);
        assert_eq!(result.chunks_completed, 1);
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn test_distance_is_sum_of_reported_legs() {
        let snap = FakeSnap::matching_all();
        let directions = FakeDirections::new();
        let points = line(30);
        let result = RouteReconciler::new(&snap, &directions, 25).reconcile(&points).await;

        let expected = 2000.0 + path_length(&points[..25]) + path_length(&points[25..]);
        approx::assert_relative_eq!(result.route_distance_m, expected, epsilon = 1e-6);
    }

    #[tokio::test]
    async fn test_unmatched_points_dropped_and_stamped() {
        let snap = FakeSnap {
            misses: vec![1, 3],
            fail: false,
            calls: Mutex::new(0),
        };
        let directions = FakeDirections::new();
        let points = line(6);
        let before = Utc::now();
        let result = RouteReconciler::new(&snap, &directions, 25).reconcile(&points).await;

        assert_eq!(result.snapped.len(), 4);
        assert_eq!(result.snapped[1].latitude, points[2].latitude);
        assert!(result.snapped.iter().all(|p| p.timestamp.map_or(false, |t| t >= before)));
    }

    #[tokio::test]
    async fn test_snap_failure_aborts_routing() {
        let snap = FakeSnap {
            misses: Vec::new(),
            fail: true,
            calls: Mutex::new(0),
        };
        let directions = FakeDirections::new();
        let result = RouteReconciler::new(&snap, &directions, 25).reconcile(&line(10)).await;

        assert_eq!(result.state, ReconcileState::Failed);
        assert!(matches!(result.failure, Some(ReconcileFailure::Snap(_))));
        assert!(directions.request_sizes().is_empty());
        assert!(result.route.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_failure_keeps_earlier_chunks() {
        let snap = FakeSnap::matching_all();
        let mut directions = FakeDirections::new();
        directions.fail_at = Some(1);
        let result = RouteReconciler::new(&snap, &directions, 10).reconcile(&line(35)).await;

        assert_eq!(directions.request_sizes(), vec![10, 10]);
        assert_eq!(result.state, ReconcileState::Failed);
        assert_eq!(result.chunks_completed, 1);
        assert_eq!(result.route.len(), 10);
        assert!(matches!(
            result.failure,
            Some(ReconcileFailure::Chunk {
                index: 1,
                error: ChunkError::Service(_)
            })
        ));
    }

    #[tokio::test]
    async fn test_undecodable_geometry_contributes_nothing() {
        let snap = FakeSnap::matching_all();
        let mut directions = FakeDirections::new();
        directions.garble_at = Some(1);
        let points = line(20);
        let result = RouteReconciler::new(&snap, &directions, 10).reconcile(&points).await;

        assert_eq!(result.route.len(), 10);
        approx::assert_relative_eq!(
            result.route_distance_m,
            1000.0 + path_length(&points[..10]),
            epsilon = 1e-6
        );
        assert!(matches!(
            result.failure,
            Some(ReconcileFailure::Chunk {
                index: 1,
                error: ChunkError::Decode(_)
            })
        ));
    }

    #[tokio::test]
    async fn test_nothing_snapped() {
        let snap = FakeSnap {
            misses: (0..5).collect(),
            fail: false,
            calls: Mutex::new(0),
        };
        let directions = FakeDirections::new();
        let result = RouteReconciler::new(&snap, &directions, 25).reconcile(&line(5)).await;

        assert_eq!(result.state, ReconcileState::Done);
        assert!(result.snapped.is_empty());
        assert_eq!(result.chunk_count, 0);
        assert!(directions.request_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_superseded_guard_skips_all_calls() {
        let guard = crate::pipeline::tests::stale_guard();
        let snap = FakeSnap::matching_all();
        let directions = FakeDirections::new();
        let result = RouteReconciler::new(&snap, &directions, 25)
            .with_guard(guard)
            .reconcile(&line(5))
            .await;

        assert_eq!(result.state, ReconcileState::Superseded);
        assert_eq!(*snap.calls.lock().unwrap(), 0);
    }
}
