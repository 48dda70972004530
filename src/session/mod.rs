//! Labeling session: drives a batch of images through the detector and
//! classifier, aggregates accepted labels, and reports resumable progress.
//!
//! The session is completion-driven: every adapter call runs in its own
//! spawned task, and every completion funnels through the single mutex
//! guarding the aggregation state and counters. Pausing gates the dispatch
//! of new adapter calls only; completions of in-flight calls are always
//! counted, which is what lets a paused session still drain to `done`.

pub mod arbitrate;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::adapters::{LabelClassifier, RegionDetector};
use crate::models::{
    AssetId, ImageAsset, LabelAssignment, LabelIndex, Region, SessionState,
};
use self::arbitrate::Aggregation;

pub use self::arbitrate::ArbitrationPolicy;

/// Caller-supplied settings for a labeling session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Candidates below this confidence are rejected during arbitration.
    pub confidence_threshold: f32,
    /// Label texts that are never assigned.
    pub excluded_labels: HashSet<String>,
    /// Optional delay between per-image dispatches. Pacing only; correctness
    /// does not depend on it.
    pub dispatch_delay: Option<Duration>,
}

/// Orchestrates one batch labeling run.
///
/// `start` may be called again while a previous run's background work is
/// still draining; stale completions are detected through a per-run
/// generation token and become no-ops.
pub struct LabelingSession {
    detector: Arc<dyn RegionDetector>,
    classifier: Arc<dyn LabelClassifier>,
    policy: ArbitrationPolicy,
    dispatch_delay: Option<Duration>,
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    progress: watch::Sender<SessionState>,
    pause: watch::Sender<bool>,
}

struct Inner {
    generation: u64,
    state: SessionState,
    /// Remaining classifier completions per image. `None` until the
    /// detector for that image has reported how many regions it found.
    outstanding: HashMap<AssetId, Option<usize>>,
    agg: Aggregation,
}

impl Inner {
    /// Every classifier completion for an image decrements its counter;
    /// hitting zero marks the image complete. This is the single
    /// synchronization point that prevents double counting.
    fn decrement(&mut self, asset: AssetId) {
        if let Some(Some(count)) = self.outstanding.get_mut(&asset) {
            if *count > 0 {
                *count -= 1;
                if *count == 0 {
                    self.complete_image();
                }
            }
        }
    }

    fn complete_image(&mut self) {
        self.state.images_completed += 1;
        if self.state.images_completed == self.state.images_total {
            self.state.done = true;
        }
    }
}

impl Shared {
    fn publish(&self, inner: &Inner) {
        self.progress.send_replace(inner.state);
    }

    /// True if completions carrying `generation` must no longer touch state.
    fn is_stale(&self, generation: u64) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.generation != generation || inner.state.cancelled
    }

    /// Blocks dispatch while the session is paused. In-flight work is not
    /// affected.
    async fn wait_while_paused(&self) {
        let mut rx = self.pause.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl LabelingSession {
    pub fn new(
        detector: Arc<dyn RegionDetector>,
        classifier: Arc<dyn LabelClassifier>,
        config: SessionConfig,
    ) -> Self {
        let state = SessionState::default();
        let (progress, _) = watch::channel(state);
        let (pause, _) = watch::channel(false);
        Self {
            detector,
            classifier,
            policy: ArbitrationPolicy::new(config.confidence_threshold, config.excluded_labels),
            dispatch_delay: config.dispatch_delay,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    generation: 0,
                    state,
                    outstanding: HashMap::new(),
                    agg: Aggregation::new(),
                }),
                progress,
                pause,
            }),
        }
    }

    /// Resets all aggregation state and begins dispatching the batch.
    ///
    /// Must be called from within a tokio runtime. Work still draining from
    /// a previous `start` is fenced off by the generation bump and cannot
    /// corrupt the new run's counters.
    pub fn start(&self, images: Vec<ImageAsset>) {
        let generation = {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.generation += 1;
            inner.state = SessionState {
                images_total: images.len(),
                done: images.is_empty(),
                ..SessionState::default()
            };
            inner.outstanding = images.iter().map(|asset| (asset.id, None)).collect();
            inner.agg = Aggregation::new();
            self.shared.publish(&inner);
            inner.generation
        };
        self.shared.pause.send_replace(false);

        info!(images = images.len(), "labeling session started");
        if images.is_empty() {
            return;
        }

        let detector = Arc::clone(&self.detector);
        let classifier = Arc::clone(&self.classifier);
        let policy = self.policy.clone();
        let shared = Arc::clone(&self.shared);
        let delay = self.dispatch_delay;

        tokio::spawn(async move {
            for asset in images {
                shared.wait_while_paused().await;
                if shared.is_stale(generation) {
                    return;
                }
                let detector = Arc::clone(&detector);
                let classifier = Arc::clone(&classifier);
                let policy = policy.clone();
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    run_image(shared, detector, classifier, policy, asset, generation).await;
                });
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
            }
        });
    }

    /// Stops issuing new detector/classifier calls. In-flight calls keep
    /// running and their completions are still counted.
    pub fn pause(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.state.done {
            return;
        }
        inner.state.paused = true;
        self.shared.pause.send_replace(true);
        self.shared.publish(&inner);
    }

    pub fn resume(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        if !inner.state.paused {
            return;
        }
        inner.state.paused = false;
        self.shared.pause.send_replace(false);
        self.shared.publish(&inner);
    }

    /// Cooperative cancellation: in-flight adapter calls are allowed to
    /// finish, but their completions no longer mutate session state.
    pub fn cancel(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.state.done {
            return;
        }
        inner.state.cancelled = true;
        inner.state.done = true;
        inner.state.paused = false;
        // Unblock a paused dispatch loop so it can observe the cancel.
        self.shared.pause.send_replace(false);
        self.shared.publish(&inner);
        info!("labeling session cancelled");
    }

    /// Current progress snapshot.
    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().unwrap().state
    }

    /// Watch channel carrying consistent `SessionState` snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.progress_receiver()
    }

    fn progress_receiver(&self) -> watch::Receiver<SessionState> {
        self.shared.progress.subscribe()
    }

    /// Completes when the session reaches a terminal state (done or
    /// cancelled).
    pub async fn wait_done(&self) -> SessionState {
        let mut rx = self.progress_receiver();
        loop {
            let state = *rx.borrow_and_update();
            if state.done {
                return state;
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }

    /// Snapshot of the label→images reverse index.
    pub fn label_index(&self) -> LabelIndex {
        self.shared.inner.lock().unwrap().agg.index().clone()
    }

    /// Snapshot of the finalized assignments, with region provenance for
    /// downstream placement.
    pub fn assignments(&self) -> Vec<LabelAssignment> {
        self.shared.inner.lock().unwrap().agg.assignments()
    }
}

/// Per-image flow: detect, then classify every region plus the synthetic
/// whole-image region. Detector failure counts the image complete with zero
/// outstanding work.
async fn run_image(
    shared: Arc<Shared>,
    detector: Arc<dyn RegionDetector>,
    classifier: Arc<dyn LabelClassifier>,
    policy: ArbitrationPolicy,
    asset: ImageAsset,
    generation: u64,
) {
    debug!(asset = %asset.id, "detecting regions");
    let detected = detector.detect(&asset).await;

    let regions: Vec<Region> = {
        let mut inner = shared.inner.lock().unwrap();
        if inner.generation != generation || inner.state.cancelled {
            return;
        }
        match detected {
            Ok(rects) => {
                let regions: Vec<Region> = std::iter::once(Region::Whole)
                    .chain(rects.into_iter().map(Region::Part))
                    .collect();
                inner.outstanding.insert(asset.id, Some(regions.len()));
                regions
            }
            Err(err) => {
                warn!(asset = %asset.id, error = %err, "detector failed, image counted complete");
                inner.outstanding.insert(asset.id, Some(0));
                inner.complete_image();
                shared.publish(&inner);
                return;
            }
        }
    };

    for region in regions {
        shared.wait_while_paused().await;
        if shared.is_stale(generation) {
            return;
        }
        let shared = Arc::clone(&shared);
        let classifier = Arc::clone(&classifier);
        let policy = policy.clone();
        let asset = asset.clone();
        tokio::spawn(async move {
            let accepted = match classifier.classify(&asset, region).await {
                Ok(candidates) => policy.select(region, candidates),
                Err(err) => {
                    debug!(asset = %asset.id, error = %err, "classifier failed, zero candidates");
                    Vec::new()
                }
            };

            let mut inner = shared.inner.lock().unwrap();
            if inner.generation != generation || inner.state.cancelled {
                return;
            }
            inner.agg.apply(asset.id, region, accepted);
            inner.decrement(asset.id);
            shared.publish(&inner);
        });
    }
}
