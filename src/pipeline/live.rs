use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::error::PipelineError;
use super::throttle::CaptureThrottle;
use crate::camera::source::{CaptureGuard, FrameSource};
use crate::config::PipelineConfig;
use crate::identity::IdentityProvider;
use crate::inference::client::InferenceClient;
use crate::inference::dispatcher::{DispatchCounters, DispatchOutcome, Dispatcher};
use crate::inference::types::AnnotatedImage;
use crate::session::types::SessionId;
use crate::session::{SessionManager, SessionState, SessionStore};
use crate::stats::{DetectionLog, DetectionLogEntry, SessionStats, StatsAggregator};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The pipeline has been deactivated.
    Inactive,
    /// Not yet time to sample.
    Idle,
    Dispatched,
    /// Sampled, but the previous request is still unresolved.
    Busy,
    /// Sampled, but the camera has not produced a frame yet.
    NoFrame,
}

/// Everything the live view shows, in one serialisable snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveView {
    pub active: bool,
    pub session_id: Option<SessionId>,
    pub stats: SessionStats,
    pub recent: Vec<DetectionLogEntry>,
    pub dispatch: DispatchCounters,
    pub in_flight: bool,
    pub last_error: Option<String>,
}

/// One activation of live detection.
///
/// Owns the camera, the dispatch gate, the statistics, the detection log, and
/// the session. Construct a fresh pipeline per activation. All state changes
/// go through `&mut self` on the driving task.
pub struct LivePipeline<C, S> {
    /// `None` once released.
    camera: Option<CaptureGuard<Box<dyn FrameSource>>>,
    throttle: CaptureThrottle,
    dispatcher: Dispatcher<C>,
    stats: StatsAggregator,
    log: DetectionLog,
    session: SessionManager<S>,
    epoch: u64,
    active: bool,
    latest_overlay: Option<AnnotatedImage>,
    last_error: Option<String>,
}

impl<C: InferenceClient, S: SessionStore> LivePipeline<C, S> {
    /// Acquire the camera and start a session for the current user.
    ///
    /// Refuses without a user, and fails if the camera cannot be acquired; in
    /// both cases no session is created. A session store failure is not an
    /// error: the pipeline then runs without a persisted session.
    pub async fn activate(
        config: &PipelineConfig,
        identity: &dyn IdentityProvider,
        source: Box<dyn FrameSource>,
        client: Arc<C>,
        store: Arc<S>,
    ) -> Result<Self, PipelineError> {
        let user = identity
            .current_user()
            .ok_or(PipelineError::Unauthenticated)?;
        let camera = CaptureGuard::acquire(source)?;

        let mut session = SessionManager::new(store, &config.session);
        session.start(user).await;

        info!("Live detection active");
        Ok(Self {
            camera: Some(camera),
            throttle: CaptureThrottle::new(config.throttle.sample_interval()),
            dispatcher: Dispatcher::new(client, config.inference.encode_settings()),
            stats: StatsAggregator::new(
                config.stats.helmet_label.clone(),
                config.stats.fps_window(),
            ),
            log: DetectionLog::new(),
            session,
            epoch: 0,
            active: true,
            latest_overlay: None,
            last_error: None,
        })
    }

    /// Advance the pipeline to `now`.
    ///
    /// Applies finished dispatches, rolls the FPS window, pushes a session
    /// update when one is due, then samples a frame if the throttle allows.
    /// Never blocks.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.active {
            return TickOutcome::Inactive;
        }

        while let Some(outcome) = self.dispatcher.poll_completion() {
            self.handle_completion(outcome, now);
        }
        self.stats.report_fps(now);
        self.session.push_update_if_due(self.stats.snapshot(), now);

        if !self.throttle.poll(now) {
            return TickOutcome::Idle;
        }
        let Some(frame) = self.camera.as_ref().and_then(|c| c.current_frame()) else {
            return TickOutcome::NoFrame;
        };
        if self.dispatcher.try_dispatch(frame, self.epoch) {
            TickOutcome::Dispatched
        } else {
            TickOutcome::Busy
        }
    }

    /// Wait for the unresolved dispatch, if any, and apply it.
    ///
    /// Returns whether a result was applied.
    pub async fn settle(&mut self, now: Instant) -> bool {
        if !self.dispatcher.is_in_flight() {
            return false;
        }
        match self.dispatcher.next_completion().await {
            Some(outcome) => self.handle_completion(outcome, now),
            None => false,
        }
    }

    /// Apply one finished dispatch. Stale or failed outcomes change nothing
    /// but the counters.
    pub fn handle_completion(&mut self, outcome: DispatchOutcome, now: Instant) -> bool {
        if !self.active || outcome.epoch != self.epoch {
            debug!("Discarding dispatch {} from epoch {}", outcome.seq, outcome.epoch);
            self.dispatcher.note_stale();
            return false;
        }

        match outcome.result {
            Ok(result) => {
                debug!(
                    "Dispatch {} returned {} detections in {:?}",
                    outcome.seq,
                    result.detections.len(),
                    outcome.issued_at.elapsed()
                );
                self.stats.record_result(&result, now);
                self.log.record(&result.detections, Utc::now());
                self.session.forward_detections(&result);
                self.latest_overlay = Some(result.annotated);
                true
            }
            Err(e) => {
                warn!("Inference dispatch {} failed: {e}", outcome.seq);
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Stop sampling, release the camera, and end the session.
    ///
    /// Idempotent. Dispatches still in flight finish on their own; their
    /// results are discarded.
    pub async fn deactivate(&mut self) -> Option<SessionId> {
        if !self.active {
            return None;
        }
        self.active = false;
        self.epoch += 1;
        if let Some(mut camera) = self.camera.take() {
            // A driver release can block while it joins its capture thread.
            if let Err(e) = tokio::task::spawn_blocking(move || camera.release()).await {
                error!("Camera release task failed: {e}");
            }
        }

        let final_stats = self.stats.snapshot();
        let ended = self.session.stop(final_stats).await;
        info!(
            "Live detection stopped: {} frames, {} helmets, {:?}",
            final_stats.frames_processed,
            final_stats.helmets_detected,
            self.dispatcher.counters()
        );
        ended
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn log(&self) -> &DetectionLog {
        &self.log
    }

    pub fn session_state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn dispatch_counters(&self) -> DispatchCounters {
        self.dispatcher.counters()
    }

    pub fn is_in_flight(&self) -> bool {
        self.dispatcher.is_in_flight()
    }

    /// Annotated frame from the most recent successful dispatch.
    pub fn latest_overlay(&self) -> Option<&AnnotatedImage> {
        self.latest_overlay.as_ref()
    }

    pub fn camera_held(&self) -> bool {
        self.camera.as_ref().is_some_and(|c| c.is_held())
    }

    pub fn view(&self) -> LiveView {
        LiveView {
            active: self.active,
            session_id: self.session.session_id().cloned(),
            stats: self.stats.snapshot(),
            recent: self.log.to_vec(),
            dispatch: self.dispatcher.counters(),
            in_flight: self.dispatcher.is_in_flight(),
            last_error: self.last_error.clone(),
        }
    }
}
