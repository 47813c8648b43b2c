use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use predict_wire::png_data_url;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::store::SessionStore;
use super::types::{DetectionRecord, SessionId};
use crate::config::SessionConfig;
use crate::identity::UserId;
use crate::inference::types::InferenceResult;
use crate::stats::SessionStats;

/// Where the persisted session is in its life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Active(SessionId),
    /// Terminal. No further writes for this session.
    Ended(SessionId),
}

/// Drives one persisted session per pipeline activation.
///
/// Store writes other than `start` and `stop` are fire-and-forget: they run
/// on spawned tasks and failures are only logged.
pub struct SessionManager<S> {
    store: Arc<S>,
    state: SessionState,
    user_id: Option<UserId>,
    update_interval: Duration,
    last_update: Option<Instant>,
    attach_image: bool,
    pending: Vec<JoinHandle<()>>,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: Arc<S>, config: &SessionConfig) -> Self {
        Self {
            store,
            state: SessionState::NotStarted,
            user_id: None,
            update_interval: config.update_interval(),
            last_update: None,
            attach_image: config.attach_annotated_image,
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Id of the active session, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match &self.state {
            SessionState::Active(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active(_))
    }

    /// Create the session record.
    ///
    /// Returns the existing id when already active. A store failure is logged
    /// and leaves the manager `NotStarted`; detections are still forwarded,
    /// without a session id.
    pub async fn start(&mut self, user_id: UserId) -> Option<SessionId> {
        match &self.state {
            SessionState::Active(id) => return Some(id.clone()),
            SessionState::Ended(id) => {
                warn!("Session {id} already ended; not starting another");
                return None;
            }
            SessionState::NotStarted => {}
        }

        let result = self.store.create_session(&user_id, Utc::now()).await;
        self.user_id = Some(user_id);
        match result {
            Ok(id) => {
                info!("Live session {id} started");
                self.state = SessionState::Active(id.clone());
                Some(id)
            }
            Err(e) => {
                warn!("Failed to start live session: {e}");
                None
            }
        }
    }

    /// Push `stats` when the update interval has elapsed.
    ///
    /// The interval is measured from the first call, so the first push happens
    /// one interval into the session. Returns whether an update was issued.
    pub fn push_update_if_due(&mut self, stats: SessionStats, now: Instant) -> bool {
        if !self.is_active() {
            return false;
        }
        let last = *self.last_update.get_or_insert(now);
        if now.saturating_duration_since(last) < self.update_interval {
            return false;
        }
        self.last_update = Some(now);
        self.push_update(stats)
    }

    /// Fire-and-forget stats update. Refused unless a session is active.
    pub fn push_update(&mut self, stats: SessionStats) -> bool {
        let SessionState::Active(id) = &self.state else {
            return false;
        };
        let store = Arc::clone(&self.store);
        let id = id.clone();
        self.track(tokio::spawn(async move {
            if let Err(e) = store.update_session(&id, &stats).await {
                warn!("Failed to update session {id}: {e}");
            }
        }));
        true
    }

    /// Persist one result as a detection record, without waiting for the write.
    ///
    /// Refused once the session has ended or before any user is known.
    pub fn forward_detections(&mut self, result: &InferenceResult) -> bool {
        let session_id = match &self.state {
            SessionState::Active(id) => Some(id.clone()),
            SessionState::NotStarted => None,
            SessionState::Ended(_) => return false,
        };
        let Some(user_id) = self.user_id.clone() else {
            debug!("No user yet; detection batch not persisted");
            return false;
        };

        let image = self
            .attach_image
            .then(|| png_data_url(&result.annotated.png));
        let record = DetectionRecord::live(user_id, session_id, result, image);
        let store = Arc::clone(&self.store);
        self.track(tokio::spawn(async move {
            if let Err(e) = store.save_detection(record).await {
                warn!("Failed to save detection: {e}");
            }
        }));
        true
    }

    /// End the session: wait for queued writes, push `final_stats`, then set
    /// `ended_at`.
    ///
    /// The manager is `Ended` afterwards even if the store writes fail.
    /// Without an active session this only waits for queued writes.
    pub async fn stop(&mut self, final_stats: SessionStats) -> Option<SessionId> {
        let Some(id) = self.session_id().cloned() else {
            self.flush().await;
            return None;
        };
        self.state = SessionState::Ended(id.clone());
        self.flush().await;

        if let Err(e) = self.store.update_session(&id, &final_stats).await {
            warn!("Failed to write final stats for session {id}: {e}");
        }
        match self.store.end_session(&id, Utc::now()).await {
            Ok(()) => info!(
                "Live session {id} ended after {} frames",
                final_stats.frames_processed
            ),
            Err(e) => warn!("Failed to end session {id}: {e}"),
        }
        Some(id)
    }

    /// Wait for every queued write to finish.
    pub async fn flush(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                warn!("Persistence task failed: {e}");
            }
        }
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.pending.retain(|h| !h.is_finished());
        self.pending.push(handle);
    }
}
