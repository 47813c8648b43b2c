use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::error::{Result, StoreError};
use super::store::SessionStore;
use super::types::{DetectionRecord, SessionId, SessionRecord, StoreData};
use crate::identity::UserId;
use crate::stats::SessionStats;

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail, as an unreachable backend would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of store operations attempted so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.data.lock().sessions.clone()
    }

    pub fn session(&self, id: &SessionId) -> Option<SessionRecord> {
        self.data.lock().session(id).cloned()
    }

    pub fn detections(&self) -> Vec<DetectionRecord> {
        self.data.lock().detections.clone()
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("memory store offline")));
        }
        Ok(())
    }
}

impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        user_id: &UserId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId> {
        self.enter()?;
        Ok(self.data.lock().insert_session(user_id, started_at))
    }

    async fn update_session(&self, id: &SessionId, stats: &SessionStats) -> Result<()> {
        self.enter()?;
        self.data.lock().update_session(id, stats)
    }

    async fn end_session(&self, id: &SessionId, ended_at: DateTime<Utc>) -> Result<()> {
        self.enter()?;
        self.data.lock().end_session(id, ended_at)
    }

    async fn save_detection(&self, record: DetectionRecord) -> Result<()> {
        self.enter()?;
        self.data.lock().push_detection(record);
        Ok(())
    }
}
