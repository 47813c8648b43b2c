use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::error::Result;
use super::file::JsonFileStore;
use super::memory::MemoryStore;
use super::rest::RestStore;
use super::types::{DetectionRecord, SessionId};
use crate::config::StoreConfig;
use crate::identity::UserId;
use crate::stats::SessionStats;

/// Eventually-consistent sink for sessions and detections.
pub trait SessionStore: Send + Sync + 'static {
    /// Insert a session with zeroed counters and return its id.
    fn create_session(
        &self,
        user_id: &UserId,
        started_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<SessionId>> + Send;

    fn update_session(
        &self,
        id: &SessionId,
        stats: &SessionStats,
    ) -> impl Future<Output = Result<()>> + Send;

    fn end_session(
        &self,
        id: &SessionId,
        ended_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn save_detection(&self, record: DetectionRecord) -> impl Future<Output = Result<()>> + Send;
}

/// Store selected by configuration.
pub enum ConfiguredStore {
    Memory(MemoryStore),
    File(Arc<JsonFileStore>),
    Rest(RestStore),
}

impl ConfiguredStore {
    /// Build the configured store. The file store starts its background
    /// saver, so this must run inside a tokio runtime.
    pub fn from_config(config: &StoreConfig, timeout: Duration) -> Result<Self> {
        Ok(match config {
            StoreConfig::Memory => Self::Memory(MemoryStore::new()),
            StoreConfig::File { path } => {
                let store = Arc::new(JsonFileStore::open(path.clone())?);
                store.start_debounce_task();
                Self::File(store)
            }
            StoreConfig::Rest { url, api_key } => {
                Self::Rest(RestStore::new(url, api_key, timeout)?)
            }
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
            Self::Rest(_) => "rest",
        }
    }

    /// Write out anything still buffered.
    pub fn flush(&self) -> Result<()> {
        match self {
            Self::File(store) => store.flush(),
            Self::Memory(_) | Self::Rest(_) => Ok(()),
        }
    }
}

impl SessionStore for ConfiguredStore {
    async fn create_session(
        &self,
        user_id: &UserId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId> {
        match self {
            Self::Memory(s) => s.create_session(user_id, started_at).await,
            Self::File(s) => s.create_session(user_id, started_at).await,
            Self::Rest(s) => s.create_session(user_id, started_at).await,
        }
    }

    async fn update_session(&self, id: &SessionId, stats: &SessionStats) -> Result<()> {
        match self {
            Self::Memory(s) => s.update_session(id, stats).await,
            Self::File(s) => s.update_session(id, stats).await,
            Self::Rest(s) => s.update_session(id, stats).await,
        }
    }

    async fn end_session(&self, id: &SessionId, ended_at: DateTime<Utc>) -> Result<()> {
        match self {
            Self::Memory(s) => s.end_session(id, ended_at).await,
            Self::File(s) => s.end_session(id, ended_at).await,
            Self::Rest(s) => s.end_session(id, ended_at).await,
        }
    }

    async fn save_detection(&self, record: DetectionRecord) -> Result<()> {
        match self {
            Self::Memory(s) => s.save_detection(record).await,
            Self::File(s) => s.save_detection(record).await,
            Self::Rest(s) => s.save_detection(record).await,
        }
    }
}
