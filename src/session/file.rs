use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::error::Result;
use super::store::SessionStore;
use super::types::{DetectionRecord, SessionId, StoreData};
use crate::identity::UserId;
use crate::stats::SessionStats;

/// Local JSON file store with debounced saving.
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<StoreData>,
    save_notify: Notify,
    is_dirty: AtomicBool,
}

impl JsonFileStore {
    /// Open a store, loading the file if it exists.
    ///
    /// A file that exists but does not parse is an error rather than being
    /// silently replaced.
    pub fn open(path: PathBuf) -> Result<Self> {
        let data = Self::load(&path)?;
        Ok(Self {
            path,
            data: Mutex::new(data),
            save_notify: Notify::new(),
            is_dirty: AtomicBool::new(false),
        })
    }

    /// Load store data from a JSON file, returning default on missing file.
    pub fn load(path: &Path) -> Result<StoreData> {
        if !path.exists() {
            return Ok(StoreData::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save current data to disk atomically (write .tmp then rename).
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().clone();
        let json = serde_json::to_string_pretty(&data)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Save now if anything changed since the last save.
    pub fn flush(&self) -> Result<()> {
        if self.is_dirty.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.save() {
                self.is_dirty.store(true, Ordering::Release);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Start the debounce task: waits for a dirty notification, sleeps 500ms, then saves.
    ///
    /// Uses an `AtomicBool` dirty flag so notifications arriving between a
    /// save and the next `notified().await` are not lost.
    pub fn start_debounce_task(self: &Arc<Self>) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                store.save_notify.notified().await;
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                if let Err(e) = store.flush() {
                    tracing::warn!("Failed to save {}: {e}", store.path.display());
                }
            }
        });
    }

    fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
        self.save_notify.notify_one();
    }
}

impl SessionStore for JsonFileStore {
    async fn create_session(
        &self,
        user_id: &UserId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId> {
        let id = self.data.lock().insert_session(user_id, started_at);
        self.mark_dirty();
        Ok(id)
    }

    async fn update_session(&self, id: &SessionId, stats: &SessionStats) -> Result<()> {
        self.data.lock().update_session(id, stats)?;
        self.mark_dirty();
        Ok(())
    }

    async fn end_session(&self, id: &SessionId, ended_at: DateTime<Utc>) -> Result<()> {
        self.data.lock().end_session(id, ended_at)?;
        self.mark_dirty();
        Ok(())
    }

    async fn save_detection(&self, record: DetectionRecord) -> Result<()> {
        self.data.lock().push_detection(record);
        self.mark_dirty();
        Ok(())
    }
}
