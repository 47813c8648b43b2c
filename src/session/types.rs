use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{Result, StoreError};
use crate::identity::UserId;
use crate::inference::types::{Detection, InferenceResult};
use crate::stats::SessionStats;

/// Opaque session identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a detection record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSource {
    Live,
    Upload,
}

/// Row in the detections table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub user_id: UserId,
    pub source: DetectionSource,
    /// `None` when persistence never got a session started.
    pub session_id: Option<SessionId>,
    /// Annotated frame as a PNG data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    pub detected_objects: Vec<Detection>,
    /// Mean confidence of the batch; `None` for an empty batch.
    pub confidence: Option<f64>,
}

impl DetectionRecord {
    pub fn live(
        user_id: UserId,
        session_id: Option<SessionId>,
        result: &InferenceResult,
        image_data: Option<String>,
    ) -> Self {
        Self {
            user_id,
            source: DetectionSource::Live,
            session_id,
            image_data,
            detected_objects: result.detections.clone(),
            confidence: result.average_confidence(),
        }
    }
}

/// Row in the live sessions table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub frames_processed: u64,
    pub helmets_detected: u64,
    pub avg_fps: f64,
    pub avg_confidence: f64,
}

impl SessionRecord {
    /// A freshly started session with zeroed counters.
    pub fn new(id: SessionId, user_id: UserId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            started_at,
            ended_at: None,
            frames_processed: 0,
            helmets_detected: 0,
            avg_fps: 0.0,
            avg_confidence: 0.0,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_processed: self.frames_processed,
            helmets_detected: self.helmets_detected,
            avg_fps: self.avg_fps,
            avg_confidence: self.avg_confidence,
        }
    }

    fn apply(&mut self, stats: &SessionStats) {
        self.frames_processed = stats.frames_processed;
        self.helmets_detected = stats.helmets_detected;
        self.avg_fps = stats.avg_fps;
        self.avg_confidence = stats.avg_confidence;
    }
}

/// Everything a local store holds. Also the on-disk layout of the JSON file store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub detections: Vec<DetectionRecord>,
    /// Counter used to mint session ids.
    #[serde(default)]
    pub next_session: u64,
}

impl StoreData {
    pub fn insert_session(&mut self, user_id: &UserId, started_at: DateTime<Utc>) -> SessionId {
        self.next_session += 1;
        let id = SessionId::new(format!("session-{}", self.next_session));
        self.sessions
            .push(SessionRecord::new(id.clone(), user_id.clone(), started_at));
        id
    }

    pub fn session(&self, id: &SessionId) -> Option<&SessionRecord> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    /// Overwrite the stats of an open session.
    pub fn update_session(&mut self, id: &SessionId, stats: &SessionStats) -> Result<()> {
        let session = self.open_session_mut(id)?;
        session.apply(stats);
        Ok(())
    }

    pub fn end_session(&mut self, id: &SessionId, ended_at: DateTime<Utc>) -> Result<()> {
        let session = self.open_session_mut(id)?;
        session.ended_at = Some(ended_at);
        Ok(())
    }

    pub fn push_detection(&mut self, record: DetectionRecord) {
        self.detections.push(record);
    }

    fn open_session_mut(&mut self, id: &SessionId) -> Result<&mut SessionRecord> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if session.is_ended() {
            return Err(StoreError::AlreadyEnded(id.clone()));
        }
        Ok(session)
    }
}
