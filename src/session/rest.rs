// PostgREST-style store, matching the `live_sessions` and `detections` tables
// of the hosted backend.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

use super::error::{Result, StoreError};
use super::store::SessionStore;
use super::types::{DetectionRecord, SessionId};
use crate::identity::UserId;
use crate::stats::SessionStats;

const SESSIONS_TABLE: &str = "live_sessions";
const DETECTIONS_TABLE: &str = "detections";

#[derive(Deserialize)]
struct InsertedRow {
    id: SessionId,
}

pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn patch_session(&self, id: &SessionId) -> RequestBuilder {
        let url = format!("{}?id=eq.{id}", self.table_url(SESSIONS_TABLE));
        self.request(Method::PATCH, url).header("Prefer", "return=minimal")
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

impl SessionStore for RestStore {
    async fn create_session(
        &self,
        user_id: &UserId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId> {
        let response = self
            .request(Method::POST, self.table_url(SESSIONS_TABLE))
            .header("Prefer", "return=representation")
            .json(&json!({
                "user_id": user_id,
                "started_at": started_at,
                "frames_processed": 0,
                "helmets_detected": 0,
            }))
            .send()
            .await?;
        let body = check(response).await?.bytes().await?;
        let rows: Vec<InsertedRow> = serde_json::from_slice(&body)?;
        rows.into_iter().next().map(|row| row.id).ok_or_else(|| {
            StoreError::Serialization(serde::de::Error::custom("insert returned no rows"))
        })
    }

    async fn update_session(&self, id: &SessionId, stats: &SessionStats) -> Result<()> {
        let response = self.patch_session(id).json(stats).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn end_session(&self, id: &SessionId, ended_at: DateTime<Utc>) -> Result<()> {
        let response = self
            .patch_session(id)
            .json(&json!({ "ended_at": ended_at }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn save_detection(&self, record: DetectionRecord) -> Result<()> {
        let response = self
            .request(Method::POST, self.table_url(DETECTIONS_TABLE))
            .header("Prefer", "return=minimal")
            .json(&record)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
