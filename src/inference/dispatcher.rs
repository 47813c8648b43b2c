use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;

use super::client::InferenceClient;
use super::encode::{encode_frame, EncodeSettings};
use super::error::{DispatchError, Result};
use super::types::InferenceResult;
use crate::camera::types::Frame;

/// A finished dispatch, tagged so the pipeline can tell whether it still cares.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Activation epoch the dispatch was issued in.
    pub epoch: u64,
    pub seq: u64,
    pub issued_at: Instant,
    pub result: Result<InferenceResult>,
}

/// Running totals for the dispatch gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchCounters {
    pub issued: u64,
    pub completed: u64,
    pub failed: u64,
    /// Samples accepted by the throttle while a request was still unresolved.
    pub skipped_busy: u64,
    /// Outcomes that arrived after their epoch was cancelled.
    pub discarded_stale: u64,
}

/// Single-flight dispatcher.
///
/// At most one request is unresolved at a time. Work runs on spawned tasks and
/// reports back over a channel; nothing here is touched from those tasks, so
/// the in-flight gate needs no lock.
pub struct Dispatcher<C> {
    client: Arc<C>,
    settings: EncodeSettings,
    tx: mpsc::UnboundedSender<DispatchOutcome>,
    rx: mpsc::UnboundedReceiver<DispatchOutcome>,
    in_flight: Option<u64>,
    next_seq: u64,
    counters: DispatchCounters,
}

impl<C: InferenceClient> Dispatcher<C> {
    pub fn new(client: Arc<C>, settings: EncodeSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            client,
            settings,
            tx,
            rx,
            in_flight: None,
            next_seq: 0,
            counters: DispatchCounters::default(),
        }
    }

    /// Issue a request for `frame` unless one is already unresolved.
    ///
    /// Returns whether a request was issued. Must be called from within a
    /// tokio runtime.
    pub fn try_dispatch(&mut self, frame: Arc<Frame>, epoch: u64) -> bool {
        if self.in_flight.is_some() {
            self.counters.skipped_busy += 1;
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some(seq);
        self.counters.issued += 1;

        let client = Arc::clone(&self.client);
        let settings = self.settings;
        let tx = self.tx.clone();
        let issued_at = Instant::now();

        tokio::spawn(async move {
            // The work runs in its own task so a panicking client still
            // settles the gate.
            let work = tokio::spawn(async move {
                run_dispatch(client.as_ref(), frame, settings).await
            });
            let result = work
                .await
                .unwrap_or_else(|e| Err(DispatchError::Aborted(e.to_string())));
            // A closed channel means the pipeline is gone; nobody wants the result.
            let _ = tx.send(DispatchOutcome {
                epoch,
                seq,
                issued_at,
                result,
            });
        });

        tracing::debug!("Dispatch {seq} issued (epoch {epoch})");
        true
    }

    /// Take a finished dispatch without waiting.
    pub fn poll_completion(&mut self) -> Option<DispatchOutcome> {
        let outcome = self.rx.try_recv().ok()?;
        self.settle(&outcome);
        Some(outcome)
    }

    /// Wait for the next finished dispatch. Cancel-safe.
    pub async fn next_completion(&mut self) -> Option<DispatchOutcome> {
        let outcome = self.rx.recv().await?;
        self.settle(&outcome);
        Some(outcome)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn counters(&self) -> DispatchCounters {
        self.counters
    }

    /// Record that an outcome was dropped because its epoch had ended.
    pub fn note_stale(&mut self) {
        self.counters.discarded_stale += 1;
    }

    fn settle(&mut self, outcome: &DispatchOutcome) {
        if self.in_flight == Some(outcome.seq) {
            self.in_flight = None;
        }
        match &outcome.result {
            Ok(_) => self.counters.completed += 1,
            Err(_) => self.counters.failed += 1,
        }
    }
}

async fn run_dispatch<C: InferenceClient>(
    client: &C,
    frame: Arc<Frame>,
    settings: EncodeSettings,
) -> Result<InferenceResult> {
    let jpeg = tokio::task::spawn_blocking(move || encode_frame(&frame, &settings))
        .await
        .map_err(|e| DispatchError::Encode(format!("encoder task failed: {e}")))??;
    client.predict(jpeg).await
}
