use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::live::LivePipeline;
use crate::config::PipelineConfig;
use crate::inference::client::InferenceClient;
use crate::session::SessionStore;

/// Stops a running [`PipelineRunner`].
#[derive(Clone)]
pub struct RunnerHandle {
    stop: watch::Sender<bool>,
}

impl RunnerHandle {
    pub fn stop(&self) {
        // No receiver means the runner already finished.
        let _ = self.stop.send(true);
    }
}

/// Drives a [`LivePipeline`] from a repeating tick until stopped.
pub struct PipelineRunner<C, S> {
    pipeline: LivePipeline<C, S>,
    tick_interval: Duration,
    report_interval: Duration,
    stop: watch::Receiver<bool>,
}

impl<C: InferenceClient, S: SessionStore> PipelineRunner<C, S> {
    pub fn new(pipeline: LivePipeline<C, S>, config: &PipelineConfig) -> (Self, RunnerHandle) {
        let (tx, rx) = watch::channel(false);
        let runner = Self {
            pipeline,
            tick_interval: config.throttle.tick_interval(),
            report_interval: config.report_interval(),
            stop: rx,
        };
        (runner, RunnerHandle { stop: tx })
    }

    /// Tick until stopped, then deactivate and hand the pipeline back.
    pub async fn run(mut self) -> LivePipeline<C, S> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut report = tokio::time::interval(self.report_interval);
        report.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first report tick fires immediately.
        report.tick().await;

        loop {
            if *self.stop.borrow() {
                break;
            }
            tokio::select! {
                at = ticker.tick() => {
                    self.pipeline.tick(at.into_std());
                }
                _ = report.tick() => {
                    let view = self.pipeline.view();
                    info!(
                        "frames={} helmets={} fps={:.1} confidence={:.1}% in_flight={}",
                        view.stats.frames_processed,
                        view.stats.helmets_detected,
                        view.stats.avg_fps,
                        view.stats.avg_confidence,
                        view.in_flight
                    );
                }
                changed = self.stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.pipeline.deactivate().await;
        self.pipeline
    }
}
