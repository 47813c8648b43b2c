use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;

use live_detect::camera::dummy::DummyProducer;
use live_detect::camera::error::Result as CamResult;
use live_detect::camera::source::FrameSource;
use live_detect::camera::types::{CaptureFormat, Frame};
use live_detect::config::PipelineConfig;
use live_detect::identity::{StaticIdentity, UserId};
use live_detect::inference::client::InferenceClient;
use live_detect::inference::error::{DispatchError, Result as InferResult};
use live_detect::inference::types::{AnnotatedImage, Detection, InferenceResult};
use live_detect::pipeline::{LivePipeline, PipelineRunner, TickOutcome};
use live_detect::session::error::StoreError;
use live_detect::session::memory::MemoryStore;
use live_detect::session::{SessionState, SessionStore};
use live_detect::stats::SessionStats;

const SAMPLE: Duration = Duration::from_millis(190);

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([0, 200, 0]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn helmet_result() -> InferenceResult {
    InferenceResult {
        annotated: AnnotatedImage::from_png(png(16, 12)).unwrap(),
        detections: vec![Detection::new("Helmet", 0.9)],
    }
}

/// Camera that always shows the same frame.
struct StillSource {
    frame: Arc<Frame>,
    acquired: Arc<Mutex<bool>>,
}

impl StillSource {
    fn new() -> (Box<dyn FrameSource>, Arc<Mutex<bool>>) {
        let acquired = Arc::new(Mutex::new(false));
        let source = Self {
            frame: Arc::new(Frame {
                data: DummyProducer::test_pattern(32, 24, 0),
                width: 32,
                height: 24,
                timestamp_us: 0,
            }),
            acquired: Arc::clone(&acquired),
        };
        (Box::new(source), acquired)
    }
}

impl FrameSource for StillSource {
    fn acquire(&mut self) -> CamResult<()> {
        *self.acquired.lock() = true;
        Ok(())
    }

    fn current_frame(&self) -> Option<Arc<Frame>> {
        Some(Arc::clone(&self.frame))
    }

    fn release(&mut self) {
        *self.acquired.lock() = false;
    }

    fn is_acquired(&self) -> bool {
        *self.acquired.lock()
    }
}

/// Answers from a script, then with a helmet once the script runs out.
#[derive(Default)]
struct ScriptedClient {
    script: Mutex<VecDeque<InferResult<InferenceResult>>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn with_script(script: Vec<InferResult<InferenceResult>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

impl InferenceClient for ScriptedClient {
    async fn predict(&self, jpeg: Vec<u8>) -> InferResult<InferenceResult> {
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "payload should be JPEG");
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| Ok(helmet_result()))
    }
}

/// Holds each request until released.
#[derive(Default)]
struct GatedClient {
    gate: Notify,
    calls: AtomicUsize,
}

impl InferenceClient for GatedClient {
    async fn predict(&self, _jpeg: Vec<u8>) -> InferResult<InferenceResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(helmet_result())
    }
}

/// Crashes on its first request, then behaves.
#[derive(Default)]
struct PanicsOnceClient {
    calls: AtomicUsize,
}

impl InferenceClient for PanicsOnceClient {
    async fn predict(&self, _jpeg: Vec<u8>) -> InferResult<InferenceResult> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("inference client crashed");
        }
        Ok(helmet_result())
    }
}

/// Camera whose release blocks the calling thread, like a driver joining
/// its capture thread.
struct SlowReleaseSource {
    acquired: bool,
}

impl FrameSource for SlowReleaseSource {
    fn acquire(&mut self) -> CamResult<()> {
        self.acquired = true;
        Ok(())
    }

    fn current_frame(&self) -> Option<Arc<Frame>> {
        None
    }

    fn release(&mut self) {
        if self.acquired {
            std::thread::sleep(Duration::from_millis(300));
            self.acquired = false;
        }
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }
}

fn identity() -> StaticIdentity {
    StaticIdentity::signed_in(UserId::new("user-1"))
}

async fn activate<C: InferenceClient>(
    client: Arc<C>,
    store: &Arc<MemoryStore>,
) -> LivePipeline<C, MemoryStore> {
    let (source, _) = StillSource::new();
    LivePipeline::activate(
        &PipelineConfig::default(),
        &identity(),
        source,
        client,
        Arc::clone(store),
    )
    .await
    .unwrap()
}

/// Run `cycles` sample/settle rounds, one throttle interval apart.
async fn run_cycles<C: InferenceClient>(
    pipeline: &mut LivePipeline<C, MemoryStore>,
    t0: Instant,
    cycles: u32,
) {
    for i in 0..cycles {
        let now = t0 + SAMPLE * i;
        assert_eq!(pipeline.tick(now), TickOutcome::Dispatched, "cycle {i}");
        pipeline.settle(now).await;
    }
}

#[tokio::test]
async fn three_helmet_cycles_update_stats_log_and_session() {
    let store = Arc::new(MemoryStore::new());
    let client = ScriptedClient::with_script(vec![]);
    let mut pipeline = activate(Arc::clone(&client), &store).await;
    let SessionState::Active(session_id) = pipeline.session_state().clone() else {
        panic!("session should be active");
    };

    run_cycles(&mut pipeline, Instant::now(), 3).await;

    let stats = pipeline.stats().snapshot();
    assert_eq!(stats.frames_processed, 3);
    assert_eq!(stats.helmets_detected, 3);
    assert_eq!(stats.avg_confidence, 90.0);

    let recent = pipeline.log().to_vec();
    assert_eq!(recent.len(), 3);
    for entry in &recent {
        assert_eq!(entry.label, "Helmet");
        assert_eq!(entry.confidence, 90.0);
    }

    assert_eq!(pipeline.deactivate().await, Some(session_id.clone()));
    assert_eq!(
        pipeline.session_state(),
        &SessionState::Ended(session_id.clone())
    );

    let record = store.session(&session_id).unwrap();
    assert!(record.is_ended());
    assert_eq!(record.frames_processed, 3);
    assert_eq!(record.helmets_detected, 3);

    let detections = store.detections();
    assert_eq!(detections.len(), 3);
    assert!(detections
        .iter()
        .all(|d| d.session_id.as_ref() == Some(&session_id)));

    let refused = store
        .update_session(&session_id, &SessionStats::default())
        .await;
    assert!(matches!(refused, Err(StoreError::AlreadyEnded(_))));
    assert_eq!(pipeline.tick(Instant::now()), TickOutcome::Inactive);
}

#[tokio::test]
async fn failure_on_second_cycle_is_skipped() {
    let store = Arc::new(MemoryStore::new());
    let client = ScriptedClient::with_script(vec![
        Ok(helmet_result()),
        Err(DispatchError::Status(502)),
        Ok(helmet_result()),
    ]);
    let mut pipeline = activate(Arc::clone(&client), &store).await;

    run_cycles(&mut pipeline, Instant::now(), 3).await;

    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    assert_eq!(pipeline.stats().frames_processed(), 2);
    assert_eq!(pipeline.log().len(), 2);
    assert_eq!(pipeline.dispatch_counters().failed, 1);
    assert_eq!(pipeline.dispatch_counters().completed, 2);

    pipeline.deactivate().await;
    assert_eq!(store.detections().len(), 2);
}

#[tokio::test]
async fn dispatches_never_overlap() {
    let store = Arc::new(MemoryStore::new());
    let client = Arc::new(GatedClient::default());
    let mut pipeline = activate(Arc::clone(&client), &store).await;
    let t0 = Instant::now();

    assert_eq!(pipeline.tick(t0), TickOutcome::Dispatched);
    for i in 1..=4 {
        tokio::task::yield_now().await;
        assert_eq!(pipeline.tick(t0 + SAMPLE * i), TickOutcome::Busy);
    }
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.dispatch_counters().skipped_busy, 4);

    client.gate.notify_one();
    assert!(pipeline.settle(t0 + SAMPLE * 4).await);
    assert_eq!(pipeline.tick(t0 + SAMPLE * 5), TickOutcome::Dispatched);
    assert_eq!(pipeline.dispatch_counters().issued, 2);

    client.gate.notify_one();
    pipeline.deactivate().await;
}

#[tokio::test]
async fn late_result_after_deactivate_is_discarded() {
    let store = Arc::new(MemoryStore::new());
    let client = Arc::new(GatedClient::default());
    let mut pipeline = activate(Arc::clone(&client), &store).await;

    assert_eq!(pipeline.tick(Instant::now()), TickOutcome::Dispatched);
    pipeline.deactivate().await;

    client.gate.notify_one();
    assert!(!pipeline.settle(Instant::now()).await);
    assert_eq!(pipeline.stats().frames_processed(), 0);
    assert!(pipeline.log().is_empty());
    assert!(pipeline.latest_overlay().is_none());
    assert_eq!(pipeline.dispatch_counters().discarded_stale, 1);
    assert!(store.detections().is_empty());
}

#[tokio::test]
async fn client_panic_fails_one_cycle_and_sampling_continues() {
    let store = Arc::new(MemoryStore::new());
    let client = Arc::new(PanicsOnceClient::default());
    let mut pipeline = activate(Arc::clone(&client), &store).await;
    let t0 = Instant::now();

    assert_eq!(pipeline.tick(t0), TickOutcome::Dispatched);
    assert!(!pipeline.settle(t0).await);
    assert!(!pipeline.is_in_flight());
    assert_eq!(pipeline.dispatch_counters().failed, 1);
    assert!(pipeline.view().last_error.unwrap().contains("aborted"));

    for i in 1..=3 {
        let now = t0 + SAMPLE * i;
        assert_eq!(pipeline.tick(now), TickOutcome::Dispatched, "cycle {i}");
        assert!(pipeline.settle(now).await);
    }
    assert_eq!(pipeline.stats().frames_processed(), 3);
    assert_eq!(pipeline.dispatch_counters().skipped_busy, 0);
    pipeline.deactivate().await;
}

#[tokio::test]
async fn blocking_camera_release_does_not_stall_other_tasks() {
    let store = Arc::new(MemoryStore::new());
    let mut pipeline = LivePipeline::activate(
        &PipelineConfig::default(),
        &identity(),
        Box::new(SlowReleaseSource { acquired: false }),
        ScriptedClient::with_script(vec![]),
        Arc::clone(&store),
    )
    .await
    .unwrap();

    let start = Instant::now();
    let timer = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        start.elapsed()
    };
    let (ended, timer_fired_after) = tokio::join!(pipeline.deactivate(), timer);

    assert!(ended.is_some());
    assert!(
        timer_fired_after < Duration::from_millis(250),
        "runtime stalled for {timer_fired_after:?} during release"
    );
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(!pipeline.camera_held());
}

#[tokio::test]
async fn store_failure_at_start_still_runs_live_view() {
    let store = Arc::new(MemoryStore::new());
    store.set_failing(true);
    let client = ScriptedClient::with_script(vec![]);
    let mut pipeline = activate(Arc::clone(&client), &store).await;
    assert_eq!(pipeline.session_state(), &SessionState::NotStarted);

    store.set_failing(false);
    run_cycles(&mut pipeline, Instant::now(), 2).await;
    assert_eq!(pipeline.stats().frames_processed(), 2);

    assert_eq!(pipeline.deactivate().await, None);
    assert!(store.sessions().is_empty());

    // Detections were still written, without a session.
    let detections = store.detections();
    assert_eq!(detections.len(), 2);
    assert!(detections.iter().all(|d| d.session_id.is_none()));
    // One failed create plus the two detection writes; no update or end.
    assert_eq!(store.call_count(), 3);
}

#[tokio::test]
async fn camera_is_released_on_deactivate() {
    let store = Arc::new(MemoryStore::new());
    let (source, acquired) = StillSource::new();
    let mut pipeline = LivePipeline::activate(
        &PipelineConfig::default(),
        &identity(),
        source,
        ScriptedClient::with_script(vec![]),
        Arc::clone(&store),
    )
    .await
    .unwrap();
    assert!(*acquired.lock());

    pipeline.deactivate().await;
    assert!(!*acquired.lock());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runner_drives_dummy_camera_until_stopped() {
    let mut config = PipelineConfig::default();
    config.throttle.sample_interval_ms = 20;
    config.throttle.tick_interval_ms = 5;
    config.report_interval_ms = 50;
    config.session.update_interval_ms = 100;

    let format = CaptureFormat {
        width: 64,
        height: 48,
        fps: 100.0,
    };
    let store = Arc::new(MemoryStore::new());
    let client = ScriptedClient::with_script(vec![]);
    let pipeline = LivePipeline::activate(
        &config,
        &identity(),
        Box::new(DummyProducer::session(format)),
        Arc::clone(&client),
        Arc::clone(&store),
    )
    .await
    .unwrap();

    let (runner, handle) = PipelineRunner::new(pipeline, &config);
    let task = tokio::spawn(runner.run());
    tokio::time::sleep(Duration::from_millis(400)).await;
    handle.stop();
    let pipeline = task.await.unwrap();

    assert!(!pipeline.is_active());
    assert!(!pipeline.camera_held());
    let frames = pipeline.stats().frames_processed();
    assert!(frames >= 3, "only {frames} frames processed");

    let sessions = store.sessions();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_ended());
    assert_eq!(sessions[0].frames_processed, frames);
}
