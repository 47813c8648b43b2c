use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::{info, warn};

use live_detect::camera::dummy::DummyProducer;
use live_detect::camera::error::CameraError;
use live_detect::camera::source::FrameSource;
use live_detect::config::{CameraConfig, ConfigError, PipelineConfig};
use live_detect::identity::{StaticIdentity, UserId, USER_ENV_VAR};
use live_detect::inference::client::HttpInferenceClient;
use live_detect::inference::error::DispatchError;
use live_detect::pipeline::{LivePipeline, PipelineError, PipelineRunner};
use live_detect::session::error::StoreError;
use live_detect::session::ConfiguredStore;

/// Run live helmet detection against a camera.
#[derive(Parser, Debug)]
#[command(name = "live-detect", version)]
struct Args {
    /// JSON config file; defaults apply when it does not exist.
    #[arg(long, default_value = "live-detect.json")]
    config: PathBuf,

    /// Signed-in user id.
    #[arg(long, env = USER_ENV_VAR)]
    user: Option<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    duration_secs: Option<u64>,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Inference(#[from] DispatchError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Open the configured capture device.
///
/// Only the synthetic camera ships with this binary.
fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    if config.uses_dummy() {
        return Ok(Box::new(DummyProducer::session(config.format())));
    }
    Err(CameraError::DeviceUnavailable(format!(
        "no capture driver for '{}'; use device \"dummy\" or set DUMMY_CAMERA=1",
        config.device
    )))
}

async fn wait_for_shutdown(duration: Option<Duration>) {
    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for Ctrl-C: {e}");
            }
            info!("Interrupted, stopping");
        }
        _ = deadline => info!("Run duration elapsed, stopping"),
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .filter_module("hyper_util", log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let mut config = PipelineConfig::load(&args.config)?;
    config.apply_env_overrides();
    config.validate()?;

    let identity = match args.user.filter(|u| !u.trim().is_empty()) {
        Some(user) => StaticIdentity::signed_in(UserId::new(user)),
        None => StaticIdentity::signed_out(),
    };

    let client = Arc::new(HttpInferenceClient::new(&config.inference)?);
    let store = Arc::new(ConfiguredStore::from_config(
        &config.store,
        config.inference.timeout(),
    )?);
    info!(
        "Inference at {}, {} session store",
        client.url(),
        store.kind()
    );

    let source = open_camera(&config.camera)?;
    let pipeline =
        LivePipeline::activate(&config, &identity, source, client, Arc::clone(&store)).await?;

    let (runner, handle) = PipelineRunner::new(pipeline, &config);
    let task = tokio::spawn(runner.run());

    wait_for_shutdown(args.duration_secs.map(Duration::from_secs)).await;
    handle.stop();
    let pipeline = task.await?;

    let view = pipeline.view();
    info!(
        "Final: {} frames, {} helmets, {:.1} fps, dispatch {:?}",
        view.stats.frames_processed, view.stats.helmets_detected, view.stats.avg_fps, view.dispatch
    );
    store.flush()?;
    Ok(())
}
