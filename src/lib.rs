pub mod camera;
pub mod config;
pub mod identity;
pub mod inference;
pub mod pipeline;
pub mod session;
pub mod stats;

#[cfg(test)]
mod testutil;

pub use config::{ConfigError, PipelineConfig};
pub use identity::{IdentityProvider, UserId};
pub use inference::client::{HttpInferenceClient, InferenceClient};
pub use pipeline::{LivePipeline, PipelineError, PipelineRunner, RunnerHandle, TickOutcome};
pub use session::{ConfiguredStore, SessionManager, SessionState, SessionStore};
pub use stats::{DetectionLog, SessionStats, StatsAggregator};
