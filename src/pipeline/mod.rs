// Pipeline domain: the throttled tick loop that samples the camera, dispatches
// frames for inference, and applies the results.

pub mod error;
pub mod live;
pub mod runner;
pub mod throttle;

pub use error::PipelineError;
pub use live::{LivePipeline, LiveView, TickOutcome};
pub use runner::{PipelineRunner, RunnerHandle};
pub use throttle::CaptureThrottle;
