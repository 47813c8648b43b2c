// Inference domain: frame encoding, the detection service client, and the
// single-flight dispatcher.

pub mod client;
pub mod dispatcher;
pub mod encode;
pub mod error;
pub mod types;
