// Session domain: the persisted live-session record, detection records, the
// stores that hold them, and the lifecycle manager that drives both.

pub mod error;
pub mod file;
pub mod manager;
pub mod memory;
pub mod rest;
pub mod store;
pub mod types;

pub use manager::{SessionManager, SessionState};
pub use store::{ConfiguredStore, SessionStore};
