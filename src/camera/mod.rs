// Camera domain: device acquisition, capture thread, and latest-frame buffer.

pub mod buffer;
pub mod capture;
pub mod dummy;
pub mod error;
pub mod source;
pub mod types;
