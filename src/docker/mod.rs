//! Docker volume-plugin adapter.
//!
//! Serves the volume-plugin JSON protocol on a local Unix socket. Each
//! mounted volume gets its own filesystem host at a prefix derived from the
//! volume name, under a mountpoint allocated below the configured state
//! root.

pub mod driver;
pub mod protocol;
pub mod server;

pub use driver::{DriverConfig, DriverError, VolumeDriver};
