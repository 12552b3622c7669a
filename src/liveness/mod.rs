//! Liveness Module
//!
//! Publishes a timestamped heartbeat to the status topic while the broker
//! session is up, so remote observers can tell the device is alive.

mod reporter;

pub use reporter::{LivenessHandle, LivenessReporter};
