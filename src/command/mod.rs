//! Command execution infrastructure for the gate device
//!
//! This module handles:
//! - Validating the action named by an inbound command
//! - Dispatching it to the actuation controller
//! - Building correlated acknowledgments for pub/sub commands

mod dispatcher;

pub use dispatcher::{CommandDispatcher, CorrelationContext};
