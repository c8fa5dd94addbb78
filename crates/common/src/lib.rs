//! Common utilities for hulk-button
//!
//! This crate provides the shared plumbing around the button session: logging
//! setup, error handling, the async channel bridge between the Tokio runtime
//! and the blocking poll thread, and async test helpers.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use channel::{LoopCommand, PollBridge, PollChannels, create_poll_bridge};
pub use error::{Error, Result};
pub use logging::setup_logging;
