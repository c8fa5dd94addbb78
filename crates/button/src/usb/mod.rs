//! USB subsystem
//!
//! Everything that touches the button over USB:
//! - Device lookup by VID/PID
//! - Interface validation and exclusive claim
//! - The poll round trip (control transfer, then interrupt read)
//! - The poll loop thread
//!
//! The poll loop runs in a dedicated thread so blocking libusb calls never
//! stall the Tokio runtime, which only waits for Ctrl+C and relays events.

pub mod backend;
pub mod claim;
pub mod locator;
#[cfg(test)]
pub mod mock;
pub mod transfers;
pub mod worker;

pub use claim::{ClaimOptions, ClaimedInterface, claim_device};
pub use locator::{list_devices, locate};
pub use worker::{PollWorker, spawn_poll_worker};
