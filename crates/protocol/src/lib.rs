//! Protocol library for hulk-button
//!
//! This crate defines the I/O-free half of the button session: the device
//! identity, the reverse-engineered poll command, the poll cycle outcome, the
//! session error taxonomy and the edge-triggered debounce state machine.
//!
//! # Example
//!
//! ```
//! use protocol::{ButtonState, Transition, observe};
//!
//! let (state, transition) = observe(26, ButtonState::Released);
//! assert_eq!(state, ButtonState::Pressed);
//! assert_eq!(transition, Some(Transition::Pressed));
//!
//! // Repeating the same sample is silent
//! let (_, transition) = observe(26, state);
//! assert!(transition.is_none());
//! ```

pub mod command;
pub mod debounce;
pub mod error;
pub mod types;

pub use command::{
    POLL_COMMAND, POLL_INDEX, POLL_REQUEST, POLL_REQUEST_TYPE, POLL_VALUE, REPORT_LEN,
    SAMPLE_PRESSED, SAMPLE_RELEASED, sample_byte,
};
pub use debounce::{Debouncer, classify, observe};
pub use error::{ConfigurationMismatch, ProtocolError, SessionError};
pub use types::{
    ButtonState, DEFAULT_PRODUCT_ID, DEFAULT_VENDOR_ID, DeviceIdentity, PollCycleOutcome,
    TransferStage, Transition, TransportFailure, UsbError, parse_hex_id,
};
