//! Error types
//!
//! [`SessionError`] is the taxonomy for everything that can end a button
//! session. Timeouts on the status read are not part of it: the poll loop
//! absorbs them as empty cycles.

use crate::types::{DeviceIdentity, TransportFailure, UsbError};
use thiserror::Error;

/// Exit code when no matching device is attached
pub const EXIT_CODE_NOT_FOUND: u8 = 30;

/// Exit code when a kernel driver is bound and detaching was declined
pub const EXIT_CODE_KERNEL_DRIVER_PRESENT: u8 = 31;

/// Exit code when opening the device was refused by the OS
pub const EXIT_CODE_ACCESS_DENIED: u8 = 32;

/// Exit code for an unexpected interface/endpoint layout
pub const EXIT_CODE_CONFIGURATION_MISMATCH: u8 = 33;

/// Exit code for every other failure
pub const EXIT_CODE_FAILURE: u8 = 1;

/// Parse errors for identifiers
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not a 16-bit hex number
    #[error("Invalid USB id '{0}', expected 1-4 hex digits (e.g., '0x11AA')")]
    InvalidHexId(String),
}

/// Descriptor shape that does not match what the poll protocol assumes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationMismatch {
    #[error("Expected a single USB interface, but found {found}")]
    InterfaceCount { found: usize },

    #[error("Expected a single endpoint on interface {interface}, but found {found}")]
    EndpointCount { interface: u8, found: usize },

    #[error("Expected endpoint {address:#04x} direction `in`, was `{found}`")]
    EndpointDirection { address: u8, found: String },

    #[error("Expected endpoint {address:#04x} transfer type `interrupt`, was `{found}`")]
    EndpointTransferType { address: u8, found: String },
}

/// Terminal conditions of a button session
#[derive(Debug, Error)]
pub enum SessionError {
    /// No attached device matched the requested VID/PID
    #[error("Could not find button {identity}")]
    NotFound { identity: DeviceIdentity },

    /// The OS refused to open the device
    #[error("Access denied opening the button, you probably need a udev rule for this device")]
    AccessDenied,

    /// The device topology is not the one the poll protocol expects
    #[error("Unexpected device configuration: {0}")]
    ConfigurationMismatch(#[from] ConfigurationMismatch),

    /// A kernel driver is bound and the caller declined to detach it
    #[error("Kernel driver active on interface {interface}, not continuing without detaching it")]
    DriverPresentNotDetached { interface: u8 },

    /// A transfer failed in a way the poll loop cannot recover from
    #[error("USB transfer error: {0}")]
    Transport(TransportFailure),

    /// Any other USB failure during setup
    #[error("USB error: {0}")]
    Usb(UsbError),
}

impl SessionError {
    /// Process exit code for this termination reason
    pub fn exit_code(&self) -> u8 {
        match self {
            SessionError::NotFound { .. } => EXIT_CODE_NOT_FOUND,
            SessionError::DriverPresentNotDetached { .. } => EXIT_CODE_KERNEL_DRIVER_PRESENT,
            SessionError::AccessDenied => EXIT_CODE_ACCESS_DENIED,
            SessionError::ConfigurationMismatch(_) => EXIT_CODE_CONFIGURATION_MISMATCH,
            SessionError::Transport(_) | SessionError::Usb(_) => EXIT_CODE_FAILURE,
        }
    }
}
