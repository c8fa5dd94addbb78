//! Button and transport type definitions
//!
//! This module defines the device identity, the logical button state, the
//! transitions produced by debouncing, and the outcome of a single poll cycle.

use crate::error::ProtocolError;
use std::fmt;
use thiserror::Error;

/// Default Dream Cheeky button vendor ID
pub const DEFAULT_VENDOR_ID: u16 = 0x1d34;

/// Default Dream Cheeky button product ID
pub const DEFAULT_PRODUCT_ID: u16 = 0x0008;

/// USB vendor/product pair used to locate the button
///
/// Immutable once supplied at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Check whether a descriptor's VID/PID pair matches this identity
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_VENDOR_ID, DEFAULT_PRODUCT_ID)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}:{:#06x}", self.vendor_id, self.product_id)
    }
}

/// Parse a 16-bit USB identifier written in hex
///
/// The `0x` prefix is optional, so `0x1d34`, `0X1D34` and `1d34` are all
/// accepted. At most four hex digits are allowed, and nothing else: no sign,
/// no separators.
pub fn parse_hex_id(s: &str) -> Result<u16, ProtocolError> {
    let trimmed = s.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    // from_str_radix would take a leading '+'
    if hex.is_empty() || hex.len() > 4 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ProtocolError::InvalidHexId(s.to_string()));
    }

    u16::from_str_radix(hex, 16).map_err(|_| ProtocolError::InvalidHexId(s.to_string()))
}

/// Logical button state
///
/// Starts out as `Released` before the first sample is taken, so a button that
/// is already held down is reported as a press on the first sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ButtonState {
    Pressed,
    #[default]
    Released,
}

/// Edge emitted when the logical button state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Pressed,
    Released,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Pressed => f.write_str("PRESSED"),
            Transition::Released => f.write_str("RELEASED"),
        }
    }
}

/// Which half of the poll round trip a transport failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStage {
    /// The control transfer carrying the poll command
    Command,
    /// The interrupt IN read of the status report
    Read,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStage::Command => f.write_str("poll command"),
            TransferStage::Read => f.write_str("status read"),
        }
    }
}

/// USB error conditions
///
/// Transport-independent mirror of libusb error codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsbError {
    #[error("operation timed out")]
    Timeout,

    /// Endpoint stalled
    #[error("pipe error")]
    Pipe,

    #[error("no such device (it may have been disconnected)")]
    NoDevice,

    #[error("entity not found")]
    NotFound,

    #[error("resource busy")]
    Busy,

    #[error("overflow")]
    Overflow,

    #[error("input/output error")]
    Io,

    #[error("invalid parameter")]
    InvalidParam,

    #[error("access denied (insufficient permissions)")]
    Access,

    /// Operation not supported on this platform
    #[error("operation not supported")]
    NotSupported,

    #[error("{message}")]
    Other { message: String },
}

/// Non-recoverable transport failure observed during a poll cycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {error}")]
pub struct TransportFailure {
    pub stage: TransferStage,
    pub error: UsbError,
}

/// Result of one control-transfer-then-read round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollCycleOutcome {
    /// The read completed; carries the first byte of the report
    Sample(u8),
    /// The interrupt read exceeded the configured timeout
    TimedOut,
    /// Any other transfer failure
    TransportError(TransportFailure),
}
