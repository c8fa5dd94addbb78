//! Poll round trip
//!
//! One poll cycle is two sequential transfers: the vendor poll command as a
//! control transfer, then an 8-byte read from the interrupt IN endpoint. The
//! button never pushes data on its own, so every observation costs this round
//! trip.

use crate::usb::backend::UsbBackend;
use crate::usb::claim::ClaimedInterface;
use protocol::{
    POLL_COMMAND, POLL_INDEX, POLL_REQUEST, POLL_REQUEST_TYPE, POLL_VALUE, PollCycleOutcome,
    REPORT_LEN, TransferStage, TransportFailure, UsbError, sample_byte,
};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Timeout for the poll control transfer (libusb's usual default)
const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

/// Run one poll cycle
///
/// A read timeout is an expected outcome for flaky devices and is reported as
/// [`PollCycleOutcome::TimedOut`]. Any failure of the control transfer, and any
/// other read failure, is a [`PollCycleOutcome::TransportError`].
pub fn poll_once<B: UsbBackend>(claimed: &ClaimedInterface<B>) -> PollCycleOutcome {
    if let Err(e) = claimed.backend().write_control(
        POLL_REQUEST_TYPE,
        POLL_REQUEST,
        POLL_VALUE,
        POLL_INDEX,
        &POLL_COMMAND,
        CONTROL_TIMEOUT,
    ) {
        warn!("Poll command failed: {}", e);
        return PollCycleOutcome::TransportError(TransportFailure {
            stage: TransferStage::Command,
            error: map_rusb_error(e),
        });
    }

    let mut report = [0u8; REPORT_LEN];
    match claimed.backend().read_interrupt(
        claimed.endpoint_address(),
        &mut report,
        claimed.io_timeout(),
    ) {
        Ok(len) => {
            trace!("Status report ({} bytes): {:02x?}", len, &report[..len]);
            PollCycleOutcome::Sample(sample_byte(&report[..len]))
        }
        Err(rusb::Error::Timeout) => {
            debug!(
                "Status read on endpoint {:#04x} timed out",
                claimed.endpoint_address()
            );
            PollCycleOutcome::TimedOut
        }
        Err(e) => {
            warn!("Status read failed: {}", e);
            PollCycleOutcome::TransportError(TransportFailure {
                stage: TransferStage::Read,
                error: map_rusb_error(e),
            })
        }
    }
}

/// Map rusb::Error to protocol::UsbError
pub fn map_rusb_error(err: rusb::Error) -> UsbError {
    match err {
        rusb::Error::Timeout => UsbError::Timeout,
        rusb::Error::Pipe => UsbError::Pipe,
        rusb::Error::NoDevice => UsbError::NoDevice,
        rusb::Error::NotFound => UsbError::NotFound,
        rusb::Error::Busy => UsbError::Busy,
        rusb::Error::Overflow => UsbError::Overflow,
        rusb::Error::Io => UsbError::Io,
        rusb::Error::InvalidParam => UsbError::InvalidParam,
        rusb::Error::Access => UsbError::Access,
        rusb::Error::NotSupported => UsbError::NotSupported,
        _ => UsbError::Other {
            message: err.to_string(),
        },
    }
}
