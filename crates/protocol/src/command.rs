//! Vendor poll command
//!
//! The button has no documented protocol. These values were captured from a
//! USB dump of the vendor driver: a class-specific SET_REPORT control transfer
//! wakes the button, after which it answers with an 8-byte report on its
//! interrupt IN endpoint. Treat them as opaque constants.

/// bmRequestType: host-to-device, class, interface
pub const POLL_REQUEST_TYPE: u8 = 0x21;

/// bRequest: SET_REPORT
pub const POLL_REQUEST: u8 = 0x09;

/// wValue
pub const POLL_VALUE: u16 = 0x0200;

/// wIndex
pub const POLL_INDEX: u16 = 0x0000;

/// Payload of the poll control transfer
pub const POLL_COMMAND: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 2];

/// Size of the status report read back from the interrupt endpoint
pub const REPORT_LEN: usize = 8;

/// First report byte while the button is held down
pub const SAMPLE_PRESSED: u8 = 26;

/// First report byte while the button is up (any value other than
/// [`SAMPLE_PRESSED`] is treated the same way)
pub const SAMPLE_RELEASED: u8 = 27;

/// Extract the sample byte from a status report
///
/// Only the first byte carries information. A zero-length report yields 0,
/// which classifies as released.
pub fn sample_byte(report: &[u8]) -> u8 {
    report.first().copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_command_shape() {
        assert_eq!(POLL_COMMAND.len(), REPORT_LEN);
        assert_eq!(POLL_COMMAND[7], 2);
        assert!(POLL_COMMAND[..7].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_request_type_is_host_to_device() {
        // Bit 7 = 0 means OUT (host to device)
        assert_eq!(POLL_REQUEST_TYPE & 0x80, 0);
    }

    #[test]
    fn test_sample_byte() {
        assert_eq!(sample_byte(&[26, 0, 0, 0, 0, 0, 0, 0]), SAMPLE_PRESSED);
        assert_eq!(sample_byte(&[27, 1, 2, 3]), SAMPLE_RELEASED);
        assert_eq!(sample_byte(&[]), 0);
    }
}
