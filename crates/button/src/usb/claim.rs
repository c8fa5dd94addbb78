//! Exclusive interface acquisition
//!
//! Opens the button, checks that its descriptors have the one-interface,
//! one-interrupt-IN-endpoint shape the poll protocol relies on, deals with a
//! bound kernel driver and claims the interface.
//!
//! The returned [`ClaimedInterface`] releases the claim when dropped, and
//! re-attaches the kernel driver if we detached it. Every exit path after the
//! claim, including a rejected endpoint, goes through that drop.

use crate::usb::backend::{EndpointLayout, UsbBackend};
use crate::usb::transfers::map_rusb_error;
use protocol::{ConfigurationMismatch, SessionError};
use rusb::{Device, DeviceHandle, Direction, TransferType, UsbContext};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Caller policy for claiming the interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimOptions {
    /// Detach a bound kernel driver instead of giving up
    pub detach_kernel_driver: bool,
    /// Timeout for status reads; zero blocks indefinitely
    pub io_timeout: Duration,
}

impl ClaimOptions {
    pub fn new(detach_kernel_driver: bool, io_timeout_ms: u64) -> Self {
        Self {
            detach_kernel_driver,
            io_timeout: Duration::from_millis(io_timeout_ms),
        }
    }
}

/// Interface claimed for the lifetime of this value
pub struct ClaimedInterface<B: UsbBackend> {
    backend: B,
    interface: u8,
    endpoint: u8,
    io_timeout: Duration,
    reattach_kernel_driver: bool,
}

impl<B: UsbBackend> ClaimedInterface<B> {
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn interface_number(&self) -> u8 {
        self.interface
    }

    /// Address of the interrupt IN endpoint
    pub fn endpoint_address(&self) -> u8 {
        self.endpoint
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }
}

impl<B: UsbBackend> Drop for ClaimedInterface<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.release_interface(self.interface) {
            warn!("Failed to release interface {}: {}", self.interface, e);
        } else {
            debug!("Released interface {}", self.interface);
        }

        if self.reattach_kernel_driver {
            match self.backend.attach_kernel_driver(self.interface) {
                Ok(()) => debug!("Reattached kernel driver to interface {}", self.interface),
                Err(e) => debug!(
                    "Could not reattach kernel driver to interface {}: {}",
                    self.interface, e
                ),
            }
        }
    }
}

/// Open the device
///
/// An access failure gets its own error kind since it is almost always a
/// missing udev rule rather than a broken device.
pub fn open_device<T: UsbContext>(device: &Device<T>) -> Result<DeviceHandle<T>, SessionError> {
    device.open().map_err(|e| {
        warn!("Failed to open device: {}", e);
        match e {
            rusb::Error::Access => SessionError::AccessDenied,
            _ => SessionError::Usb(map_rusb_error(e)),
        }
    })
}

/// Open and claim the button in one step
pub fn claim_device<T: UsbContext>(
    device: &Device<T>,
    options: &ClaimOptions,
) -> Result<ClaimedInterface<DeviceHandle<T>>, SessionError> {
    let handle = open_device(device)?;
    claim(handle, options)
}

/// Validate the descriptors and claim the sole interface
///
/// Checks run in a fixed order: interface count, endpoint count, kernel
/// driver, claim, then endpoint direction and transfer type.
pub fn claim<B: UsbBackend>(
    mut backend: B,
    options: &ClaimOptions,
) -> Result<ClaimedInterface<B>, SessionError> {
    let interfaces = backend
        .interface_layout()
        .map_err(|e| SessionError::Usb(map_rusb_error(e)))?;

    let [interface] = interfaces.as_slice() else {
        return Err(ConfigurationMismatch::InterfaceCount {
            found: interfaces.len(),
        }
        .into());
    };

    let number = interface.number;
    let [endpoint] = interface.endpoints.as_slice() else {
        return Err(ConfigurationMismatch::EndpointCount {
            interface: number,
            found: interface.endpoints.len(),
        }
        .into());
    };
    let endpoint = *endpoint;

    let detached = prepare_kernel_driver(&mut backend, number, options.detach_kernel_driver)?;

    if let Err(e) = backend.claim_interface(number) {
        warn!("Failed to claim interface {}: {}", number, e);
        if detached {
            match backend.attach_kernel_driver(number) {
                Ok(()) => debug!("Reattached kernel driver to interface {}", number),
                Err(e) => warn!(
                    "Could not reattach kernel driver to interface {}: {}",
                    number, e
                ),
            }
        }
        return Err(match e {
            rusb::Error::Access => SessionError::AccessDenied,
            _ => SessionError::Usb(map_rusb_error(e)),
        });
    }
    debug!("Claimed interface {}", number);

    let claimed = ClaimedInterface {
        backend,
        interface: number,
        endpoint: endpoint.address,
        io_timeout: options.io_timeout,
        reattach_kernel_driver: detached,
    };

    // On rejection `claimed` drops here and gives the interface back
    check_endpoint(&endpoint)?;

    info!(
        "Claimed interface {}, polling endpoint {:#04x} (timeout {:?})",
        number, endpoint.address, options.io_timeout
    );
    Ok(claimed)
}

/// Handle a kernel driver bound to `interface`
///
/// Returns whether we detached one.
fn prepare_kernel_driver<B: UsbBackend>(
    backend: &mut B,
    interface: u8,
    detach: bool,
) -> Result<bool, SessionError> {
    match backend.kernel_driver_active(interface) {
        Ok(true) => {
            info!("Kernel driver active on interface {}", interface);
            if !detach {
                return Err(SessionError::DriverPresentNotDetached { interface });
            }

            info!("Detaching kernel driver");
            backend
                .detach_kernel_driver(interface)
                .map_err(|e| SessionError::Usb(map_rusb_error(e)))?;
            Ok(true)
        }
        Ok(false) => {
            debug!("No kernel driver active on interface {}", interface);
            Ok(false)
        }
        // Platforms without kernel driver control (macOS, Windows)
        Err(rusb::Error::NotSupported) => {
            debug!("Kernel driver query not supported on this platform");
            Ok(false)
        }
        Err(e) => Err(SessionError::Usb(map_rusb_error(e))),
    }
}

fn check_endpoint(endpoint: &EndpointLayout) -> Result<(), ConfigurationMismatch> {
    if endpoint.direction != Direction::In {
        return Err(ConfigurationMismatch::EndpointDirection {
            address: endpoint.address,
            found: direction_name(endpoint.direction).to_string(),
        });
    }

    if endpoint.transfer_type != TransferType::Interrupt {
        return Err(ConfigurationMismatch::EndpointTransferType {
            address: endpoint.address,
            found: transfer_type_name(endpoint.transfer_type).to_string(),
        });
    }

    Ok(())
}

fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::In => "in",
        Direction::Out => "out",
    }
}

fn transfer_type_name(transfer_type: TransferType) -> &'static str {
    match transfer_type {
        TransferType::Control => "control",
        TransferType::Isochronous => "isochronous",
        TransferType::Bulk => "bulk",
        TransferType::Interrupt => "interrupt",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::mock::{MockBackend, MockCall};

    fn options(detach: bool) -> ClaimOptions {
        ClaimOptions::new(detach, 300)
    }

    #[test]
    fn test_claim_valid_device() {
        let backend = MockBackend::button();
        let log = backend.log();

        let claimed = claim(backend, &options(true)).unwrap();
        assert_eq!(claimed.interface_number(), 0);
        assert_eq!(claimed.endpoint_address(), 0x81);
        assert_eq!(claimed.io_timeout(), Duration::from_millis(300));
        assert_eq!(log.calls(), vec![MockCall::ClaimInterface(0)]);

        drop(claimed);
        assert_eq!(
            log.calls(),
            vec![MockCall::ClaimInterface(0), MockCall::ReleaseInterface(0)]
        );
    }

    #[test]
    fn test_two_interfaces_rejected_before_endpoint_checks() {
        // Second interface has no endpoints; the count check must win anyway
        let backend = MockBackend::button().with_extra_interface(Vec::new());
        let log = backend.log();

        let err = claim(backend, &options(true)).err().unwrap();
        assert!(matches!(
            err,
            SessionError::ConfigurationMismatch(ConfigurationMismatch::InterfaceCount { found: 2 })
        ));
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_no_interfaces_rejected() {
        let backend = MockBackend::with_interfaces(Vec::new());
        let err = claim(backend, &options(true)).err().unwrap();
        assert!(matches!(
            err,
            SessionError::ConfigurationMismatch(ConfigurationMismatch::InterfaceCount { found: 0 })
        ));
    }

    #[test]
    fn test_two_endpoints_rejected() {
        let backend = MockBackend::button().with_extra_endpoint(EndpointLayout {
            address: 0x02,
            direction: Direction::Out,
            transfer_type: TransferType::Interrupt,
        });

        let err = claim(backend, &options(true)).err().unwrap();
        assert!(matches!(
            err,
            SessionError::ConfigurationMismatch(ConfigurationMismatch::EndpointCount {
                interface: 0,
                found: 2
            })
        ));
    }

    #[test]
    fn test_kernel_driver_without_detach() {
        let backend = MockBackend::button().with_kernel_driver();
        let log = backend.log();

        let err = claim(backend, &options(false)).err().unwrap();
        assert!(matches!(
            err,
            SessionError::DriverPresentNotDetached { interface: 0 }
        ));
        assert_eq!(err.exit_code(), 31);
        assert!(log.calls().is_empty());
    }

    #[test]
    fn test_kernel_driver_detached_and_restored() {
        let backend = MockBackend::button().with_kernel_driver();
        let log = backend.log();

        let claimed = claim(backend, &options(true)).unwrap();
        assert_eq!(
            log.calls(),
            vec![MockCall::DetachKernelDriver(0), MockCall::ClaimInterface(0)]
        );

        drop(claimed);
        assert_eq!(
            log.calls(),
            vec![
                MockCall::DetachKernelDriver(0),
                MockCall::ClaimInterface(0),
                MockCall::ReleaseInterface(0),
                MockCall::AttachKernelDriver(0),
            ]
        );
    }

    #[test]
    fn test_unsupported_kernel_driver_query_is_ignored() {
        let backend = MockBackend::button().with_kernel_driver_query(Err(rusb::Error::NotSupported));
        assert!(claim(backend, &options(false)).is_ok());
    }

    #[test]
    fn test_out_endpoint_rejected_and_released() {
        let backend = MockBackend::with_endpoint(EndpointLayout {
            address: 0x01,
            direction: Direction::Out,
            transfer_type: TransferType::Interrupt,
        });
        let log = backend.log();

        let err = claim(backend, &options(true)).err().unwrap();
        match err {
            SessionError::ConfigurationMismatch(ConfigurationMismatch::EndpointDirection {
                address,
                found,
            }) => {
                assert_eq!(address, 0x01);
                assert_eq!(found, "out");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(
            log.calls(),
            vec![MockCall::ClaimInterface(0), MockCall::ReleaseInterface(0)]
        );
    }

    #[test]
    fn test_bulk_endpoint_rejected() {
        let backend = MockBackend::with_endpoint(EndpointLayout {
            address: 0x81,
            direction: Direction::In,
            transfer_type: TransferType::Bulk,
        });

        let err = claim(backend, &options(true)).err().unwrap();
        assert!(matches!(
            err,
            SessionError::ConfigurationMismatch(ConfigurationMismatch::EndpointTransferType { ref found, .. })
                if found == "bulk"
        ));
        assert_eq!(err.exit_code(), 33);
    }

    #[test]
    fn test_claim_access_denied() {
        let backend = MockBackend::button().with_claim_result(Err(rusb::Error::Access));
        let err = claim(backend, &options(true)).err().unwrap();
        assert!(matches!(err, SessionError::AccessDenied));
    }

    #[test]
    fn test_failed_claim_reattaches_driver() {
        let backend = MockBackend::button()
            .with_kernel_driver()
            .with_claim_result(Err(rusb::Error::Busy));
        let log = backend.log();

        let err = claim(backend, &options(true)).err().unwrap();
        assert!(matches!(err, SessionError::Usb(protocol::UsbError::Busy)));
        assert_eq!(
            log.calls(),
            vec![
                MockCall::DetachKernelDriver(0),
                MockCall::AttachKernelDriver(0)
            ]
        );
    }

    #[test]
    fn test_zero_timeout_means_blocking() {
        let opts = ClaimOptions::new(true, 0);
        assert!(opts.io_timeout.is_zero());
    }

    #[test]
    fn test_failed_reattach_keeps_claim_error() {
        let backend = MockBackend::button()
            .with_kernel_driver()
            .with_claim_result(Err(rusb::Error::Busy))
            .with_attach_result(Err(rusb::Error::NoDevice));
        let log = backend.log();

        let err = claim(backend, &options(true)).err().unwrap();
        assert!(matches!(err, SessionError::Usb(protocol::UsbError::Busy)));
        assert_eq!(log.calls(), vec![MockCall::DetachKernelDriver(0)]);
    }
}
