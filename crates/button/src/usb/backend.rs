//! USB backend seam
//!
//! The claimer and the protocol driver only need a handful of libusb calls.
//! [`UsbBackend`] names exactly those, so the session logic runs against an
//! opened `rusb::DeviceHandle` in production and a scripted mock in tests.

use rusb::{DeviceHandle, Direction, TransferType, UsbContext};
use std::time::Duration;

/// Descriptor shape of one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointLayout {
    pub address: u8,
    pub direction: Direction,
    pub transfer_type: TransferType,
}

/// Descriptor shape of one interface (first alternate setting)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceLayout {
    pub number: u8,
    pub endpoints: Vec<EndpointLayout>,
}

/// Operations the button session performs on an opened device
pub trait UsbBackend {
    /// Interfaces of the active configuration
    fn interface_layout(&self) -> rusb::Result<Vec<InterfaceLayout>>;

    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool>;

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;

    fn attach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    fn read_interrupt(&self, endpoint: u8, buf: &mut [u8], timeout: Duration)
    -> rusb::Result<usize>;
}

impl<T: UsbContext> UsbBackend for DeviceHandle<T> {
    fn interface_layout(&self) -> rusb::Result<Vec<InterfaceLayout>> {
        let config = self.device().active_config_descriptor()?;

        let layout = config
            .interfaces()
            .map(|interface| {
                let endpoints = interface
                    .descriptors()
                    .next()
                    .map(|descriptor| {
                        descriptor
                            .endpoint_descriptors()
                            .map(|endpoint| EndpointLayout {
                                address: endpoint.address(),
                                direction: endpoint.direction(),
                                transfer_type: endpoint.transfer_type(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                InterfaceLayout {
                    number: interface.number(),
                    endpoints,
                }
            })
            .collect();

        Ok(layout)
    }

    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool> {
        DeviceHandle::kernel_driver_active(self, interface)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::detach_kernel_driver(self, interface)
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::attach_kernel_driver(self, interface)
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::claim_interface(self, interface)
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::release_interface(self, interface)
    }

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        DeviceHandle::write_control(self, request_type, request, value, index, data, timeout)
    }

    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        DeviceHandle::read_interrupt(self, endpoint, buf, timeout)
    }
}
