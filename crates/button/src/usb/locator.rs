//! Device lookup
//!
//! Finds the button among the attached devices by VID/PID. Absence is a normal
//! outcome here; the caller decides that it ends the program.

use protocol::DeviceIdentity;
use rusb::{Device, UsbContext};
use tracing::{debug, warn};

/// Summary of an attached device for `--list-devices`
#[derive(Debug, Clone)]
pub struct DeviceSummary {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub device_address: u8,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// Return the first attached device matching `identity`
pub fn locate<T: UsbContext>(
    context: &T,
    identity: DeviceIdentity,
) -> rusb::Result<Option<Device<T>>> {
    let devices = context.devices()?;

    for device in devices.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!(
                    "Skipping device at bus={}, addr={}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
                continue;
            }
        };

        if identity.matches(descriptor.vendor_id(), descriptor.product_id()) {
            debug!(
                "Matched {} at bus={}, addr={}",
                identity,
                device.bus_number(),
                device.address()
            );
            return Ok(Some(device));
        }
    }

    debug!("No device matched {}", identity);
    Ok(None)
}

/// Enumerate every attached device
///
/// String descriptors are read when the device can be opened, which usually
/// requires permissions; otherwise they are left empty.
pub fn list_devices<T: UsbContext>(context: &T) -> rusb::Result<Vec<DeviceSummary>> {
    let devices = context.devices()?;
    let mut summaries = Vec::with_capacity(devices.len());

    for device in devices.iter() {
        let Ok(descriptor) = device.device_descriptor() else {
            continue;
        };

        let (manufacturer, product) = match device.open() {
            Ok(handle) => (
                descriptor
                    .manufacturer_string_index()
                    .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok()),
                descriptor
                    .product_string_index()
                    .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok()),
            ),
            Err(_) => (None, None),
        };

        summaries.push(DeviceSummary {
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            bus_number: device.bus_number(),
            device_address: device.address(),
            manufacturer,
            product,
        });
    }

    Ok(summaries)
}
