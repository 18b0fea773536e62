//! Device discovery.
//!
//! Thin glue over `rusb`: find analyzers by vendor/product ID and open them
//! as ready-to-use transports. Everything interesting happens after this —
//! see [`crate::session`].

use rusb::UsbContext;

use crate::error::{Error, Result};
use crate::protocol::{PRODUCT_ID, VENDOR_ID};
use crate::transport::UsbTransport;

/// One discovered analyzer, not yet opened.
pub struct DiscoveredDevice {
    device: rusb::Device<rusb::Context>,
}

impl DiscoveredDevice {
    /// Bus number and address, for display.
    pub fn location(&self) -> (u8, u8) {
        (self.device.bus_number(), self.device.address())
    }

    /// Open the device as a transport.
    pub fn open(self) -> Result<UsbTransport> {
        let handle = self
            .device
            .open()
            .map_err(crate::transport::Error::from)?;
        Ok(UsbTransport::new(handle))
    }
}

/// List all attached analyzers.
pub fn list_devices() -> Result<Vec<DiscoveredDevice>> {
    let context = rusb::Context::new().map_err(crate::transport::Error::from)?;
    let devices = context.devices().map_err(crate::transport::Error::from)?;

    let mut found = Vec::new();
    for device in devices.iter() {
        let Ok(descriptor) = device.device_descriptor() else {
            continue;
        };
        if descriptor.vendor_id() == VENDOR_ID && descriptor.product_id() == PRODUCT_ID {
            found.push(DiscoveredDevice { device });
        }
    }
    log::debug!("found {} analyzer(s)", found.len());
    Ok(found)
}

/// Open the first attached analyzer.
pub fn open_first() -> Result<UsbTransport> {
    list_devices()?
        .into_iter()
        .next()
        .ok_or_else(|| Error::msg("no analyzer found"))?
        .open()
}
