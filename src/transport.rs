//! USB transport abstraction.
//!
//! The acquisition engine talks to the device through the [`Transport`]
//! trait: bulk transfers plus the interface/claim/reset housekeeping the
//! driver performs around them. Production code uses [`UsbTransport`] over a
//! `rusb` device handle; tests substitute scripted mocks.

use std::time::Duration;

/// Errors raised by a transport.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// USB stack error.
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// A transfer moved fewer bytes than required.
    #[error("short transfer: {transferred} of {expected} bytes")]
    ShortTransfer { transferred: usize, expected: usize },

    /// The transport mock was asked for data it does not have (test-only in
    /// practice, but classified as a transport failure either way).
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the error is a bulk-transfer timeout. Timeouts on the data
    /// endpoint are expected whenever the device has nothing to send and are
    /// absorbed by the read loop.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Usb(rusb::Error::Timeout))
    }
}

/// Transport result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Bulk-transfer and device-housekeeping capabilities of a USB device.
///
/// The engine treats this purely as an abstract capability set; device
/// enumeration and descriptor matching live in [`crate::discovery`].
pub trait Transport: Send + 'static {
    /// Blocking bulk read from `endpoint` into `buf`, bounded by `timeout`.
    /// Returns the number of bytes read.
    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Blocking bulk write of `data` to `endpoint`, bounded by `timeout`.
    /// Returns the number of bytes written.
    fn write_bulk(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Claim an interface for exclusive use.
    fn claim_interface(&mut self, interface: u8) -> Result<()>;

    /// Release a previously claimed interface.
    fn release_interface(&mut self, interface: u8) -> Result<()>;

    /// Whether a kernel driver currently owns the interface.
    fn kernel_driver_active(&self, interface: u8) -> Result<bool>;

    /// Detach the kernel driver from an interface.
    fn detach_kernel_driver(&mut self, interface: u8) -> Result<()>;

    /// Reattach the kernel driver to an interface.
    fn attach_kernel_driver(&mut self, interface: u8) -> Result<()>;

    /// Reset the device.
    fn reset(&mut self) -> Result<()>;

    /// Select the active configuration.
    fn set_active_configuration(&mut self, config: u8) -> Result<()>;
}

/// [`Transport`] implementation over a `rusb` device handle.
pub struct UsbTransport {
    handle: rusb::DeviceHandle<rusb::Context>,
}

impl UsbTransport {
    /// Wrap an already opened device handle.
    pub fn new(handle: rusb::DeviceHandle<rusb::Context>) -> Self {
        Self { handle }
    }

    /// Access the underlying handle.
    pub fn handle(&self) -> &rusb::DeviceHandle<rusb::Context> {
        &self.handle
    }
}

impl Transport for UsbTransport {
    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        Ok(self.handle.read_bulk(endpoint, buf, timeout)?)
    }

    fn write_bulk(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        let transferred = self.handle.write_bulk(endpoint, data, timeout)?;
        if transferred != data.len() {
            return Err(Error::ShortTransfer {
                transferred,
                expected: data.len(),
            });
        }
        Ok(transferred)
    }

    fn claim_interface(&mut self, interface: u8) -> Result<()> {
        Ok(self.handle.claim_interface(interface)?)
    }

    fn release_interface(&mut self, interface: u8) -> Result<()> {
        Ok(self.handle.release_interface(interface)?)
    }

    fn kernel_driver_active(&self, interface: u8) -> Result<bool> {
        Ok(self.handle.kernel_driver_active(interface)?)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<()> {
        Ok(self.handle.detach_kernel_driver(interface)?)
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<()> {
        Ok(self.handle.attach_kernel_driver(interface)?)
    }

    fn reset(&mut self) -> Result<()> {
        Ok(self.handle.reset()?)
    }

    fn set_active_configuration(&mut self, config: u8) -> Result<()> {
        Ok(self.handle.set_active_configuration(config)?)
    }
}
