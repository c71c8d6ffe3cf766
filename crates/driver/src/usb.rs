//! USB transport for real dongle hardware
//!
//! Finds a dongle by vendor/product id, claims its bulk interface, and
//! exposes it through the [`DongleTransport`] trait. Reads and writes are
//! synchronous bulk transfers; libusb allows them to proceed concurrently
//! on the IN and OUT endpoints.

use crate::error::{DriverError, Result};
use common::{DongleTransport, ReadOutcome, TransportError};
use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Vendor/product ids of supported dongles
pub const KNOWN_DONGLES: &[(u16, u16)] = &[(0x1314, 0x1520), (0x1314, 0x1521)];

const CONFIGURATION: u8 = 1;
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Large enough for a full video frame chunk at the default packet size
const READ_BUFFER: usize = 64 * 1024;

/// Bulk-endpoint transport over a claimed dongle interface
pub struct UsbDongleTransport {
    handle: DeviceHandle<Context>,
    interface: u8,
    endpoint_in: u8,
    endpoint_out: u8,
}

impl UsbDongleTransport {
    /// Open the first attached device matching [`KNOWN_DONGLES`]
    pub fn open_first() -> Result<Self> {
        let context = Context::new()?;
        for device in context.devices()?.iter() {
            let Ok(descriptor) = device.device_descriptor() else {
                continue;
            };
            let id = (descriptor.vendor_id(), descriptor.product_id());
            if KNOWN_DONGLES.contains(&id) {
                info!(
                    vendor = format_args!("{:04x}", id.0),
                    product = format_args!("{:04x}", id.1),
                    "found dongle"
                );
                return Self::claim(&device);
            }
        }
        Err(DriverError::NoDongle)
    }

    fn claim(device: &Device<Context>) -> Result<Self> {
        let handle = device.open()?;
        if let Err(err) = handle.set_auto_detach_kernel_driver(true) {
            // not supported on all platforms
            debug!("auto-detach unavailable: {err}");
        }
        handle.set_active_configuration(CONFIGURATION)?;

        let config = device.active_config_descriptor()?;
        let interface = config
            .interfaces()
            .next()
            .ok_or(DriverError::MissingEndpoint("interface"))?;
        let descriptor = interface
            .descriptors()
            .next()
            .ok_or(DriverError::MissingEndpoint("interface descriptor"))?;

        let mut endpoint_in = None;
        let mut endpoint_out = None;
        for endpoint in descriptor.endpoint_descriptors() {
            if endpoint.transfer_type() != TransferType::Bulk {
                continue;
            }
            match endpoint.direction() {
                Direction::In => endpoint_in = Some(endpoint.address()),
                Direction::Out => endpoint_out = Some(endpoint.address()),
            }
        }
        let endpoint_in = endpoint_in.ok_or(DriverError::MissingEndpoint("bulk IN endpoint"))?;
        let endpoint_out = endpoint_out.ok_or(DriverError::MissingEndpoint("bulk OUT endpoint"))?;

        let interface = descriptor.interface_number();
        handle.claim_interface(interface)?;
        debug!(
            interface,
            endpoint_in = format_args!("{endpoint_in:#04x}"),
            endpoint_out = format_args!("{endpoint_out:#04x}"),
            "dongle interface claimed"
        );

        Ok(Self {
            handle,
            interface,
            endpoint_in,
            endpoint_out,
        })
    }
}

fn map_usb_error(err: rusb::Error) -> TransportError {
    match err {
        rusb::Error::NoDevice | rusb::Error::Pipe => TransportError::Disconnected,
        err => TransportError::Io(err.to_string()),
    }
}

impl DongleTransport for UsbDongleTransport {
    fn read(&self, timeout: Duration) -> std::result::Result<ReadOutcome, TransportError> {
        let mut buffer = vec![0u8; READ_BUFFER];
        match self.handle.read_bulk(self.endpoint_in, &mut buffer, timeout) {
            Ok(len) => {
                buffer.truncate(len);
                Ok(ReadOutcome::Data(buffer))
            }
            Err(rusb::Error::Timeout) => Ok(ReadOutcome::TimedOut),
            Err(err) => Err(map_usb_error(err)),
        }
    }

    fn write(&self, bytes: &[u8]) -> std::result::Result<(), TransportError> {
        let mut written = 0;
        while written < bytes.len() {
            match self
                .handle
                .write_bulk(self.endpoint_out, &bytes[written..], WRITE_TIMEOUT)
            {
                Ok(0) => return Err(TransportError::Io("zero-length bulk write".to_string())),
                Ok(len) => written += len,
                Err(err) => return Err(map_usb_error(err)),
            }
        }
        Ok(())
    }

    fn close(&self) {
        if let Err(err) = self.handle.release_interface(self.interface) {
            warn!("failed to release dongle interface: {err}");
        }
    }
}
