//! Lists USB Video Class cameras and correlates them with the operating system's own video
//! devices.
//!
//! Discovery runs in layers:
//! - [`list`] walks the libusb device list and yields the devices that expose a UVC function.
//! - [`lister::CameraLister`] turns those into [`CameraDevice`] records and rewrites
//!   permission and missing-device failures into operator-facing messages.
//! - [`merge`] folds in devices the OS knows about but libusb didn't report, using
//!   [`correlate`] to pull `vendor:product` pairs out of OS device labels.
//! - [`session::Session`] is the controller behind the interactive shell: refresh state,
//!   camera selection and live preview.

mod detect;
mod error;
mod util;

pub mod camera;
pub mod correlate;
pub mod discovery;
pub mod export;
pub mod ipc;
pub mod lister;
pub mod media;
pub mod menu;
pub mod merge;
pub mod preview;
pub mod session;

use std::fmt;

use detect::UvcInfo;
use error::*;
use rusb::{Context, Device, UsbContext};

pub use camera::{CameraDevice, UsbId};
pub use discovery::Discovery;
pub use error::Error;
pub use lister::{CameraLister, Libusb, UsbSource};
pub use util::{parse_hex, to_hex};

pub type Result<T> = std::result::Result<T, Error>;

/// Identifies a UVC device.
pub struct UvcDeviceDesc {
    usb: Device<Context>,
    uvc_info: UvcInfo,
}

impl UvcDeviceDesc {
    pub fn vendor_id(&self) -> u16 {
        // unwrap: always succeeds
        self.usb.device_descriptor().unwrap().vendor_id()
    }

    pub fn product_id(&self) -> u16 {
        // unwrap: always succeeds
        self.usb.device_descriptor().unwrap().product_id()
    }

    pub fn bus_number(&self) -> u8 {
        self.usb.bus_number()
    }

    pub fn address(&self) -> u8 {
        self.usb.address()
    }

    /// Number of video streaming interfaces of the UVC function.
    pub fn streaming_interface_count(&self) -> usize {
        self.uvc_info.streaming_interfaces.len()
    }

    /// Reads the product string, falling back to the name of the video function.
    ///
    /// Returns `Ok(None)` when the device provides neither. Reading strings requires opening
    /// the device, so this fails with `rusb::Error::Access` without device permissions.
    pub fn read_name(&self) -> Result<Option<String>> {
        let desc = self
            .usb
            .device_descriptor()
            .during(Action::AccessingDeviceDescriptor)?;
        let index = match desc
            .product_string_index()
            .or(self.uvc_info.function_string)
        {
            Some(index) => index,
            None => return Ok(None),
        };

        let handle = self.usb.open().during(Action::ReadingDeviceString)?;
        let name = handle
            .read_string_descriptor_ascii(index)
            .during(Action::ReadingDeviceString)?;
        let name = name.trim();
        Ok(if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        })
    }
}

impl fmt::Debug for UvcDeviceDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UvcDeviceDesc")
            .field("bus", &self.usb.bus_number())
            .field("address", &self.usb.address())
            .field("uvc_info", &self.uvc_info)
            .finish()
    }
}

/// Lists the attached devices that expose a UVC function, in libusb's order.
///
/// Devices whose descriptors can't be read or don't make sense are logged and skipped.
pub fn list() -> Result<impl Iterator<Item = UvcDeviceDesc>> {
    let ctx = Context::new().during(Action::EnumeratingDevices)?;
    let list = ctx.devices().during(Action::EnumeratingDevices)?;

    let devices = list
        .iter()
        .filter_map(|dev| match detect::detect_uvc(&dev) {
            Ok(Some(info)) => Some(UvcDeviceDesc {
                usb: dev,
                uvc_info: info,
            }),
            Ok(None) => None,
            Err(e) => {
                log::error!("{:?}: {}", dev, e);
                None
            }
        })
        .collect::<Vec<_>>();

    Ok(devices.into_iter())
}
