//! Normalizes USB discovery results into [`CameraDevice`] records.

use std::fmt::Write as _;

use crate::{camera::UsbId, CameraDevice, Result};

/// A UVC device as reported by the USB layer, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDevice {
    /// Product string, if the device has one and it could be read.
    pub name: Option<String>,
    pub vendor_id: u16,
    pub product_id: u16,
    pub address: u8,
}

/// Source of USB video devices.
pub trait UsbSource {
    /// Queries all attached UVC devices.
    fn discover(&self) -> Result<Vec<RawDevice>>;
}

impl<S: UsbSource + ?Sized> UsbSource for &S {
    fn discover(&self) -> Result<Vec<RawDevice>> {
        (**self).discover()
    }
}

/// Discovers cameras through libusb.
#[derive(Debug, Default, Clone, Copy)]
pub struct Libusb;

impl UsbSource for Libusb {
    fn discover(&self) -> Result<Vec<RawDevice>> {
        let mut devices = Vec::new();
        for desc in crate::list()? {
            let name = match desc.read_name() {
                Ok(name) => name,
                Err(e) if e.usb_error() == Some(rusb::Error::Access) => return Err(e),
                Err(e) => {
                    log::warn!(
                        "{:04x}:{:04x}: {}, using a generic name",
                        desc.vendor_id(),
                        desc.product_id(),
                        e
                    );
                    None
                }
            };
            log::debug!(
                "found UVC device {:04x}:{:04x} at {:03}:{:03} with {} streaming interface(s)",
                desc.vendor_id(),
                desc.product_id(),
                desc.bus_number(),
                desc.address(),
                desc.streaming_interface_count(),
            );
            devices.push(RawDevice {
                name,
                vendor_id: desc.vendor_id(),
                product_id: desc.product_id(),
                address: desc.address(),
            });
        }
        Ok(devices)
    }
}

/// Lists cameras from a [`UsbSource`].
#[derive(Debug, Default, Clone)]
pub struct CameraLister<S> {
    source: S,
}

impl<S: UsbSource> CameraLister<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Lists all attached cameras in discovery order.
    ///
    /// Permission and missing-device failures come back with an explanation of what to do
    /// instead of the raw libusb error.
    pub fn list_cameras(&self) -> Result<Vec<CameraDevice>> {
        let raw = self.source.discover().map_err(|e| e.rewrite_discovery())?;
        Ok(raw.into_iter().map(normalize).collect())
    }

    pub fn camera_count(&self) -> Result<usize> {
        Ok(self.list_cameras()?.len())
    }

    /// Finds the first camera with the given ids.
    ///
    /// Ids can be integers or hex strings (`"0x46d"`, `"046D"`). A hex string that doesn't
    /// parse matches nothing.
    pub fn find_camera(
        &self,
        vendor: impl Into<UsbId>,
        product: impl Into<UsbId>,
    ) -> Result<Option<CameraDevice>> {
        let (vendor, product) = match (vendor.into().resolve(), product.into().resolve()) {
            (Some(v), Some(p)) => (v, p),
            _ => return Ok(None),
        };
        Ok(self
            .list_cameras()?
            .into_iter()
            .find(|cam| cam.matches_ids(vendor, product)))
    }

    pub fn formatted_list(&self) -> Result<String> {
        Ok(format_list(&self.list_cameras()?))
    }
}

pub const NO_CAMERAS: &str = "No UVC-compatible cameras found.";

/// Renders the numbered, human-readable camera list.
pub fn format_list(cameras: &[CameraDevice]) -> String {
    if cameras.is_empty() {
        return NO_CAMERAS.to_string();
    }

    let mut out = format!("Found {} UVC-compatible camera(s):\n", cameras.len());
    for (i, cam) in cameras.iter().enumerate() {
        // writing to a `String` can't fail
        let _ = write!(
            out,
            "\n{}. {}\n   Vendor: {} ({})\n   Product: {} ({})\n   Address: {}\n",
            i + 1,
            cam.name(),
            cam.vendor_hex(),
            cam.vendor(),
            cam.product_hex(),
            cam.product(),
            cam.address(),
        );
    }
    out
}

fn normalize(raw: RawDevice) -> CameraDevice {
    let name = raw.name.unwrap_or_else(|| {
        format!("UVC Camera ({:04x}:{:04x})", raw.vendor_id, raw.product_id)
    });
    CameraDevice::new(name, raw.vendor_id, raw.product_id, raw.address)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::{Action, Error};

    pub(crate) struct FakeUsb {
        devices: Vec<RawDevice>,
        failure: Option<rusb::Error>,
        pub(crate) calls: Cell<usize>,
    }

    impl FakeUsb {
        pub(crate) fn with(devices: Vec<RawDevice>) -> Self {
            Self {
                devices,
                failure: None,
                calls: Cell::new(0),
            }
        }

        pub(crate) fn failing(e: rusb::Error) -> Self {
            Self {
                devices: Vec::new(),
                failure: Some(e),
                calls: Cell::new(0),
            }
        }
    }

    impl UsbSource for FakeUsb {
        fn discover(&self) -> Result<Vec<RawDevice>> {
            self.calls.set(self.calls.get() + 1);
            match self.failure {
                Some(e) => Err(Error::with_action(e, Action::EnumeratingDevices)),
                None => Ok(self.devices.clone()),
            }
        }
    }

    pub(crate) fn raw(name: &str, vendor_id: u16, product_id: u16, address: u8) -> RawDevice {
        RawDevice {
            name: Some(name.to_string()),
            vendor_id,
            product_id,
            address,
        }
    }

    fn two_cameras() -> CameraLister<FakeUsb> {
        CameraLister::new(FakeUsb::with(vec![
            raw("HD Pro Webcam C920", 0x46d, 0x82d, 7),
            raw("Integrated Camera", 0x4f2, 0xb6d9, 3),
        ]))
    }

    #[test]
    fn lists_in_discovery_order() {
        let cams = two_cameras().list_cameras().unwrap();
        assert_eq!(cams.len(), 2);
        assert_eq!(cams[0].name(), "HD Pro Webcam C920");
        assert_eq!(cams[0].vendor_hex(), "0x046d");
        assert_eq!(cams[1].address(), 3);
        assert_eq!(cams[1].device_id(), None);
    }

    #[test]
    fn unnamed_devices_get_a_generic_name() {
        let lister = CameraLister::new(FakeUsb::with(vec![RawDevice {
            name: None,
            vendor_id: 0x1908,
            product_id: 0x2311,
            address: 2,
        }]));
        let cams = lister.list_cameras().unwrap();
        assert_eq!(cams[0].name(), "UVC Camera (1908:2311)");
    }

    #[test]
    fn find_accepts_hex_and_decimal() {
        let lister = two_cameras();
        let by_hex = lister.find_camera("0x46d", "0x82d").unwrap();
        let by_int = lister.find_camera(1133u16, 2093u16).unwrap();
        let mixed = lister.find_camera("046D", 0x82du16).unwrap();
        assert!(by_hex.is_some());
        assert_eq!(by_hex, by_int);
        assert_eq!(by_hex, mixed);
        assert_eq!(by_hex.unwrap().name(), "HD Pro Webcam C920");
    }

    #[test]
    fn find_misses_are_not_errors() {
        let lister = two_cameras();
        assert_eq!(lister.find_camera(0x1234u16, 0x5678u16).unwrap(), None);
        assert_eq!(lister.find_camera("not-hex", "0x82d").unwrap(), None);
    }

    #[test]
    fn empty_list() {
        let lister = CameraLister::new(FakeUsb::with(Vec::new()));
        assert_eq!(lister.camera_count().unwrap(), 0);
        assert_eq!(lister.formatted_list().unwrap(), NO_CAMERAS);
        assert_eq!(NO_CAMERAS, "No UVC-compatible cameras found.");
    }

    #[test]
    fn formatted_list_layout() {
        let text = two_cameras().formatted_list().unwrap();
        assert_eq!(
            text,
            "Found 2 UVC-compatible camera(s):\n\
             \n1. HD Pro Webcam C920\n   Vendor: 0x046d (1133)\n   Product: 0x082d (2093)\n   Address: 7\n\
             \n2. Integrated Camera\n   Vendor: 0x04f2 (1266)\n   Product: 0xb6d9 (46809)\n   Address: 3\n"
        );
    }

    #[test]
    fn access_denied_becomes_guidance() {
        let lister = CameraLister::new(FakeUsb::failing(rusb::Error::Access));
        let e = lister.list_cameras().unwrap_err();
        assert!(e.is_access_denied());
        assert!(e.to_string().contains("elevated privileges"));
        assert!(!e.to_string().contains("insufficient permissions"));
    }

    #[test]
    fn no_device_becomes_nothing_detected() {
        let lister = CameraLister::new(FakeUsb::failing(rusb::Error::NoDevice));
        let e = lister.camera_count().unwrap_err();
        assert!(e.is_no_camera());
        assert!(e.to_string().contains("no UVC-compatible camera was detected"));
    }

    #[test]
    fn other_failures_propagate_unchanged() {
        let lister = CameraLister::new(FakeUsb::failing(rusb::Error::Io));
        let e = lister.formatted_list().unwrap_err();
        assert_eq!(e.usb_error(), Some(rusb::Error::Io));
        assert!(!e.is_access_denied());
        assert!(!e.is_no_camera());
    }
}
