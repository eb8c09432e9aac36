use crate::{
    lister::{CameraLister, UsbSource},
    media::{MediaDevices, SysfsMedia},
    merge::merge,
    CameraDevice, Libusb, Result,
};

/// USB discovery combined with the OS video device list.
pub struct Discovery<S, M> {
    lister: CameraLister<S>,
    media: M,
}

impl Discovery<Libusb, SysfsMedia> {
    /// libusb and video4linux.
    pub fn system() -> Self {
        Self::new(Libusb, SysfsMedia::new())
    }
}

impl<S: UsbSource, M: MediaDevices> Discovery<S, M> {
    pub fn new(usb: S, media: M) -> Self {
        Self {
            lister: CameraLister::new(usb),
            media,
        }
    }

    pub fn lister(&self) -> &CameraLister<S> {
        &self.lister
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    /// Lists USB cameras, then appends OS devices that aren't among them.
    ///
    /// USB discovery errors are returned. The OS list is best-effort: if it can't be read,
    /// the USB list is returned as-is.
    pub fn unified_list(&self) -> Result<Vec<CameraDevice>> {
        let cameras = self.lister.list_cameras()?;
        match self.media.enumerate() {
            Ok(native) => Ok(merge(cameras, &native)),
            Err(e) => {
                log::warn!("OS video device list unavailable: {}", e);
                Ok(cameras)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lister::tests::{raw, FakeUsb},
        media::{tests::FakeMedia, MediaDeviceInfo},
    };

    #[test]
    fn merges_os_devices() {
        let discovery = Discovery::new(
            FakeUsb::with(vec![raw("Cam A", 0x46d, 0x82d, 4)]),
            FakeMedia::with(vec![
                MediaDeviceInfo::new("Cam A", "/dev/video0"),
                MediaDeviceInfo::new("Cam B (0fd9:0078)", "/dev/video2"),
            ]),
        );
        let cams = discovery.unified_list().unwrap();
        assert_eq!(cams.len(), 2);
        assert_eq!(cams[1].vendor_hex(), "0x0fd9");
        assert_eq!(cams[1].product_hex(), "0x0078");
    }

    #[test]
    fn os_failures_are_swallowed() {
        let mut media = FakeMedia::with(vec![MediaDeviceInfo::new("Cam B", "/dev/video2")]);
        media.fail_enumerate = true;
        let discovery = Discovery::new(FakeUsb::with(vec![raw("Cam A", 1, 2, 3)]), media);
        let cams = discovery.unified_list().unwrap();
        assert_eq!(cams.len(), 1);
        assert_eq!(cams[0].name(), "Cam A");
    }

    #[test]
    fn usb_failures_are_not() {
        let discovery = Discovery::new(
            FakeUsb::failing(rusb::Error::Access),
            FakeMedia::with(vec![MediaDeviceInfo::new("Cam B", "/dev/video2")]),
        );
        assert!(discovery.unified_list().unwrap_err().is_access_denied());
    }
}
