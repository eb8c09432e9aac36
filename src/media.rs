//! The operating system's own list of video capture devices.
//!
//! On Linux this is video4linux: every capture node shows up under
//! `/sys/class/video4linux/videoN` with a human-readable `name`. The OS list can contain
//! cameras libusb doesn't report (and vice versa), which is why it gets merged in.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{error::*, Result};

const SYSFS_ROOT: &str = "/sys/class/video4linux";

/// An OS video device: its label and the handle it is opened through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub label: String,
    pub device_id: String,
}

impl MediaDeviceInfo {
    pub fn new(label: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            device_id: device_id.into(),
        }
    }
}

/// Which stream to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRequest {
    /// A specific OS device handle.
    Device(String),
    /// Whatever video device the OS considers the default.
    Default,
}

/// A running video stream.
pub trait VideoStream: Send {
    /// Frame size in pixels, `(width, height)`.
    fn resolution(&self) -> (u32, u32);

    /// Blocks until the next frame arrives.
    fn next_frame(&mut self) -> io::Result<()>;
}

/// Access to the OS video devices.
pub trait MediaDevices {
    fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>>;

    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>>;
}

impl<M: MediaDevices + ?Sized> MediaDevices for &M {
    fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>> {
        (**self).enumerate()
    }

    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>> {
        (**self).open(request)
    }
}

/// video4linux devices, enumerated through sysfs.
#[derive(Debug, Clone)]
pub struct SysfsMedia {
    root: PathBuf,
    dev: PathBuf,
}

impl Default for SysfsMedia {
    fn default() -> Self {
        Self::with_root(SYSFS_ROOT, "/dev")
    }
}

impl SysfsMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads device entries from `root` and builds handles under `dev`.
    pub fn with_root(root: impl Into<PathBuf>, dev: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dev: dev.into(),
        }
    }

    fn read_entry(&self, path: &Path, node: &str) -> Option<MediaDeviceInfo> {
        // Drivers register extra nodes (metadata, ...) per camera, only index 0 captures.
        if let Ok(index) = fs::read_to_string(path.join("index")) {
            if index.trim() != "0" {
                log::trace!("{}: skipping secondary node {}", node, index.trim());
                return None;
            }
        }

        let label = match fs::read_to_string(path.join("name")) {
            Ok(name) => name.trim().to_string(),
            Err(e) => {
                log::debug!("{}: no name ({})", node, e);
                return None;
            }
        };

        Some(MediaDeviceInfo {
            label,
            device_id: self.dev.join(node).to_string_lossy().into_owned(),
        })
    }
}

impl MediaDevices for SysfsMedia {
    fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            // no video4linux devices registered at all
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return err(e, Action::EnumeratingMediaDevices),
        };

        let mut nodes = Vec::new();
        for entry in entries {
            let entry = entry.during(Action::EnumeratingMediaDevices)?;
            let file_name = entry.file_name();
            let node = match file_name.to_str() {
                Some(node) => node.to_string(),
                None => continue,
            };
            let index = match node.strip_prefix("video").and_then(|n| n.parse::<u32>().ok()) {
                Some(index) => index,
                None => continue,
            };
            if let Some(info) = self.read_entry(&entry.path(), &node) {
                nodes.push((index, info));
            }
        }

        nodes.sort_by_key(|(index, _)| *index);
        Ok(nodes.into_iter().map(|(_, info)| info).collect())
    }

    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>> {
        let path = match request {
            StreamRequest::Device(id) => id.clone(),
            StreamRequest::Default => match self.enumerate()?.into_iter().next() {
                Some(info) => info.device_id,
                None => {
                    return err(
                        "no video capture device available",
                        Action::OpeningStream,
                    )
                }
            },
        };
        open_stream(&path)
    }
}

#[cfg(feature = "preview")]
fn open_stream(path: &str) -> Result<Box<dyn VideoStream>> {
    Ok(Box::new(v4l_stream::V4lStream::open(path)?))
}

#[cfg(not(feature = "preview"))]
fn open_stream(path: &str) -> Result<Box<dyn VideoStream>> {
    err(
        format!(
            "cannot open {}: preview support was not built (enable the `preview` feature)",
            path
        ),
        Action::OpeningStream,
    )
}

#[cfg(feature = "preview")]
mod v4l_stream {
    use std::io;

    use v4l::{buffer::Type, io::traits::CaptureStream, prelude::*, video::Capture};

    use crate::{error::*, Result};

    const BUFFER_COUNT: u32 = 4;

    pub(super) struct V4lStream {
        // keeps the device open for the lifetime of the stream
        _device: Device,
        stream: MmapStream<'static>,
        resolution: (u32, u32),
    }

    impl V4lStream {
        pub(super) fn open(path: &str) -> Result<Self> {
            let device = Device::with_path(path).during(Action::OpeningStream)?;
            let format = device.format().during(Action::OpeningStream)?;
            log::debug!("{}: {}", path, format);
            let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
                .during(Action::OpeningStream)?;
            Ok(Self {
                _device: device,
                stream,
                resolution: (format.width, format.height),
            })
        }
    }

    impl super::VideoStream for V4lStream {
        fn resolution(&self) -> (u32, u32) {
            self.resolution
        }

        fn next_frame(&mut self) -> io::Result<()> {
            CaptureStream::next(&mut self.stream).map(|_| ())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        cell::RefCell,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    use super::*;

    /// Stream that produces a frame every few milliseconds and reports when it's dropped.
    pub(crate) struct FakeStream {
        pub(crate) resolution: (u32, u32),
        pub(crate) frames: Arc<AtomicUsize>,
        pub(crate) dropped: Arc<AtomicBool>,
        /// Fail every frame, as an unplugged camera does.
        pub(crate) unplugged: bool,
    }

    impl VideoStream for FakeStream {
        fn resolution(&self) -> (u32, u32) {
            self.resolution
        }

        fn next_frame(&mut self) -> io::Result<()> {
            thread::sleep(Duration::from_millis(2));
            if self.unplugged {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
            }
            self.frames.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Drop for FakeStream {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    /// OS device list with scripted streams; records every open request.
    pub(crate) struct FakeMedia {
        pub(crate) devices: Vec<MediaDeviceInfo>,
        pub(crate) fail_enumerate: bool,
        /// Handles that fail to open. `"default"` makes the default stream fail.
        pub(crate) broken: Vec<String>,
        /// Handles that open but whose stream fails on the first frame.
        pub(crate) unplugged: Vec<String>,
        pub(crate) opened: RefCell<Vec<StreamRequest>>,
        pub(crate) dropped: RefCell<Vec<Arc<AtomicBool>>>,
    }

    impl FakeMedia {
        pub(crate) fn with(devices: Vec<MediaDeviceInfo>) -> Self {
            Self {
                devices,
                fail_enumerate: false,
                broken: Vec::new(),
                unplugged: Vec::new(),
                opened: RefCell::new(Vec::new()),
                dropped: RefCell::new(Vec::new()),
            }
        }
    }

    impl MediaDevices for FakeMedia {
        fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>> {
            if self.fail_enumerate {
                return err(
                    io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
                    Action::EnumeratingMediaDevices,
                );
            }
            Ok(self.devices.clone())
        }

        fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>> {
            self.opened.borrow_mut().push(request.clone());
            let key = match request {
                StreamRequest::Device(id) => id.as_str(),
                StreamRequest::Default => "default",
            };
            if self.broken.iter().any(|b| b == key) {
                return err(format!("cannot open {}", key), Action::OpeningStream);
            }
            let dropped = Arc::new(AtomicBool::new(false));
            self.dropped.borrow_mut().push(dropped.clone());
            Ok(Box::new(FakeStream {
                resolution: (1280, 720),
                frames: Arc::new(AtomicUsize::new(0)),
                dropped,
                unplugged: self.unplugged.iter().any(|u| u == key),
            }))
        }
    }

    fn add_node(root: &Path, node: &str, name: &str, index: Option<&str>) {
        let dir = root.join(node);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{}\n", name)).unwrap();
        if let Some(index) = index {
            fs::write(dir.join("index"), format!("{}\n", index)).unwrap();
        }
    }

    #[test]
    fn enumerates_sysfs_nodes_in_index_order() {
        let root = tempfile::tempdir().unwrap();
        add_node(root.path(), "video10", "Cam B (0fd9:0078)", Some("0"));
        add_node(root.path(), "video2", "Cam A", Some("0"));
        add_node(root.path(), "video3", "Cam A", Some("1"));
        add_node(root.path(), "v4l-subdev0", "sensor", None);

        let media = SysfsMedia::with_root(root.path(), "/dev");
        let devices = media.enumerate().unwrap();
        assert_eq!(
            devices,
            vec![
                MediaDeviceInfo::new("Cam A", "/dev/video2"),
                MediaDeviceInfo::new("Cam B (0fd9:0078)", "/dev/video10"),
            ]
        );
    }

    #[test]
    fn missing_sysfs_root_means_no_devices() {
        let root = tempfile::tempdir().unwrap();
        let media = SysfsMedia::with_root(root.path().join("video4linux"), "/dev");
        assert!(media.enumerate().unwrap().is_empty());
    }

    #[test]
    fn default_stream_needs_a_device() {
        let root = tempfile::tempdir().unwrap();
        let media = SysfsMedia::with_root(root.path(), "/dev");
        assert!(media.open(&StreamRequest::Default).is_err());
    }
}
