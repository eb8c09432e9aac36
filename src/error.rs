use std::{fmt, io};

const ACCESS_DENIED_HELP: &str = "access to the USB camera was denied. \
Run the command with elevated privileges (e.g. `sudo`), or grant your user access to the \
device, for example with a udev rule such as \
`SUBSYSTEM==\"usb\", ATTR{idVendor}==\"<vendor>\", MODE=\"0666\"`";

const NO_CAMERA_HELP: &str = "no UVC-compatible camera was detected. \
Check that the camera is connected and shows up in `lsusb`";

pub struct Error {
    action: Option<Action>,
    kind: ErrorKind,
}

impl Error {
    pub(crate) fn with_action(kind: impl Into<ErrorKind>, action: Action) -> Self {
        Self {
            action: Some(action),
            kind: kind.into(),
        }
    }

    pub(crate) fn new(kind: impl Into<ErrorKind>) -> Self {
        Self {
            action: None,
            kind: kind.into(),
        }
    }

    /// Returns the underlying libusb error, if there is one.
    pub fn usb_error(&self) -> Option<rusb::Error> {
        match &self.kind {
            ErrorKind::Rusb(e) | ErrorKind::AccessDenied(e) | ErrorKind::NoCamera(e) => {
                Some(*e)
            }
            _ => None,
        }
    }

    /// Whether this error was caused by missing USB device permissions.
    pub fn is_access_denied(&self) -> bool {
        matches!(&self.kind, ErrorKind::AccessDenied(_))
    }

    /// Whether discovery found no device to talk to.
    pub fn is_no_camera(&self) -> bool {
        matches!(&self.kind, ErrorKind::NoCamera(_))
    }

    /// Replaces permission and missing-device failures with operator-facing guidance.
    ///
    /// All other errors are returned unchanged.
    pub(crate) fn rewrite_discovery(self) -> Self {
        let kind = match self.kind {
            ErrorKind::Rusb(rusb::Error::Access) => {
                ErrorKind::AccessDenied(rusb::Error::Access)
            }
            ErrorKind::Rusb(e @ rusb::Error::NotFound)
            | ErrorKind::Rusb(e @ rusb::Error::NoDevice) => ErrorKind::NoCamera(e),
            kind => kind,
        };
        Self {
            action: self.action,
            kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::AccessDenied(_) => return f.write_str(ACCESS_DENIED_HELP),
            ErrorKind::NoCamera(_) => return f.write_str(NO_CAMERA_HELP),
            _ => {}
        }

        if let Some(action) = &self.action {
            write!(f, "error while {}: ", action)?;
        }

        match &self.kind {
            ErrorKind::Rusb(e) => write!(f, "{}", e),
            ErrorKind::Io(e) => write!(f, "{}", e),
            ErrorKind::Json(e) => write!(f, "{}", e),
            ErrorKind::Other(e) => write!(f, "{}", e),
            ErrorKind::AccessDenied(_) | ErrorKind::NoCamera(_) => Ok(()),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Error {}

impl From<rusb::Error> for Error {
    fn from(e: rusb::Error) -> Self {
        Self::new(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::new(e)
    }
}

#[derive(Debug)]
pub(crate) enum ErrorKind {
    Rusb(rusb::Error),
    Io(io::Error),
    Json(serde_json::Error),
    /// Rewritten `rusb::Error::Access`.
    AccessDenied(rusb::Error),
    /// Rewritten `rusb::Error::NotFound` or `rusb::Error::NoDevice`.
    NoCamera(rusb::Error),
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ErrorKind {
    fn from(v: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(v)
    }
}

impl From<String> for ErrorKind {
    fn from(s: String) -> Self {
        Self::Other(s.into())
    }
}

impl From<&'_ str> for ErrorKind {
    fn from(s: &str) -> Self {
        Self::Other(s.into())
    }
}

impl From<rusb::Error> for ErrorKind {
    fn from(e: rusb::Error) -> Self {
        Self::Rusb(e)
    }
}

impl From<io::Error> for ErrorKind {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ErrorKind {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// A list of actions during which this library might encounter errors.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Action {
    AccessingDeviceDescriptor,
    EnumeratingDevices,
    ReadingDeviceString,
    EnumeratingMediaDevices,
    OpeningStream,
    Serializing,
    Exporting,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::AccessingDeviceDescriptor => "accessing device descriptor",
            Action::EnumeratingDevices => "enumerating USB devices",
            Action::ReadingDeviceString => "reading device strings",
            Action::EnumeratingMediaDevices => "enumerating video devices",
            Action::OpeningStream => "opening the video stream",
            Action::Serializing => "serializing camera data",
            Action::Exporting => "exporting camera data",
        };
        f.write_str(s)
    }
}

pub(crate) trait ResultExt<T, E> {
    fn during(self, action: Action) -> Result<T, Error>;
}

impl<T, E: Into<ErrorKind>> ResultExt<T, E> for Result<T, E> {
    fn during(self, action: Action) -> Result<T, Error> {
        self.map_err(|e| Error::with_action(e, action))
    }
}

pub(crate) fn err<T>(err: impl Into<ErrorKind>, action: Action) -> Result<T, Error> {
    Err(Error::with_action(err, action))
}
