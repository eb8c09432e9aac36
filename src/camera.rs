//! The camera record shared by discovery, the merge step, and the front ends.

use std::fmt;

use serde::{
    ser::{SerializeStruct, Serializer},
    Deserialize, Serialize,
};

use crate::util::{parse_hex, to_hex};

/// A camera, as reported by USB discovery or by the OS video device list.
///
/// The hex forms of the ids are always derived from the integer ids, so they can't go out
/// of sync. `0` in `vendor`, `product` or `address` means "unknown".
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "CameraRecord")]
pub struct CameraDevice {
    name: String,
    vendor: u16,
    product: u16,
    address: u8,
    device_id: Option<String>,
}

impl CameraDevice {
    pub fn new(name: impl Into<String>, vendor: u16, product: u16, address: u8) -> Self {
        Self {
            name: name.into(),
            vendor,
            product,
            address,
            device_id: None,
        }
    }

    /// Attaches the OS device handle the camera can be opened through.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> u16 {
        self.vendor
    }

    pub fn product(&self) -> u16 {
        self.product
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn vendor_hex(&self) -> String {
        to_hex(self.vendor)
    }

    pub fn product_hex(&self) -> String {
        to_hex(self.product)
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Whether both ids are known.
    pub fn has_ids(&self) -> bool {
        self.vendor != 0 && self.product != 0
    }

    pub fn matches_ids(&self, vendor: u16, product: u16) -> bool {
        self.vendor == vendor && self.product == product
    }
}

impl fmt::Debug for CameraDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {:04x}:{:04x} @{}",
            self.name, self.vendor, self.product, self.address
        )?;
        if let Some(id) = &self.device_id {
            write!(f, " ({})", id)?;
        }
        Ok(())
    }
}

impl Serialize for CameraDevice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.device_id.is_some() { 7 } else { 6 };
        let mut s = serializer.serialize_struct("CameraDevice", len)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("vendor", &self.vendor)?;
        s.serialize_field("product", &self.product)?;
        s.serialize_field("address", &self.address)?;
        s.serialize_field("vendorHex", &self.vendor_hex())?;
        s.serialize_field("productHex", &self.product_hex())?;
        if let Some(id) = &self.device_id {
            s.serialize_field("deviceId", id)?;
        }
        s.end()
    }
}

/// Wire form of [`CameraDevice`]. Incoming hex fields are ignored and recomputed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CameraRecord {
    name: String,
    #[serde(default)]
    vendor: u16,
    #[serde(default)]
    product: u16,
    #[serde(default)]
    address: u8,
    #[serde(default)]
    device_id: Option<String>,
}

impl From<CameraRecord> for CameraDevice {
    fn from(r: CameraRecord) -> Self {
        Self {
            name: r.name,
            vendor: r.vendor,
            product: r.product,
            address: r.address,
            device_id: r.device_id,
        }
    }
}

/// A vendor or product id given either as an integer or as a hex string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsbId {
    Int(u16),
    Hex(String),
}

impl UsbId {
    /// Returns the numeric id, or `None` if a hex string doesn't parse.
    pub fn resolve(&self) -> Option<u16> {
        match self {
            UsbId::Int(id) => Some(*id),
            UsbId::Hex(s) => parse_hex(s),
        }
    }
}

impl From<u16> for UsbId {
    fn from(id: u16) -> Self {
        UsbId::Int(id)
    }
}

impl From<&'_ str> for UsbId {
    fn from(s: &str) -> Self {
        UsbId::Hex(s.to_string())
    }
}

impl From<String> for UsbId {
    fn from(s: String) -> Self {
        UsbId::Hex(s)
    }
}
