//! Pulls USB ids out of OS device labels.
//!
//! Some platforms append the ids to camera names, e.g. `Generic Camera (1908:2311)`. The
//! match is a heuristic: labels in other formats simply produce no ids.

use once_cell::sync::Lazy;
use regex::Regex;

static ID_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[(\[]?([0-9A-Fa-f]{3,4})[:xX]([0-9A-Fa-f]{3,4})[)\]]?")
        .expect("invalid id pair pattern")
});

/// A `vendor:product` pair found in a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelIds {
    pub vendor: u16,
    pub product: u16,
}

impl LabelIds {
    /// De-duplication key: lowercase and unpadded, unlike the display form.
    pub fn key(&self) -> String {
        pair_key(self.vendor, self.product)
    }
}

pub fn pair_key(vendor: u16, product: u16) -> String {
    format!("{:x}:{:x}", vendor, product)
}

/// Extracts the first `vendor:product` pair embedded in `label`.
pub fn extract_ids(label: &str) -> Option<LabelIds> {
    let caps = ID_PAIR.captures(label)?;
    let vendor = u16::from_str_radix(caps.get(1)?.as_str(), 16).ok()?;
    let product = u16::from_str_radix(caps.get(2)?.as_str(), 16).ok()?;
    Some(LabelIds { vendor, product })
}
