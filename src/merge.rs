//! Folds OS video devices into the USB camera list.

use std::collections::HashSet;

use crate::{
    correlate::{extract_ids, pair_key},
    media::MediaDeviceInfo,
    CameraDevice,
};

/// Merges `native` OS devices into the `authoritative` USB list.
///
/// USB entries come first, in their original order. An OS device is appended only when
/// neither its label (case-insensitive) nor the ids embedded in its label match a camera
/// that is already in the list. USB cameras whose name matches an OS label pick up that
/// device's handle.
///
/// Two different cameras the OS gives the same name end up as a single entry.
pub fn merge(authoritative: Vec<CameraDevice>, native: &[MediaDeviceInfo]) -> Vec<CameraDevice> {
    let mut names = HashSet::new();
    let mut keys = HashSet::new();
    let mut merged = Vec::with_capacity(authoritative.len() + native.len());

    for cam in authoritative {
        let name = cam.name().to_lowercase();
        if cam.has_ids() {
            keys.insert(pair_key(cam.vendor(), cam.product()));
        }
        let cam = match native_handle_for(&name, native) {
            Some(handle) if cam.device_id().is_none() => cam.with_device_id(handle),
            _ => cam,
        };
        names.insert(name);
        merged.push(cam);
    }

    for info in native {
        let label = info.label.trim();
        if label.is_empty() {
            log::debug!("{}: skipping unlabeled device", info.device_id);
            continue;
        }

        let name = label.to_lowercase();
        if names.contains(&name) {
            log::trace!("{}: {:?} already listed by name", info.device_id, label);
            continue;
        }

        let ids = extract_ids(label);
        if let Some(ids) = &ids {
            if keys.contains(&ids.key()) {
                log::trace!("{}: {} already listed by id", info.device_id, ids.key());
                continue;
            }
        }

        let (vendor, product) = ids.as_ref().map_or((0, 0), |ids| (ids.vendor, ids.product));
        log::debug!(
            "adding OS device {} {:?} ({:04x}:{:04x})",
            info.device_id,
            label,
            vendor,
            product
        );
        if let Some(ids) = ids {
            keys.insert(ids.key());
        }
        names.insert(name);
        merged.push(CameraDevice::new(label, vendor, product, 0).with_device_id(&info.device_id));
    }

    merged
}

fn native_handle_for<'a>(lowercase_name: &str, native: &'a [MediaDeviceInfo]) -> Option<&'a str> {
    native
        .iter()
        .find(|info| info.label.trim().to_lowercase() == lowercase_name)
        .map(|info| info.device_id.as_str())
}
