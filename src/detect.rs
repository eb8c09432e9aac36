use crate::{error::*, util::split_descriptors, Result};
use rusb::{ConfigDescriptor, Context, Device};
use zerocopy::FromBytes;

const IAD_DEVICE_CLASS: u8 = 0xEF;
const IAD_DEVICE_SUBCLASS: u8 = 0x02;
const IAD_DEVICE_PROTOCOL: u8 = 0x01;

/// Class defined at the interface level.
const PER_INTERFACE_CLASS: u8 = 0x00;

const UVC_IAD_CLASS: u8 = 0x0E;
const UVC_IAD_SUBCLASS: u8 = 0x03;
const UVC_IAD_PROTOCOL: u8 = 0x00;

const UVC_INTERF_CLASS: u8 = 0x0E;
const UVC_INTERF_SUBCLASS_CONTROL: u8 = 1;
const UVC_INTERF_SUBCLASS_STREAMING: u8 = 2;

const DESC_TYPE_IAD: u8 = 11;

/// The interfaces making up a UVC function, extracted from the configuration descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UvcInfo {
    pub(crate) control_interface: u8,
    pub(crate) streaming_interfaces: Vec<u8>,
    /// String descriptor index naming the video function (`iFunction` of the IAD), if any.
    pub(crate) function_string: Option<u8>,
}

#[derive(Debug, FromBytes)]
#[repr(C)]
#[allow(non_snake_case)]
struct InterfaceAssociationDescriptor {
    bLength: u8,
    bDescriptorType: u8,
    bFirstInterface: u8,
    bInterfaceCount: u8,
    bFunctionClass: u8,
    bFunctionSubClass: u8,
    bFunctionProtocol: u8,
    iFunction: u8,
}

/// A video interface as found in the configuration descriptor.
#[derive(Debug, Clone, Copy)]
struct VideoInterface {
    number: u8,
    class: u8,
    subclass: u8,
}

pub(crate) fn detect_uvc(device: &Device<Context>) -> Result<Option<UvcInfo>> {
    let device_desc = device
        .device_descriptor()
        .during(Action::AccessingDeviceDescriptor)?;

    log::trace!(
        "Bus {:03} Device {:03} {:04x}:{:04x}",
        device.bus_number(),
        device.address(),
        device_desc.vendor_id(),
        device_desc.product_id(),
    );

    let class = (
        device_desc.class_code(),
        device_desc.sub_class_code(),
        device_desc.protocol_code(),
    );
    let uses_iad = class == (IAD_DEVICE_CLASS, IAD_DEVICE_SUBCLASS, IAD_DEVICE_PROTOCOL);
    if !uses_iad && class.0 != PER_INTERFACE_CLASS {
        log::trace!("device class {:02x} can't be a video device", class.0);
        return Ok(None);
    }

    if device_desc.num_configurations() == 0 {
        log::debug!("device has no configurations");
        return Ok(None);
    }

    let config_desc = device
        .config_descriptor(0)
        .during(Action::AccessingDeviceDescriptor)?;
    let interfaces = video_interfaces(&config_desc);

    if uses_iad {
        // UVC uses an Interface Association Descriptor (IAD) and the corresponding device class.
        detect_from_iad(config_desc.extra(), &interfaces)
    } else {
        // Some cameras skip the IAD and only mark their interfaces.
        detect_from_interfaces(&interfaces)
    }
}

fn video_interfaces(config: &ConfigDescriptor) -> Vec<VideoInterface> {
    config
        .interfaces()
        .filter_map(|interface| {
            // Alternate settings share the class codes of the first one.
            let desc = interface.descriptors().next()?;
            Some(VideoInterface {
                number: interface.number(),
                class: desc.class_code(),
                subclass: desc.sub_class_code(),
            })
        })
        .collect()
}

fn detect_from_iad(extra: &[u8], interfaces: &[VideoInterface]) -> Result<Option<UvcInfo>> {
    let iad = split_descriptors(extra).find_map(|(desc_ty, data)| {
        if desc_ty != DESC_TYPE_IAD {
            return None;
        }
        match InterfaceAssociationDescriptor::read_from_prefix(data) {
            Some(desc) if is_video_function(&desc) => Some(desc),
            Some(desc) => {
                log::trace!("skipping non-video IAD {:?}", desc);
                None
            }
            None => {
                log::warn!("failed to parse IAD from {:x?}", data);
                None
            }
        }
    });

    let iad = match iad {
        Some(iad) => iad,
        None => {
            log::trace!("no video IAD, not a video device");
            return Ok(None);
        }
    };

    log::debug!("{:?}", iad);

    let first_interface = iad.bFirstInterface;
    let last_interface = first_interface.saturating_add(iad.bInterfaceCount.saturating_sub(1));
    let members = interfaces
        .iter()
        .filter(|intf| intf.number >= first_interface && intf.number <= last_interface)
        .copied()
        .collect::<Vec<_>>();

    for intf in &members {
        if intf.class != UVC_INTERF_CLASS {
            return err(
                format!(
                    "interface {} uses unexpected class code {}",
                    intf.number, intf.class
                ),
                Action::AccessingDeviceDescriptor,
            );
        }
    }

    let info = detect_from_interfaces(&members)?;
    if info.is_none() {
        return err(
            "device does not have a UVC control interface",
            Action::AccessingDeviceDescriptor,
        );
    }

    Ok(info.map(|info| UvcInfo {
        function_string: if iad.iFunction == 0 {
            None
        } else {
            Some(iad.iFunction)
        },
        ..info
    }))
}

fn detect_from_interfaces(interfaces: &[VideoInterface]) -> Result<Option<UvcInfo>> {
    let mut control_interface = None;
    let mut streaming_interfaces = Vec::new();
    for intf in interfaces.iter().filter(|i| i.class == UVC_INTERF_CLASS) {
        match intf.subclass {
            UVC_INTERF_SUBCLASS_CONTROL => {
                if control_interface.is_some() {
                    return err(
                        "device lists more than one control interface",
                        Action::AccessingDeviceDescriptor,
                    );
                }
                control_interface = Some(intf.number);
            }
            UVC_INTERF_SUBCLASS_STREAMING => streaming_interfaces.push(intf.number),
            e => {
                log::warn!(
                    "interface {} uses unexpected subclass code {}, ignoring it",
                    intf.number,
                    e
                );
            }
        }
    }

    Ok(control_interface.map(|control_interface| UvcInfo {
        control_interface,
        streaming_interfaces,
        function_string: None,
    }))
}

fn is_video_function(iad: &InterfaceAssociationDescriptor) -> bool {
    iad.bFunctionClass == UVC_IAD_CLASS
        && iad.bFunctionSubClass == UVC_IAD_SUBCLASS
        && iad.bFunctionProtocol == UVC_IAD_PROTOCOL
}
