//! Messages exchanged between the shell's host side and its view.

use serde::{Deserialize, Serialize};

use crate::{error::*, CameraDevice, Result};

/// Serializes a camera list as a JSON array.
pub fn to_json(cameras: &[CameraDevice]) -> Result<String> {
    serde_json::to_string_pretty(cameras).during(Action::Serializing)
}

/// Answer to a camera list request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub success: bool,
    pub cameras: Vec<CameraDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Vec<CameraDevice>>> for ListResponse {
    fn from(result: Result<Vec<CameraDevice>>) -> Self {
        match result {
            Ok(cameras) => Self {
                success: true,
                cameras,
                error: None,
            },
            Err(e) => Self {
                success: false,
                cameras: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Notifications from the host to the view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostEvent {
    RefreshRequested,
    CameraSelected { camera: CameraDevice },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_list_json() {
        assert_eq!(to_json(&[]).unwrap(), "[]");

        let json = to_json(&[CameraDevice::new("Cam", 0x46d, 0x82d, 2)]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "name": "Cam",
                "vendor": 1133,
                "product": 2093,
                "address": 2,
                "vendorHex": "0x046d",
                "productHex": "0x082d",
            }])
        );
    }

    #[test]
    fn successful_list_response() {
        let resp = ListResponse::from(Ok(vec![CameraDevice::new("Cam", 1, 2, 3)]));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["cameras"][0]["vendorHex"], "0x0001");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failed_list_response_carries_rewritten_message() {
        let e = Error::with_action(rusb::Error::Access, Action::EnumeratingDevices)
            .rewrite_discovery();
        let resp = ListResponse::from(Err(e));
        assert!(!resp.success);
        assert!(resp.cameras.is_empty());
        assert!(resp.error.unwrap().contains("elevated privileges"));
    }

    #[test]
    fn host_events_are_tagged() {
        let json = serde_json::to_string(&HostEvent::RefreshRequested).unwrap();
        assert_eq!(json, r#"{"type":"refresh-requested"}"#);

        let event: HostEvent = serde_json::from_str(
            r#"{"type":"camera-selected","camera":{"name":"Cam B","vendor":4057,"product":120,"address":0,"deviceId":"/dev/video2"}}"#,
        )
        .unwrap();
        match event {
            HostEvent::CameraSelected { camera } => {
                assert_eq!(camera.vendor_hex(), "0x0fd9");
                assert_eq!(camera.device_id(), Some("/dev/video2"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
