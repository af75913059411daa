//! Wire types for the Docker volume-plugin protocol.
//!
//! All verbs are POSTs with JSON bodies; failures travel in-band in the
//! `Err` field with an HTTP 200.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Request body shared by the volume verbs. `Opts` appears on create,
/// `ID` on mount/unmount; both are accepted and currently unused.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeRequest {
    pub name: String,
    #[serde(default)]
    pub opts: Option<HashMap<String, String>>,
    #[serde(default, rename = "ID")]
    pub id: Option<String>,
}

/// Answer to `/Plugin.Activate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    pub implements: Vec<&'static str>,
}

impl ActivateResponse {
    pub fn volume_driver() -> Self {
        Self {
            implements: vec!["VolumeDriver"],
        }
    }
}

/// Answer for verbs that only report success or failure.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SimpleResponse {
    pub err: String,
}

impl SimpleResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            err: message.into(),
        }
    }
}

/// Answer to `Mount` and `Path`.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathResponse {
    pub mountpoint: String,
    pub err: String,
}

/// A volume as reported by `Get` and `List`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    pub name: String,
    pub mountpoint: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
    pub err: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    pub volumes: Vec<Volume>,
    pub err: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    pub capabilities: Capability,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Capability {
    pub scope: &'static str,
}

impl CapabilitiesResponse {
    pub fn local() -> Self {
        Self {
            capabilities: Capability { scope: "local" },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_accepts_docker_field_names() {
        let req: VolumeRequest = serde_json::from_value(json!({
            "Name": "secret",
            "Opts": {"root": "secret"},
            "ID": "abc123"
        }))
        .unwrap();
        assert_eq!(req.name, "secret");
        assert_eq!(req.opts.unwrap()["root"], "secret");
        assert_eq!(req.id.as_deref(), Some("abc123"));
    }

    #[test]
    fn request_tolerates_minimal_body() {
        let req: VolumeRequest = serde_json::from_value(json!({"Name": "v"})).unwrap();
        assert_eq!(req.name, "v");
        assert!(req.opts.is_none());
        assert!(req.id.is_none());
    }

    #[test]
    fn responses_use_wire_field_names() {
        let body = serde_json::to_value(PathResponse {
            mountpoint: "/var/lib/vaultfs/secret".to_string(),
            err: String::new(),
        })
        .unwrap();
        assert_eq!(body["Mountpoint"], "/var/lib/vaultfs/secret");
        assert_eq!(body["Err"], "");

        let body = serde_json::to_value(ActivateResponse::volume_driver()).unwrap();
        assert_eq!(body["Implements"][0], "VolumeDriver");

        let body = serde_json::to_value(CapabilitiesResponse::local()).unwrap();
        assert_eq!(body["Capabilities"]["Scope"], "local");
    }

    #[test]
    fn absent_volume_is_omitted_from_get() {
        let body = serde_json::to_value(GetResponse {
            volume: None,
            err: "no such volume: v".to_string(),
        })
        .unwrap();
        assert!(body.get("Volume").is_none());
        assert_eq!(body["Err"], "no such volume: v");
    }
}
