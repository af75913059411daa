//! The secret response envelope.
//!
//! Every logical-API call that returns a body returns this shape: lease
//! metadata, an arbitrary `data` payload, and the optional auth and wrapping
//! envelopes. List responses reuse it with the child names in
//! `data["keys"]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// A single response from the secret store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub lease_id: String,
    /// Lease validity in seconds.
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    /// Arbitrary payload. For list responses, `data["keys"]` names the
    /// children.
    #[serde(default, deserialize_with = "null_default")]
    pub data: Map<String, Value>,
    #[serde(default, deserialize_with = "null_default")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub auth: Option<SecretAuth>,
    #[serde(default)]
    pub wrap_info: Option<WrapInfo>,
}

/// Authentication envelope returned by login endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretAuth {
    #[serde(default)]
    pub client_token: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default, deserialize_with = "null_default")]
    pub policies: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

/// Response-wrapping envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WrapInfo {
    #[serde(default)]
    pub token: String,
    /// Wrapping token validity in seconds.
    #[serde(default)]
    pub ttl: u64,
    /// Creation timestamp, kept as the server rendered it.
    #[serde(default)]
    pub creation_time: String,
    #[serde(default)]
    pub wrapped_accessor: String,
}

/// The wire encodes "no value" for collection fields as an explicit `null`.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_read_response() {
        let secret: Secret = serde_json::from_str(
            r#"{
                "request_id": "b6f14d6a-5f55-0c62-d447-4a5a36b0bb66",
                "lease_id": "database/creds/readonly/abc123",
                "lease_duration": 3600,
                "renewable": true,
                "data": {"user": "alice", "pass": "s3cret"},
                "warnings": null,
                "auth": null,
                "wrap_info": null
            }"#,
        )
        .unwrap();

        assert_eq!(secret.lease_id, "database/creds/readonly/abc123");
        assert_eq!(secret.lease_duration, 3600);
        assert!(secret.renewable);
        assert_eq!(secret.data["user"], "alice");
        assert!(secret.warnings.is_empty());
        assert!(secret.auth.is_none());
        assert!(secret.wrap_info.is_none());
    }

    #[test]
    fn parses_list_response() {
        let secret: Secret = serde_json::from_str(
            r#"{"data": {"keys": ["db/", "cache"]}, "lease_duration": 0}"#,
        )
        .unwrap();

        let keys = secret.data["keys"].as_array().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], "db/");
    }

    #[test]
    fn parses_login_response() {
        let secret: Secret = serde_json::from_str(
            r#"{
                "lease_id": "",
                "data": null,
                "auth": {
                    "client_token": "hvs.example",
                    "accessor": "acc",
                    "policies": ["default", "readers"],
                    "metadata": {"username": "alice"},
                    "lease_duration": 7200,
                    "renewable": true
                }
            }"#,
        )
        .unwrap();

        let auth = secret.auth.unwrap();
        assert_eq!(auth.client_token, "hvs.example");
        assert_eq!(auth.policies, vec!["default", "readers"]);
        assert_eq!(auth.metadata["username"], "alice");
        assert!(secret.data.is_empty());
    }

    #[test]
    fn missing_fields_default() {
        let secret: Secret = serde_json::from_str("{}").unwrap();
        assert_eq!(secret.lease_id, "");
        assert_eq!(secret.lease_duration, 0);
        assert!(!secret.renewable);
        assert!(secret.data.is_empty());
        assert!(secret.warnings.is_empty());
    }
}
