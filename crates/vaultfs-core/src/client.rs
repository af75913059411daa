//! Thin HTTP client for the store's logical API.
//!
//! Connection material comes from the standard `VAULT_*` environment
//! variables. The client retries 5xx responses and transport failures with
//! exponential backoff; everything else is returned to the caller as a
//! [`ClientError`] for the backend to classify.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Certificate, Identity, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::ClientError;
use crate::secret::Secret;

const TOKEN_HEADER: &str = "X-Vault-Token";

/// Connection configuration, normally read from the environment.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Store address as a URL, e.g. `https://127.0.0.1:8200`.
    pub address: String,
    /// PEM-encoded CA certificate file.
    pub ca_cert: Option<PathBuf>,
    /// Directory of PEM-encoded CA certificate files. `ca_cert` takes
    /// precedence when both are set.
    pub ca_path: Option<PathBuf>,
    /// PEM-encoded client certificate for TLS authentication.
    pub client_cert: Option<PathBuf>,
    /// PEM-encoded private key matching `client_cert`.
    pub client_key: Option<PathBuf>,
    /// Extra attempts after a 5xx or transport failure.
    pub max_retries: u32,
    /// Skip verification of the server certificate.
    pub skip_verify: bool,
    /// SNI host to present when connecting via TLS.
    pub tls_server_name: Option<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "https://127.0.0.1:8200".to_string(),
            ca_cert: None,
            ca_path: None,
            client_cert: None,
            client_key: None,
            max_retries: 2,
            skip_verify: false,
            tls_server_name: None,
        }
    }
}

impl VaultConfig {
    /// Read the standard `VAULT_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            address: env_var("VAULT_ADDR").unwrap_or(defaults.address),
            ca_cert: env_var("VAULT_CACERT").map(PathBuf::from),
            ca_path: env_var("VAULT_CAPATH").map(PathBuf::from),
            client_cert: env_var("VAULT_CLIENT_CERT").map(PathBuf::from),
            client_key: env_var("VAULT_CLIENT_KEY").map(PathBuf::from),
            max_retries: env_var("VAULT_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            skip_verify: env_var("VAULT_SKIP_VERIFY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            tls_server_name: env_var("VAULT_TLS_SERVER_NAME"),
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Client for the logical API.
///
/// Cheap to share behind an `Arc`; the only mutable state is the current
/// token, which the backend sets after authenticating.
pub struct VaultClient {
    http: reqwest::Client,
    /// Base URL ending in `/v1/`.
    base: Url,
    token: Mutex<Option<String>>,
    max_retries: u32,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("base", &self.base.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

impl VaultClient {
    pub fn new(config: &VaultConfig) -> Result<Self, ClientError> {
        let mut url = Url::parse(&config.address)
            .map_err(|e| ClientError::Config(format!("invalid VAULT_ADDR {:?}: {e}", config.address)))?;

        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(60));

        if config.skip_verify {
            warn!("TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        for pem in ca_certificates(config)? {
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
        }

        if let (Some(cert), Some(key)) = (&config.client_cert, &config.client_key) {
            let mut pem = read_pem(cert)?;
            pem.extend(read_pem(key)?);
            builder = builder.identity(Identity::from_pem(&pem)?);
        }

        // SNI override: only meaningful when the address is an IP. We pin
        // the server name to that IP and address requests to the name, so
        // both SNI and certificate verification use it.
        if let Some(name) = &config.tls_server_name {
            let port = url.port_or_known_default().unwrap_or(8200);
            let ip = match url.host() {
                Some(url::Host::Ipv4(ip)) => Some(std::net::IpAddr::from(ip)),
                Some(url::Host::Ipv6(ip)) => Some(std::net::IpAddr::from(ip)),
                _ => None,
            };
            match ip {
                Some(ip) => {
                    builder = builder.resolve(name, SocketAddr::new(ip, port));
                    url.set_host(Some(name.as_str())).map_err(|e| {
                        ClientError::Config(format!("invalid VAULT_TLS_SERVER_NAME {name:?}: {e}"))
                    })?;
                }
                None => warn!(
                    server_name = %name,
                    "VAULT_TLS_SERVER_NAME requires an IP address in VAULT_ADDR, ignoring"
                ),
            }
        }

        let base = url
            .join("v1/")
            .map_err(|e| ClientError::Config(format!("cannot derive API base URL: {e}")))?;

        Ok(Self {
            http: builder.build()?,
            base,
            token: Mutex::new(None),
            max_retries: config.max_retries,
        })
    }

    /// Set the token sent with subsequent requests.
    pub fn set_token(&self, token: &str) {
        let mut slot = self.token.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(token.to_string());
    }

    fn current_token(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// `GET /v1/<path>`. `Ok(None)` means confirmed absent.
    pub async fn read(&self, path: &str) -> Result<Option<Secret>, ClientError> {
        self.request(Method::GET, path, &[], None, None).await
    }

    /// `GET /v1/<path>?list=true`. `Ok(None)` means nothing listable there.
    pub async fn list(&self, path: &str) -> Result<Option<Secret>, ClientError> {
        self.request(Method::GET, path, &[("list", "true")], None, None)
            .await
    }

    /// `PUT /v1/<path>`. A `204 No Content` answer yields `Ok(None)`.
    pub async fn write(
        &self,
        path: &str,
        data: Option<&Value>,
    ) -> Result<Option<Secret>, ClientError> {
        self.request(Method::PUT, path, &[], data, None).await
    }

    /// `DELETE /v1/<path>`.
    pub async fn delete(&self, path: &str) -> Result<Option<Secret>, ClientError> {
        self.request(Method::DELETE, path, &[], None, None).await
    }

    /// `PUT /v1/sys/wrapping/unwrap`, authenticated with the wrapping token
    /// itself.
    pub async fn unwrap(&self, wrapping_token: &str) -> Result<Option<Secret>, ClientError> {
        self.request(
            Method::PUT,
            "sys/wrapping/unwrap",
            &[],
            None,
            Some(wrapping_token),
        )
        .await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        token_override: Option<&str>,
    ) -> Result<Option<Secret>, ClientError> {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Config(format!("invalid path {path:?}: {e}")))?;

        let token = token_override
            .map(str::to_string)
            .or_else(|| self.current_token());

        let mut last_err = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
                debug!(%url, attempt, "retrying request");
            }

            let mut req = self.http.request(method.clone(), url.clone());
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(token) = &token {
                req = req.header(TOKEN_HEADER, token);
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            let resp = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_err = Some(ClientError::Http(e));
                    continue;
                }
            };

            let status = resp.status();
            if status.is_server_error() {
                last_err = Some(ClientError::Api {
                    status: status.as_u16(),
                    errors: error_messages(resp).await,
                });
                continue;
            }
            match status {
                StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => return Ok(None),
                s if s.is_success() => return Ok(Some(resp.json::<Secret>().await?)),
                s => {
                    return Err(ClientError::Api {
                        status: s.as_u16(),
                        errors: error_messages(resp).await,
                    })
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ClientError::Config("retries exhausted".to_string())))
    }
}

fn backoff(attempt: u32) -> Duration {
    let millis = 250u64.saturating_mul(1u64 << attempt.min(4));
    Duration::from_millis(millis.min(2_000))
}

/// Error bodies look like `{"errors": ["permission denied"]}`.
#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

async fn error_messages(resp: reqwest::Response) -> Vec<String> {
    match resp.json::<ErrorResponse>().await {
        Ok(body) => body.errors,
        Err(_) => Vec::new(),
    }
}

fn ca_certificates(config: &VaultConfig) -> Result<Vec<Vec<u8>>, ClientError> {
    if let Some(path) = &config.ca_cert {
        return Ok(vec![read_pem(path)?]);
    }
    let Some(dir) = &config.ca_path else {
        return Ok(Vec::new());
    };
    let entries = fs::read_dir(dir)
        .map_err(|e| ClientError::Config(format!("cannot read VAULT_CAPATH {}: {e}", dir.display())))?;
    let mut pems = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| ClientError::Config(format!("cannot read VAULT_CAPATH entry: {e}")))?;
        if entry.path().is_file() {
            pems.push(read_pem(&entry.path())?);
        }
    }
    Ok(pems)
}

fn read_pem(path: &std::path::Path) -> Result<Vec<u8>, ClientError> {
    fs::read(path).map_err(|e| ClientError::Config(format!("cannot read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_env() {
        std::env::set_var("VAULT_ADDR", "https://vault.example.com:8200");
        std::env::set_var("VAULT_MAX_RETRIES", "5");
        std::env::set_var("VAULT_SKIP_VERIFY", "true");
        std::env::set_var("VAULT_TLS_SERVER_NAME", "vault.internal");

        let config = VaultConfig::from_env();
        assert_eq!(config.address, "https://vault.example.com:8200");
        assert_eq!(config.max_retries, 5);
        assert!(config.skip_verify);
        assert_eq!(config.tls_server_name.as_deref(), Some("vault.internal"));

        std::env::remove_var("VAULT_ADDR");
        std::env::remove_var("VAULT_MAX_RETRIES");
        std::env::remove_var("VAULT_SKIP_VERIFY");
        std::env::remove_var("VAULT_TLS_SERVER_NAME");
    }

    #[test]
    fn base_url_carries_api_version() {
        let client = VaultClient::new(&VaultConfig {
            address: "http://127.0.0.1:8200".to_string(),
            tls_server_name: None,
            ..VaultConfig::default()
        })
        .unwrap();
        assert_eq!(client.base.as_str(), "http://127.0.0.1:8200/v1/");
    }

    #[test]
    fn backoff_is_bounded() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_millis(1_000));
        assert_eq!(backoff(10), Duration::from_millis(2_000));
    }

    #[test]
    fn rejects_bad_address() {
        let result = VaultClient::new(&VaultConfig {
            address: "not a url".to_string(),
            ..VaultConfig::default()
        });
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
