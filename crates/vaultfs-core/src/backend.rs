//! The authenticated backend.
//!
//! [`VaultBackend`] wraps the raw [`VaultClient`] with token management:
//! every logical operation ensures a token is held (authenticating through
//! the configured [`AuthMethod`] if not) and normalizes client errors into
//! the [`BackendError`] taxonomy via [`narrow`]. Filesystem nodes depend on
//! the [`Logical`] trait, not the concrete backend, so tests can script
//! responses.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::VaultClient;
use crate::error::{AuthError, BackendError, ClientError};
use crate::secret::Secret;

/// The store's logical API, as the filesystem consumes it.
///
/// `Ok(None)` is confirmed absence; errors carry the failure taxonomy.
#[async_trait]
pub trait Logical: Send + Sync {
    async fn read(&self, path: &str) -> Result<Option<Secret>, BackendError>;
    async fn list(&self, path: &str) -> Result<Option<Secret>, BackendError>;
    async fn write(&self, path: &str, data: Option<&Value>)
        -> Result<Option<Secret>, BackendError>;
    async fn delete(&self, path: &str) -> Result<Option<Secret>, BackendError>;
    async fn unwrap_token(&self, wrapping_token: &str) -> Result<Option<Secret>, BackendError>;
}

/// How the backend obtains a token when none was supplied.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// TLS client-certificate login; the certificate is already part of the
    /// client connection, so the login carries no payload.
    Cert,
    /// Directory-service login against the username-parameterized endpoint.
    Ldap { username: String, password: String },
    /// Role-based login.
    AppRole { role_id: String, secret_id: String },
}

impl AuthMethod {
    /// Login endpoint and payload for this method.
    fn login_request(&self) -> (String, Option<Value>) {
        match self {
            AuthMethod::Cert => ("auth/cert/login".to_string(), None),
            AuthMethod::Ldap { username, password } => (
                format!("auth/ldap/login/{username}"),
                Some(json!({ "password": password })),
            ),
            AuthMethod::AppRole { role_id, secret_id } => (
                "auth/approle/login".to_string(),
                Some(json!({ "role_id": role_id, "secret_id": secret_id })),
            ),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AuthMethod::Cert => "cert",
            AuthMethod::Ldap { .. } => "ldap",
            AuthMethod::AppRole { .. } => "approle",
        }
    }
}

/// Authenticated wrapper around the store client.
pub struct VaultBackend {
    client: VaultClient,
    /// Current token. The async mutex serializes first-time authentication:
    /// one login flight per backend, late arrivals reuse the stored token.
    token: Mutex<Option<String>>,
    auth_method: AuthMethod,
}

impl std::fmt::Debug for VaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultBackend")
            .field("client", &self.client)
            .field("auth_method", &self.auth_method.name())
            .finish()
    }
}

impl VaultBackend {
    /// Wrap `client`. A supplied token is used as-is; otherwise the first
    /// operation (or an explicit [`auth`](Self::auth) call) logs in through
    /// `auth_method`.
    pub fn new(client: VaultClient, token: Option<String>, auth_method: AuthMethod) -> Self {
        Self {
            client,
            token: Mutex::new(token.filter(|t| !t.is_empty())),
            auth_method,
        }
    }

    /// Ensure a token is held and set on the client.
    ///
    /// With a held token this is cheap. Without one it performs the login
    /// for the configured method and adopts the returned client token.
    pub async fn auth(&self) -> Result<(), BackendError> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_deref() {
            self.client.set_token(token);
            return Ok(());
        }

        debug!(method = self.auth_method.name(), "authenticating");
        let (path, payload) = self.auth_method.login_request();
        let secret = self
            .client
            .write(&path, payload.as_ref())
            .await
            .map_err(|e| BackendError::Auth(AuthError::AuthFailed(Some(e))))?;
        let token = secret
            .and_then(|s| s.auth)
            .map(|a| a.client_token)
            .filter(|t| !t.is_empty())
            .ok_or(BackendError::Auth(AuthError::AuthFailed(None)))?;

        self.client.set_token(&token);
        *slot = Some(token);
        Ok(())
    }
}

#[async_trait]
impl Logical for VaultBackend {
    async fn read(&self, path: &str) -> Result<Option<Secret>, BackendError> {
        self.auth().await?;
        self.client.read(path).await.map_err(narrow)
    }

    async fn list(&self, path: &str) -> Result<Option<Secret>, BackendError> {
        self.auth().await?;
        self.client.list(path).await.map_err(narrow)
    }

    async fn write(
        &self,
        path: &str,
        data: Option<&Value>,
    ) -> Result<Option<Secret>, BackendError> {
        self.auth().await?;
        self.client.write(path, data).await.map_err(narrow)
    }

    async fn delete(&self, path: &str) -> Result<Option<Secret>, BackendError> {
        self.auth().await?;
        self.client.delete(path).await.map_err(narrow)
    }

    async fn unwrap_token(&self, wrapping_token: &str) -> Result<Option<Secret>, BackendError> {
        self.auth().await?;
        self.client.unwrap(wrapping_token).await.map_err(narrow)
    }
}

/// Classify a client error into the backend taxonomy.
///
/// API errors are matched on the store's typed error list (status 403 plus
/// its message); anything else, including 5xx and transport failures, means
/// the store is not usable and maps to `VaultInaccessible`. This runs once,
/// at the client boundary; callers classify the result by variant.
fn narrow(err: ClientError) -> BackendError {
    if let ClientError::Api { status, errors } = &err {
        if errors.iter().any(|m| m.contains("permission denied")) {
            return BackendError::Auth(AuthError::PermissionDenied(err));
        }
        if errors.iter().any(|m| m.contains("missing client token")) {
            return BackendError::Auth(AuthError::MissingClientToken(err));
        }
        if *status == 403 {
            return BackendError::Auth(AuthError::PermissionDenied(err));
        }
    }
    BackendError::VaultInaccessible(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, message: &str) -> ClientError {
        ClientError::Api {
            status,
            errors: if message.is_empty() {
                vec![]
            } else {
                vec![message.to_string()]
            },
        }
    }

    #[test]
    fn narrow_classifies_permission_denied() {
        let narrowed = narrow(api_error(403, "1 error occurred: * permission denied"));
        assert!(matches!(
            narrowed,
            BackendError::Auth(AuthError::PermissionDenied(_))
        ));
    }

    #[test]
    fn narrow_classifies_missing_client_token() {
        let narrowed = narrow(api_error(400, "1 error occurred: * missing client token"));
        assert!(matches!(
            narrowed,
            BackendError::Auth(AuthError::MissingClientToken(_))
        ));
    }

    #[test]
    fn narrow_treats_bare_403_as_permission_denied() {
        let narrowed = narrow(api_error(403, ""));
        assert!(matches!(
            narrowed,
            BackendError::Auth(AuthError::PermissionDenied(_))
        ));
    }

    #[test]
    fn narrow_treats_everything_else_as_inaccessible() {
        for err in [
            api_error(500, "internal error"),
            api_error(502, ""),
            ClientError::Config("retries exhausted".to_string()),
        ] {
            assert!(matches!(narrow(err), BackendError::VaultInaccessible(_)));
        }
    }

    #[test]
    fn login_requests_per_method() {
        let (path, payload) = AuthMethod::Cert.login_request();
        assert_eq!(path, "auth/cert/login");
        assert!(payload.is_none());

        let (path, payload) = AuthMethod::Ldap {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        }
        .login_request();
        assert_eq!(path, "auth/ldap/login/alice");
        assert_eq!(payload.unwrap()["password"], "hunter2");

        let (path, payload) = AuthMethod::AppRole {
            role_id: "role".to_string(),
            secret_id: "secret".to_string(),
        }
        .login_request();
        assert_eq!(path, "auth/approle/login");
        let payload = payload.unwrap();
        assert_eq!(payload["role_id"], "role");
        assert_eq!(payload["secret_id"], "secret");
    }

    #[test]
    fn empty_supplied_token_is_treated_as_absent() {
        let client = VaultClient::new(&crate::client::VaultConfig::default()).unwrap();
        let backend = VaultBackend::new(client, Some(String::new()), AuthMethod::Cert);
        let slot = backend.token.try_lock().unwrap();
        assert!(slot.is_none());
    }
}
