//! Error taxonomy for the secret-store layers.
//!
//! [`ClientError`] is what the raw HTTP client produces.
//! [`BackendError`] is the closed set the authenticated backend hands to the
//! filesystem: authentication conditions under [`BackendError::Auth`], and
//! everything transport-shaped under [`BackendError::VaultInaccessible`].
//! Upstream classifiers match on variants; the original cause stays
//! reachable through `source()`.

use thiserror::Error;

/// Error from the raw store client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The store answered with a non-success status.
    #[error("vault returned status {status}: {}", .errors.join("; "))]
    Api { status: u16, errors: Vec<String> },

    /// The request never produced a usable response.
    #[error("http transport error")]
    Http(#[from] reqwest::Error),

    /// The client could not be built or the path was unusable.
    #[error("client configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Status code for API errors, `None` for transport/config failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Authentication-layer conditions.
#[derive(Debug, Error)]
pub enum AuthError {
    /// An explicit login attempt did not produce a token.
    #[error("authentication attempt failed")]
    AuthFailed(#[source] Option<ClientError>),

    /// The store refused a specific request with a 403-equivalent.
    #[error("permission denied")]
    PermissionDenied(#[source] ClientError),

    /// The store reported that no client token accompanied the request.
    #[error("missing client token")]
    MissingClientToken(#[source] ClientError),
}

/// What the authenticated backend returns to its callers.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Umbrella for any auth-layer condition.
    #[error("authentication error")]
    Auth(#[from] AuthError),

    /// The store itself is unreachable or misbehaving: network failure,
    /// 5xx, malformed response.
    #[error("vault inaccessible")]
    VaultInaccessible(#[source] ClientError),
}

impl BackendError {
    /// True for errors that cannot be recovered by trying a different
    /// operation on the same path. Permission problems are not fatal: the
    /// caller may still list where it cannot read, or traverse deeper.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BackendError::VaultInaccessible(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_joins_messages() {
        let err = ClientError::Api {
            status: 403,
            errors: vec!["permission denied".into(), "see policy".into()],
        };
        assert_eq!(
            err.to_string(),
            "vault returned status 403: permission denied; see policy"
        );
    }

    #[test]
    fn only_inaccessible_is_fatal() {
        let fatal = BackendError::VaultInaccessible(ClientError::Api {
            status: 502,
            errors: vec![],
        });
        assert!(fatal.is_fatal());

        let denied = BackendError::Auth(AuthError::PermissionDenied(ClientError::Api {
            status: 403,
            errors: vec!["permission denied".into()],
        }));
        assert!(!denied.is_fatal());

        let failed = BackendError::Auth(AuthError::AuthFailed(None));
        assert!(!failed.is_fatal());
    }

    #[test]
    fn inner_cause_stays_reachable() {
        use std::error::Error as _;

        let err = BackendError::Auth(AuthError::PermissionDenied(ClientError::Api {
            status: 403,
            errors: vec!["permission denied".into()],
        }));
        let auth = err.source().unwrap();
        assert_eq!(auth.to_string(), "permission denied");
        let client = auth.source().unwrap();
        assert!(client.to_string().contains("403"));
    }
}
