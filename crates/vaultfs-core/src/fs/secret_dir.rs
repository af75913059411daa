//! The node type backing every remote path.
//!
//! Everything in the mounted tree below the root maps to a `SecretDir`;
//! each kernel operation probes the store to find out what the path
//! currently is (directory-like, secret-like, denied, absent, or
//! unreachable) and behaves accordingly. Various lookups produce either a
//! child `SecretDir` or a materialized static subtree.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::backend::Logical;
use crate::secret::Secret;

use super::error::{FsError, FsResult};
use super::static_dir::StaticDir;
use super::static_value::StaticValue;
use super::types::{DirEntry, FileAttr, FileType};
use super::Node;

/// What a probe observed at a lookup path.
///
/// Never cached: the store's contents and the caller's authorization can
/// change between kernel calls, so every operation re-probes.
#[derive(Debug)]
pub enum SecretState {
    /// The store itself is unreachable; the request must fail.
    BackendError,
    /// Confirmed absent.
    NonExistent,
    /// Present-or-absent but unauthorized. Modeled as an empty traversable
    /// directory so explicitly authorized subtrees below stay reachable.
    Inaccessible,
    /// Listable; children are the listed keys.
    Directory(Secret),
    /// Readable; materializes as the fixed field subtree.
    Secret(Secret),
}

/// The fixed subtree every readable secret explodes into.
const SECRET_FIELDS: [(&str, FileType); 7] = [
    ("lease_id", FileType::File),
    ("lease_duration", FileType::File),
    ("renewable", FileType::File),
    ("data", FileType::Directory),
    ("warnings", FileType::File),
    ("auth", FileType::Directory),
    ("wrap_info", FileType::Directory),
];

/// Directory node for a remote lookup path.
#[derive(Clone)]
pub struct SecretDir {
    backend: Arc<dyn Logical>,
    lookup_path: String,
}

impl std::fmt::Debug for SecretDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretDir")
            .field("lookup_path", &self.lookup_path)
            .finish()
    }
}

impl SecretDir {
    /// Node for `lookup_path`, which must be non-empty.
    pub fn new(backend: Arc<dyn Logical>, lookup_path: impl Into<String>) -> FsResult<Self> {
        let lookup_path = lookup_path.into();
        if lookup_path.is_empty() {
            return Err(FsError::InvalidValue(
                "secret directory requires a non-empty lookup path".to_string(),
            ));
        }
        Ok(Self {
            backend,
            lookup_path,
        })
    }

    pub fn lookup_path(&self) -> &str {
        &self.lookup_path
    }

    /// Probe the store to classify this path.
    ///
    /// A read is tried first; a populated answer wins. Denied or absent
    /// reads fall through to a list probe, because policies may forbid
    /// reads but allow lists (or neither) at any node. Only a transport
    /// fault stops the sequence.
    pub async fn classify(&self) -> SecretState {
        match self.backend.read(&self.lookup_path).await {
            Ok(Some(secret)) => {
                debug!(path = %self.lookup_path, "read succeeded, secret-like");
                return SecretState::Secret(secret);
            }
            Ok(None) => {}
            Err(err) if err.is_fatal() => {
                error!(path = %self.lookup_path, error = %err, "backend inaccessible");
                return SecretState::BackendError;
            }
            Err(err) => {
                debug!(path = %self.lookup_path, error = %err, "read denied, trying list");
            }
        }

        match self.backend.list(&self.lookup_path).await {
            Ok(Some(secret)) => {
                debug!(path = %self.lookup_path, "list succeeded, directory-like");
                SecretState::Directory(secret)
            }
            Ok(None) => SecretState::NonExistent,
            Err(err) if err.is_fatal() => {
                error!(path = %self.lookup_path, error = %err, "backend inaccessible");
                SecretState::BackendError
            }
            Err(err) => {
                info!(
                    path = %self.lookup_path,
                    error = %err,
                    "denied, treating as empty traversable directory"
                );
                SecretState::Inaccessible
            }
        }
    }

    /// Attributes depend on the probed state: reachable paths are `0o555`
    /// directories, denied paths are traverse-only (`0o111`).
    pub async fn attr(&self) -> FsResult<FileAttr> {
        match self.classify().await {
            SecretState::BackendError => Err(FsError::BackendUnavailable),
            SecretState::NonExistent => Err(FsError::not_found(&self.lookup_path)),
            SecretState::Inaccessible => Ok(FileAttr::directory(0o111)),
            SecretState::Directory(_) | SecretState::Secret(_) => Ok(FileAttr::directory(0o555)),
        }
    }

    /// Resolve a child.
    ///
    /// A path we cannot access due to permissions always yields an
    /// unpopulated child node, which allows traversing further down the
    /// tree; a path we can access and confirm absent is not-found.
    pub async fn lookup(&self, name: &str) -> FsResult<Node> {
        let child_path = join_path(&self.lookup_path, name);
        match self.classify().await {
            SecretState::BackendError => Err(FsError::BackendUnavailable),
            SecretState::NonExistent => Err(FsError::not_found(&self.lookup_path)),
            SecretState::Inaccessible => {
                // A directory we assume exists; descend without probing.
                Ok(Node::Secret(SecretDir::new(
                    Arc::clone(&self.backend),
                    child_path,
                )?))
            }
            SecretState::Directory(_) => {
                let child = SecretDir::new(Arc::clone(&self.backend), child_path)?;
                match child.classify().await {
                    SecretState::BackendError => Err(FsError::BackendUnavailable),
                    SecretState::NonExistent => Err(FsError::not_found(child.lookup_path())),
                    // A secret-like child still presents as a directory
                    // here; it materializes its fields one level down.
                    SecretState::Inaccessible
                    | SecretState::Directory(_)
                    | SecretState::Secret(_) => Ok(Node::Secret(child)),
                }
            }
            SecretState::Secret(secret) => self.lookup_secret_field(&secret, name),
        }
    }

    /// List children according to the probed state.
    pub async fn read_dir_all(&self) -> FsResult<Vec<DirEntry>> {
        match self.classify().await {
            SecretState::BackendError => Err(FsError::BackendUnavailable),
            SecretState::NonExistent => Err(FsError::not_found(&self.lookup_path)),
            SecretState::Inaccessible => Ok(Vec::new()),
            SecretState::Directory(secret) => Ok(self.key_entries(&secret)),
            SecretState::Secret(_) => Ok(SECRET_FIELDS
                .iter()
                .map(|(name, kind)| DirEntry::new(*name, *kind))
                .collect()),
        }
    }

    /// Resolve one of the fixed field names of a readable secret.
    fn lookup_secret_field(&self, secret: &Secret, name: &str) -> FsResult<Node> {
        match name {
            "lease_id" => Ok(Node::Value(StaticValue::new(secret.lease_id.clone()))),
            "lease_duration" => Ok(Node::Value(StaticValue::new(
                secret.lease_duration.to_string(),
            ))),
            "renewable" => Ok(Node::Value(StaticValue::new(secret.renewable.to_string()))),
            "warnings" => Ok(Node::Value(StaticValue::new(secret.warnings.join("\n")))),
            "data" => {
                let mut tree = Map::new();
                for (key, value) in &secret.data {
                    match value {
                        Value::String(s) => {
                            tree.insert(key.clone(), Value::String(s.clone()));
                        }
                        other => error!(
                            path = %self.lookup_path,
                            field = %key,
                            "non-string value in secret data, omitting: {}",
                            other
                        ),
                    }
                }
                Ok(Node::Dir(StaticDir::new(&tree)?))
            }
            "auth" => {
                let Some(auth) = &secret.auth else {
                    return Ok(Node::Dir(StaticDir::empty()));
                };
                let mut tree = Map::new();
                tree.insert(
                    "client_token".to_string(),
                    Value::String(auth.client_token.clone()),
                );
                tree.insert("accessor".to_string(), Value::String(auth.accessor.clone()));
                tree.insert(
                    "policies".to_string(),
                    Value::String(auth.policies.join("\n")),
                );
                let metadata: Map<String, Value> = auth
                    .metadata
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                tree.insert("metadata".to_string(), Value::Object(metadata));
                tree.insert(
                    "lease_duration".to_string(),
                    Value::String(auth.lease_duration.to_string()),
                );
                tree.insert(
                    "renewable".to_string(),
                    Value::String(auth.renewable.to_string()),
                );
                Ok(Node::Dir(StaticDir::new(&tree)?))
            }
            "wrap_info" => {
                let Some(wrap) = &secret.wrap_info else {
                    return Ok(Node::Dir(StaticDir::empty()));
                };
                let mut tree = Map::new();
                tree.insert("token".to_string(), Value::String(wrap.token.clone()));
                tree.insert("ttl".to_string(), Value::String(wrap.ttl.to_string()));
                tree.insert(
                    "creation_time".to_string(),
                    Value::String(wrap.creation_time.clone()),
                );
                tree.insert(
                    "wrapped_accessor".to_string(),
                    Value::String(wrap.wrapped_accessor.clone()),
                );
                Ok(Node::Dir(StaticDir::new(&tree)?))
            }
            _ => {
                debug!(path = %self.lookup_path, name, "no such secret field");
                Err(FsError::not_found(name))
            }
        }
    }

    /// Project a list response's `data["keys"]` into dirents.
    ///
    /// Malformed entries are logged and skipped; the listing succeeds with
    /// whatever was valid. Children are always directory-typed: whether
    /// they turn out secret-like is discovered when they are probed.
    fn key_entries(&self, secret: &Secret) -> Vec<DirEntry> {
        if secret.data.is_empty() {
            return Vec::new();
        }
        let keys = match secret.data.get("keys") {
            Some(Value::Array(keys)) => keys,
            Some(Value::Null) | None => {
                error!(path = %self.lookup_path, "directory-like secret had no \"keys\" field");
                return Vec::new();
            }
            Some(_) => {
                error!(path = %self.lookup_path, "directory-like secret \"keys\" field was not a list");
                return Vec::new();
            }
        };

        keys.iter()
            .filter_map(|value| match value {
                Value::String(name) => {
                    Some(DirEntry::directory(name.trim_end_matches('/').to_string()))
                }
                other => {
                    error!(
                        path = %self.lookup_path,
                        "non-string key in directory listing, skipping: {}",
                        other
                    );
                    None
                }
            })
            .collect()
    }
}

/// Join a child name onto a lookup path with a single slash.
fn join_path(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_normalizes_slashes() {
        assert_eq!(join_path("secret", "db"), "secret/db");
        assert_eq!(join_path("secret/", "db"), "secret/db");
        assert_eq!(join_path("secret/app", "db"), "secret/app/db");
    }

    #[test]
    fn secret_fields_are_the_seven_documented_names() {
        let names: Vec<_> = SECRET_FIELDS.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                "lease_id",
                "lease_duration",
                "renewable",
                "data",
                "warnings",
                "auth",
                "wrap_info"
            ]
        );
    }
}
