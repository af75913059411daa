//! Command-line interface.
//!
//! Connection configuration is read from the normal `VAULT_*` environment
//! variables; flags here cover credentials, logging, and the per-command
//! options.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use vaultfs_core::AuthMethod;

/// Mount a Vault secret store as a FUSE filesystem.
#[derive(Parser, Debug)]
#[command(name = "vaultfs")]
#[command(author, version, about)]
#[command(long_about = "Mount a Vault secret store as a FUSE filesystem.

Client configuration uses the normal Vault environment variables:

  VAULT_ADDR             Address of the Vault server as a URL and port,
                         for example http://127.0.0.1:8200
  VAULT_CACERT           Path to a PEM-encoded CA certificate file used to
                         verify the server certificate.
  VAULT_CAPATH           Path to a directory of PEM-encoded CA certificate
                         files. VAULT_CACERT takes precedence.
  VAULT_CLIENT_CERT      Path to a PEM-encoded client certificate for TLS
                         authentication.
  VAULT_CLIENT_KEY       Path to the unencrypted PEM-encoded private key
                         matching the client certificate.
  VAULT_MAX_RETRIES      Extra attempts after a 5xx response. Default 2.
  VAULT_SKIP_VERIFY      Skip verification of the server certificate. Not
                         recommended outside testing.
  VAULT_TLS_SERVER_NAME  SNI host to use when connecting via TLS.")]
pub struct Cli {
    /// Vault token; when absent, log in with the configured auth method
    #[arg(short = 't', long, global = true, env = "VAULT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Authentication method used when no token is supplied
    #[arg(long, global = true, value_enum, default_value = "cert")]
    pub auth_method: AuthMethodArg,

    /// Username for the ldap auth method
    #[arg(long, global = true)]
    pub auth_user: Option<String>,

    /// Password (ldap) or secret id (approle)
    #[arg(long, global = true)]
    pub auth_secret: Option<String>,

    /// Role id for the approle auth method
    #[arg(long, global = true)]
    pub auth_role: Option<String>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG overrides
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethodArg {
    Cert,
    Ldap,
    Approle,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mount a vault filesystem at the specified mountpoint
    Mount(MountArgs),

    /// Serve the Docker volume plugin
    Docker(DockerArgs),
}

#[derive(Args, Debug)]
pub struct MountArgs {
    /// Where to mount the filesystem
    pub mountpoint: PathBuf,

    /// Root path prefix in the store
    #[arg(short, long, default_value = "secret")]
    pub root: String,
}

#[derive(Args, Debug)]
pub struct DockerArgs {
    /// Directory under which per-volume mountpoints are created
    pub state_root: PathBuf,

    /// Unix socket to speak the volume-plugin protocol on
    #[arg(short, long, default_value = "/run/docker/plugins/vault.sock")]
    pub socket: PathBuf,
}

impl Cli {
    /// Resolve the configured auth method, checking its required flags.
    pub fn auth_method(&self) -> Result<AuthMethod> {
        match self.auth_method {
            AuthMethodArg::Cert => Ok(AuthMethod::Cert),
            AuthMethodArg::Ldap => {
                let (Some(username), Some(password)) = (&self.auth_user, &self.auth_secret) else {
                    bail!("ldap auth requires --auth-user and --auth-secret");
                };
                Ok(AuthMethod::Ldap {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            AuthMethodArg::Approle => {
                let (Some(role_id), Some(secret_id)) = (&self.auth_role, &self.auth_secret) else {
                    bail!("approle auth requires --auth-role and --auth-secret");
                };
                Ok(AuthMethod::AppRole {
                    role_id: role_id.clone(),
                    secret_id: secret_id.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mount_command() {
        let cli = Cli::try_parse_from(["vaultfs", "mount", "/mnt/vault"]).unwrap();
        let Commands::Mount(args) = &cli.command else {
            panic!("expected mount command");
        };
        assert_eq!(args.mountpoint, PathBuf::from("/mnt/vault"));
        assert_eq!(args.root, "secret");
        assert_eq!(cli.auth_method, AuthMethodArg::Cert);
    }

    #[test]
    fn parses_docker_command_with_socket() {
        let cli = Cli::try_parse_from([
            "vaultfs",
            "docker",
            "/var/lib/vaultfs",
            "--socket",
            "/tmp/vault.sock",
        ])
        .unwrap();
        let Commands::Docker(args) = &cli.command else {
            panic!("expected docker command");
        };
        assert_eq!(args.state_root, PathBuf::from("/var/lib/vaultfs"));
        assert_eq!(args.socket, PathBuf::from("/tmp/vault.sock"));
    }

    #[test]
    fn docker_socket_defaults() {
        let cli = Cli::try_parse_from(["vaultfs", "docker", "/var/lib/vaultfs"]).unwrap();
        let Commands::Docker(args) = &cli.command else {
            panic!("expected docker command");
        };
        assert_eq!(args.socket, PathBuf::from("/run/docker/plugins/vault.sock"));
    }

    #[test]
    fn ldap_requires_user_and_secret() {
        let cli = Cli::try_parse_from([
            "vaultfs",
            "--auth-method",
            "ldap",
            "mount",
            "/mnt/vault",
        ])
        .unwrap();
        assert!(cli.auth_method().is_err());

        let cli = Cli::try_parse_from([
            "vaultfs",
            "--auth-method",
            "ldap",
            "--auth-user",
            "alice",
            "--auth-secret",
            "hunter2",
            "mount",
            "/mnt/vault",
        ])
        .unwrap();
        assert!(matches!(
            cli.auth_method().unwrap(),
            AuthMethod::Ldap { .. }
        ));
    }

    #[test]
    fn approle_requires_role_and_secret() {
        let cli = Cli::try_parse_from([
            "vaultfs",
            "--auth-method",
            "approle",
            "--auth-role",
            "r1",
            "--auth-secret",
            "s1",
            "mount",
            "/mnt/vault",
        ])
        .unwrap();
        assert!(matches!(
            cli.auth_method().unwrap(),
            AuthMethod::AppRole { .. }
        ));
    }
}
