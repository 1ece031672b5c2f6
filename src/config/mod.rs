//! Process configuration, read from environment variables at startup.
//!
//! | Variable                  | Required | Default         |
//! |---------------------------|----------|-----------------|
//! | `GIT_REPO_URL`            | yes      |                 |
//! | `GIT_SSH_KEY_PATH`        | yes      |                 |
//! | `GITHUB_WEBHOOK_SECRET`   | yes      |                 |
//! | `CONTENT_PATH`            | no       | `./content`     |
//! | `DB_PATH`                 | no       | `./pagesync.db` |
//! | `LISTEN_ADDR`             | no       | `0.0.0.0:8080`  |
//! | `ADMIN_TOKEN`             | no       | (admin routes disabled) |
//! | `GIT_SSH_HOST_KEY_POLICY` | no       | `strict`        |
//! | `GIT_SSH_KNOWN_HOSTS`     | no       |                 |

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::git::{HostKeyPolicy, SshTransport, UnknownHostKeyPolicy};

pub const ENV_REPO_URL: &str = "GIT_REPO_URL";
pub const ENV_SSH_KEY_PATH: &str = "GIT_SSH_KEY_PATH";
pub const ENV_WEBHOOK_SECRET: &str = "GITHUB_WEBHOOK_SECRET";
pub const ENV_CONTENT_PATH: &str = "CONTENT_PATH";
pub const ENV_DB_PATH: &str = "DB_PATH";
pub const ENV_LISTEN_ADDR: &str = "LISTEN_ADDR";
pub const ENV_ADMIN_TOKEN: &str = "ADMIN_TOKEN";
pub const ENV_HOST_KEY_POLICY: &str = "GIT_SSH_HOST_KEY_POLICY";
pub const ENV_KNOWN_HOSTS: &str = "GIT_SSH_KNOWN_HOSTS";

const DEFAULT_CONTENT_PATH: &str = "./content";
const DEFAULT_DB_PATH: &str = "./pagesync.db";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{0} is set but empty")]
    Empty(&'static str),

    #[error("ssh key {} does not exist or is not a file", .0.display())]
    KeyNotFound(PathBuf),

    #[error("LISTEN_ADDR {value:?} is not a socket address: {source}")]
    InvalidListenAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error(transparent)]
    HostKeyPolicy(#[from] UnknownHostKeyPolicy),
}

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote repository holding the markdown content.
    pub repo_url: String,
    /// Deploy key for the ssh transport.
    pub ssh_key_path: PathBuf,
    pub host_key_policy: HostKeyPolicy,
    pub known_hosts: Option<PathBuf>,
    /// Shared secret for webhook signatures.
    pub webhook_secret: Vec<u8>,
    /// Working copy location; also the content root.
    pub content_path: PathBuf,
    pub db_path: PathBuf,
    pub listen_addr: SocketAddr,
    /// Bearer token for the admin routes. `None` disables them.
    pub admin_token: Option<String>,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            let value = lookup(name).ok_or(ConfigError::Missing(name))?;
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
            Ok(value)
        };
        // Set-but-blank optional values count as unset.
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let repo_url = required(ENV_REPO_URL)?.trim().to_string();

        let ssh_key_path = PathBuf::from(required(ENV_SSH_KEY_PATH)?);
        if !ssh_key_path.is_file() {
            return Err(ConfigError::KeyNotFound(ssh_key_path));
        }

        let webhook_secret = required(ENV_WEBHOOK_SECRET)?.into_bytes();

        let host_key_policy = match optional(ENV_HOST_KEY_POLICY) {
            Some(value) => value.parse()?,
            None => HostKeyPolicy::default(),
        };

        let listen_value =
            optional(ENV_LISTEN_ADDR).unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_value
            .trim()
            .parse()
            .map_err(|source| ConfigError::InvalidListenAddr {
                value: listen_value.clone(),
                source,
            })?;

        Ok(Config {
            repo_url,
            ssh_key_path,
            host_key_policy,
            known_hosts: optional(ENV_KNOWN_HOSTS).map(PathBuf::from),
            webhook_secret,
            content_path: optional(ENV_CONTENT_PATH)
                .map_or_else(|| PathBuf::from(DEFAULT_CONTENT_PATH), PathBuf::from),
            db_path: optional(ENV_DB_PATH)
                .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from),
            listen_addr,
            admin_token: optional(ENV_ADMIN_TOKEN),
        })
    }

    /// Builds the ssh transport settings.
    pub fn transport(&self) -> SshTransport {
        SshTransport {
            key_path: self.ssh_key_path.clone(),
            host_key_policy: self.host_key_policy,
            known_hosts: self.known_hosts.clone(),
        }
    }
}
