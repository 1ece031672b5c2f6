//! SSH transport settings for talking to the content repository.
//!
//! The private key is passed to git through `GIT_SSH_COMMAND` on each
//! invocation, so nothing is written to the user's ssh config. Host keys are
//! always verified; the only choice is whether unknown hosts are rejected
//! (`strict`) or recorded on first contact (`accept-new`).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// How ssh treats host keys it has not seen before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKeyPolicy {
    /// Reject hosts missing from the known-hosts file.
    #[default]
    Strict,
    /// Record unknown hosts on first contact, reject changed keys.
    AcceptNew,
}

impl HostKeyPolicy {
    /// Value for ssh's `StrictHostKeyChecking` option.
    fn ssh_option(self) -> &'static str {
        match self {
            HostKeyPolicy::Strict => "yes",
            HostKeyPolicy::AcceptNew => "accept-new",
        }
    }
}

/// Error returned when parsing an unknown host key policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown host key policy {0:?} (expected \"strict\" or \"accept-new\")")]
pub struct UnknownHostKeyPolicy(pub String);

impl FromStr for HostKeyPolicy {
    type Err = UnknownHostKeyPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "strict" => Ok(HostKeyPolicy::Strict),
            "accept-new" => Ok(HostKeyPolicy::AcceptNew),
            other => Err(UnknownHostKeyPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKeyPolicy::Strict => write!(f, "strict"),
            HostKeyPolicy::AcceptNew => write!(f, "accept-new"),
        }
    }
}

/// Credentials and host verification settings for the ssh transport.
#[derive(Debug, Clone)]
pub struct SshTransport {
    /// Private key used to authenticate (a deploy key, typically).
    pub key_path: PathBuf,

    /// Host key verification policy.
    pub host_key_policy: HostKeyPolicy,

    /// Known-hosts file. Falls back to ssh's defaults when `None`.
    pub known_hosts: Option<PathBuf>,
}

impl SshTransport {
    /// Creates a transport using `key_path` with strict host key checking.
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        SshTransport {
            key_path: key_path.into(),
            host_key_policy: HostKeyPolicy::default(),
            known_hosts: None,
        }
    }

    /// Builds the value for `GIT_SSH_COMMAND`.
    ///
    /// Git runs this through a shell, so paths are single-quoted.
    pub fn ssh_command(&self) -> String {
        let mut command = format!(
            "ssh -i {} -o IdentitiesOnly=yes -o StrictHostKeyChecking={}",
            shell_quote(&self.key_path.to_string_lossy()),
            self.host_key_policy.ssh_option(),
        );
        if let Some(known_hosts) = &self.known_hosts {
            command.push_str(" -o UserKnownHostsFile=");
            command.push_str(&shell_quote(&known_hosts.to_string_lossy()));
        }
        command
    }
}

/// Quotes `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_strict() {
        let transport = SshTransport::new("/keys/deploy");
        assert_eq!(transport.host_key_policy, HostKeyPolicy::Strict);
        assert_eq!(
            transport.ssh_command(),
            "ssh -i '/keys/deploy' -o IdentitiesOnly=yes -o StrictHostKeyChecking=yes"
        );
    }

    #[test]
    fn accept_new_with_known_hosts() {
        let transport = SshTransport {
            key_path: PathBuf::from("/keys/deploy"),
            host_key_policy: HostKeyPolicy::AcceptNew,
            known_hosts: Some(PathBuf::from("/state/known_hosts")),
        };
        assert_eq!(
            transport.ssh_command(),
            "ssh -i '/keys/deploy' -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new \
             -o UserKnownHostsFile='/state/known_hosts'"
        );
    }

    #[test]
    fn ssh_command_never_disables_host_key_checking() {
        for policy in [HostKeyPolicy::Strict, HostKeyPolicy::AcceptNew] {
            let transport = SshTransport {
                host_key_policy: policy,
                ..SshTransport::new("/k")
            };
            assert!(!transport.ssh_command().contains("StrictHostKeyChecking=no"));
        }
    }

    #[test]
    fn key_path_with_quote_is_escaped() {
        let transport = SshTransport::new("/keys/o'brien key");
        assert!(
            transport
                .ssh_command()
                .starts_with(r"ssh -i '/keys/o'\''brien key' ")
        );
    }

    #[test]
    fn parse_policy() {
        assert_eq!("strict".parse(), Ok(HostKeyPolicy::Strict));
        assert_eq!(" accept-new ".parse(), Ok(HostKeyPolicy::AcceptNew));
        assert_eq!(
            "no".parse::<HostKeyPolicy>(),
            Err(UnknownHostKeyPolicy("no".to_string()))
        );
    }

    #[test]
    fn policy_display_roundtrips() {
        for policy in [HostKeyPolicy::Strict, HostKeyPolicy::AcceptNew] {
            assert_eq!(policy.to_string().parse(), Ok(policy));
        }
    }
}
