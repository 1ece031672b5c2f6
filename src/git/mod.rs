//! Git operations on the content repository's working copy.
//!
//! The working copy is maintained by shelling out to `git`:
//! - **Clone** when the working copy does not exist yet
//! - **Pull** (fast-forward only) otherwise
//!
//! Every invocation runs with a clean environment (no system or global git
//! config, no terminal prompts) and, when talking to a remote, with the
//! configured ssh key scoped to that single command.
//!
//! Nothing here retries or times out. Callers must serialize access to a
//! working copy; see [`crate::sync::SyncOperation`].

pub mod syncer;
pub mod transport;

use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

use thiserror::Error;

pub use syncer::{RepoSyncer, UpdateKind};
pub use transport::{HostKeyPolicy, SshTransport, UnknownHostKeyPolicy};

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Git exited unsuccessfully. `output` holds combined stdout and stderr.
    #[error("git command failed: {command}\n{output}")]
    CommandFailed { command: String, output: String },

    /// Git could not be spawned, or a filesystem step failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Creates a git `Command` with a clean environment (no system/user config).
///
/// When `transport` is given, `GIT_SSH_COMMAND` is set so the remote is
/// reached with its key and host key policy.
pub(crate) fn git_command(workdir: &Path, transport: Option<&SshTransport>) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);

    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    if let Some(transport) = transport {
        cmd.env("GIT_SSH_COMMAND", transport.ssh_command());
    }

    cmd
}

/// Runs git in `workdir` and returns its output on success.
pub fn run_git<I, S>(workdir: &Path, transport: Option<&SshTransport>, args: I) -> GitResult<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let output = git_command(workdir, transport).args(&args).output()?;

    if output.status.success() {
        Ok(output)
    } else {
        let command = std::iter::once(Cow::Borrowed("git"))
            .chain(args.iter().map(|a| a.as_ref().to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ");
        Err(GitError::CommandFailed {
            command,
            output: combined_output(&output),
        })
    }
}

/// Runs git in `workdir` without a transport and returns trimmed stdout.
#[cfg(test)]
pub(crate) fn run_git_stdout(workdir: &Path, args: &[&str]) -> GitResult<String> {
    let output = run_git(workdir, None, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, true) => format!("(no output, {})", output.status),
        (false, true) => stdout.trim().to_string(),
        (true, false) => stderr.trim().to_string(),
        (false, false) => format!("{}\n{}", stdout.trim(), stderr.trim()),
    }
}
