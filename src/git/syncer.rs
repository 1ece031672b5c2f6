//! Clone/pull of the content repository's working copy.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{GitResult, SshTransport, run_git};

/// What [`RepoSyncer::update`] did to bring the working copy up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// The working copy was absent and has been cloned.
    Cloned,
    /// The existing working copy was fast-forwarded.
    Pulled,
}

/// Keeps a local working copy in step with the remote content repository.
///
/// Invocations against the same working copy must not overlap. This type
/// does no locking of its own.
#[derive(Debug, Clone)]
pub struct RepoSyncer {
    repo_url: String,
    working_copy: PathBuf,
    transport: SshTransport,
}

impl RepoSyncer {
    pub fn new(
        repo_url: impl Into<String>,
        working_copy: impl Into<PathBuf>,
        transport: SshTransport,
    ) -> Self {
        RepoSyncer {
            repo_url: repo_url.into(),
            working_copy: working_copy.into(),
            transport,
        }
    }

    /// Returns the working copy path (the content root).
    pub fn working_copy(&self) -> &Path {
        &self.working_copy
    }

    /// Returns true if the working copy has been cloned.
    pub fn has_working_copy(&self) -> bool {
        self.working_copy.join(".git").exists()
    }

    /// Clones the repository into the working copy location.
    ///
    /// Only meaningful when the working copy is absent; git refuses to clone
    /// into a non-empty directory.
    pub fn clone_repo(&self) -> GitResult<()> {
        let dest = std::path::absolute(&self.working_copy)?;
        let parent = dest.parent().unwrap_or(Path::new("/"));
        std::fs::create_dir_all(parent)?;

        info!(url = %self.repo_url, dest = %dest.display(), "Cloning content repository");
        run_git(
            parent,
            Some(&self.transport),
            [
                OsStr::new("clone"),
                OsStr::new("--"),
                OsStr::new(&self.repo_url),
                dest.as_os_str(),
            ],
        )?;
        Ok(())
    }

    /// Fast-forwards the working copy to the remote's current state.
    pub fn pull(&self) -> GitResult<()> {
        info!(path = %self.working_copy.display(), "Pulling content repository");
        let output = run_git(
            &self.working_copy,
            Some(&self.transport),
            ["pull", "--ff-only"],
        )?;
        debug!(
            output = %String::from_utf8_lossy(&output.stdout).trim(),
            "Pull finished"
        );
        Ok(())
    }

    /// Clones if the working copy is absent, pulls otherwise.
    pub fn update(&self) -> GitResult<UpdateKind> {
        if self.has_working_copy() {
            self.pull()?;
            Ok(UpdateKind::Pulled)
        } else {
            self.clone_repo()?;
            Ok(UpdateKind::Cloned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{GitError, run_git_stdout};
    use crate::test_utils::UpstreamRepo;
    use tempfile::tempdir;

    fn syncer_for(upstream: &UpstreamRepo, working_copy: &Path) -> RepoSyncer {
        RepoSyncer::new(
            upstream.url(),
            working_copy,
            SshTransport::new("/nonexistent/deploy_key"),
        )
    }

    #[test]
    fn update_clones_then_pulls() {
        let upstream = UpstreamRepo::init();
        let scratch = tempdir().unwrap();
        let working_copy = scratch.path().join("content");
        let syncer = syncer_for(&upstream, &working_copy);

        assert!(!syncer.has_working_copy());
        assert_eq!(syncer.update().unwrap(), UpdateKind::Cloned);
        assert!(syncer.has_working_copy());
        assert!(working_copy.join("home.md").exists());

        upstream.add_page("blog/new-post.md", "# New\n");
        assert_eq!(syncer.update().unwrap(), UpdateKind::Pulled);
        assert!(working_copy.join("blog/new-post.md").exists());
    }

    #[test]
    fn pull_tracks_upstream_head() {
        let upstream = UpstreamRepo::init();
        let scratch = tempdir().unwrap();
        let working_copy = scratch.path().join("content");
        let syncer = syncer_for(&upstream, &working_copy);
        syncer.clone_repo().unwrap();

        upstream.add_page("a.md", "a");
        upstream.add_page("b.md", "b");
        syncer.pull().unwrap();

        let local = run_git_stdout(&working_copy, &["rev-parse", "HEAD"]).unwrap();
        let remote = run_git_stdout(upstream.path(), &["rev-parse", "HEAD"]).unwrap();
        assert_eq!(local, remote);
    }

    #[test]
    fn clone_failure_carries_diagnostics() {
        let scratch = tempdir().unwrap();
        let syncer = RepoSyncer::new(
            scratch.path().join("no-such-repo").to_string_lossy(),
            scratch.path().join("content"),
            SshTransport::new("/nonexistent/deploy_key"),
        );

        match syncer.clone_repo() {
            Err(GitError::CommandFailed { command, output }) => {
                assert!(command.starts_with("git clone"));
                assert!(!output.is_empty());
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
        assert!(!syncer.has_working_copy());
    }

    #[test]
    fn pull_without_working_copy_fails() {
        let upstream = UpstreamRepo::init();
        let scratch = tempdir().unwrap();
        let syncer = syncer_for(&upstream, &scratch.path().join("content"));

        assert!(syncer.pull().is_err());
    }
}
