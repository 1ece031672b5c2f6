//! Shared test utilities: scratch upstream repositories and signed webhook requests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::git::run_git;
use crate::webhooks::{compute_signature, format_signature_header};

/// A local repository standing in for the remote content repository.
///
/// Lives in its own temp directory; clones reach it through its filesystem
/// path, so no ssh is involved.
pub struct UpstreamRepo {
    dir: TempDir,
}

impl UpstreamRepo {
    /// Creates a repository on branch `main` with a single commit containing `home.md`.
    pub fn init() -> Self {
        let dir = TempDir::new().unwrap();
        run_git(dir.path(), None, ["init"]).unwrap();
        run_git(dir.path(), None, ["symbolic-ref", "HEAD", "refs/heads/main"]).unwrap();

        let repo = UpstreamRepo { dir };
        repo.write_file("home.md", "# Home\n");
        repo.commit("Initial commit");
        repo
    }

    /// Returns the repository path, usable as a clone URL.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the clone URL as a string.
    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    /// Writes `contents` to `rel_path`, creating parent directories.
    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Stages everything and commits it.
    pub fn commit(&self, message: &str) {
        run_git(self.dir.path(), None, ["add", "-A"]).unwrap();
        run_git(
            self.dir.path(),
            None,
            [
                "-c",
                "user.name=Test",
                "-c",
                "user.email=test@test.com",
                "commit",
                "-m",
                message,
            ],
        )
        .unwrap();
    }

    /// Writes a file and commits it in one step.
    pub fn add_page(&self, rel_path: &str, contents: &str) {
        self.write_file(rel_path, contents);
        self.commit(&format!("Add {rel_path}"));
    }
}

/// Builds a push payload for `git_ref`.
pub fn push_payload(git_ref: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "ref": git_ref,
        "before": "0".repeat(40),
        "after": "a".repeat(40),
        "repository": { "full_name": "octocat/journal" }
    }))
    .unwrap()
}

/// Returns the `X-Hub-Signature-256` value for `body`.
pub fn signature_for(body: &[u8], secret: &[u8]) -> String {
    format_signature_header(&compute_signature(body, secret))
}
