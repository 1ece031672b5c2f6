//! Reconciliation of the content tree into the page registry.
//!
//! After a successful pull, every markdown file below the content root is
//! registered under its slash-separated path relative to the root. The
//! registry upsert is idempotent, so reconciling an unchanged tree is a
//! no-op.
//!
//! Failure handling differs by scope:
//! - A single failed upsert is logged and the walk continues.
//! - A tree that cannot be enumerated aborts the whole pass.
//!
//! Rows for files that have since been removed are left in place.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::registry::{PageRegistry, RegistryError};
use crate::types::{MARKDOWN_EXTENSION, PagePath};

/// Directory holding VCS metadata; never part of the content.
const GIT_DIR: &str = ".git";

/// Errors that abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The content root is missing or not a readable directory.
    #[error("content root {} is not readable: {source}", .path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory below the root could not be read.
    #[error("error walking content tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Counts from one reconciliation pass. Informational only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Markdown files found in the tree.
    pub discovered: usize,
    /// Files that were not yet registered.
    pub created: usize,
    /// Files whose upsert failed.
    pub failed: usize,
}

/// Destination for discovered pages.
pub trait PageSink {
    /// Registers `path` if absent. Returns `true` if a row was created.
    fn upsert_page(&self, path: &PagePath) -> Result<bool, RegistryError>;
}

impl PageSink for PageRegistry {
    fn upsert_page(&self, path: &PagePath) -> Result<bool, RegistryError> {
        PageRegistry::upsert_page(self, path)
    }
}

/// Walks `root` and upserts every markdown file into `sink`.
pub fn reconcile<S>(root: &Path, sink: &S) -> Result<ReconcileSummary, ReconcileError>
where
    S: PageSink + ?Sized,
{
    std::fs::read_dir(root).map_err(|source| ReconcileError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    info!(root = %root.display(), "Reconciling content tree");
    let mut summary = ReconcileSummary::default();

    for entry in WalkDir::new(root).into_iter().filter_entry(|e| !is_git_dir(e)) {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_markdown(&entry) {
            continue;
        }

        let Some(path) = relative_page_path(root, entry.path()) else {
            continue;
        };
        summary.discovered += 1;
        debug!(path = %path, "Found markdown file");

        match sink.upsert_page(&path) {
            Ok(true) => summary.created += 1,
            Ok(false) => {}
            Err(e) => {
                summary.failed += 1;
                warn!(path = %path, error = %e, "Failed to upsert page");
            }
        }
    }

    info!(
        discovered = summary.discovered,
        created = summary.created,
        failed = summary.failed,
        "Content reconciliation finished"
    );
    Ok(summary)
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == GIT_DIR
}

fn is_markdown(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_string_lossy()
        .ends_with(MARKDOWN_EXTENSION)
}

/// Returns `path` relative to `root` with forward-slash separators.
fn relative_page_path(root: &Path, path: &Path) -> Option<PagePath> {
    let relative = path.strip_prefix(root).ok()?;
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    (!joined.is_empty()).then(|| PagePath::new(joined))
}
