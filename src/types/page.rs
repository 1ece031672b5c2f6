//! Page identity and metadata.
//!
//! A [`PagePath`] is the slash-separated path of a markdown document relative
//! to the content root, extension included (e.g. `blog/my-first-post.md`).
//! It is the primary key of the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// File extension of documents tracked by the registry.
pub const MARKDOWN_EXTENSION: &str = ".md";

/// Canonical path of the home page. Rendered as `/` in navigation listings.
pub const HOME_PAGE: &str = "home.md";

/// Canonical relative path of a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PagePath(String);

/// Errors from normalizing a request path into a [`PagePath`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPagePath {
    /// The path was empty after trimming leading slashes.
    #[error("page path is empty")]
    Empty,

    /// The path contained a component that would escape the content root.
    #[error("invalid page path component in {0:?}")]
    InvalidComponent(String),
}

impl PagePath {
    /// Wraps an already-canonical path.
    ///
    /// No normalization is applied. Use [`PagePath::from_request_path`] for
    /// paths that come from outside the process.
    pub fn new(path: impl Into<String>) -> Self {
        PagePath(path.into())
    }

    /// Normalizes a (URL-decoded) request path into a page path.
    ///
    /// Leading slashes are trimmed and the markdown extension is appended
    /// when missing, so `blog/post`, `/blog/post` and `blog/post.md` all map
    /// to `blog/post.md`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pagesync::types::PagePath;
    ///
    /// let path = PagePath::from_request_path("/blog/post").unwrap();
    /// assert_eq!(path.as_str(), "blog/post.md");
    ///
    /// assert!(PagePath::from_request_path("../secrets").is_err());
    /// ```
    pub fn from_request_path(raw: &str) -> Result<Self, InvalidPagePath> {
        let trimmed = raw.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(InvalidPagePath::Empty);
        }

        let bad_component = trimmed
            .split('/')
            .any(|c| c.is_empty() || c == "." || c == ".." || c.contains('\\'));
        if bad_component {
            return Err(InvalidPagePath::InvalidComponent(raw.to_string()));
        }

        if trimmed.ends_with(MARKDOWN_EXTENSION) {
            Ok(PagePath(trimmed.to_string()))
        } else {
            Ok(PagePath(format!("{trimmed}{MARKDOWN_EXTENSION}")))
        }
    }

    /// Like [`PagePath::from_request_path`], but an empty or slash-only path
    /// names the home page, matching the `/` link in navigation listings.
    ///
    /// ```
    /// use pagesync::types::{HOME_PAGE, PagePath};
    ///
    /// assert_eq!(PagePath::from_page_request("/").unwrap().as_str(), HOME_PAGE);
    /// assert_eq!(PagePath::from_page_request("about").unwrap().as_str(), "about.md");
    /// ```
    pub fn from_page_request(raw: &str) -> Result<Self, InvalidPagePath> {
        if raw.trim_start_matches('/').is_empty() {
            return Ok(PagePath::new(HOME_PAGE));
        }
        Self::from_request_path(raw)
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the human-readable title for this page.
    ///
    /// Strips the extension, keeps the final path segment, turns `-` and `_`
    /// into spaces and capitalizes each word.
    ///
    /// Words are split on whitespace only, so a letter after other
    /// punctuation keeps its case: `release.notes-v2.md` becomes
    /// `Release.notes V2`, not `Release.Notes V2` as a punctuation-aware
    /// title-caser would produce.
    ///
    /// ```
    /// use pagesync::types::PagePath;
    ///
    /// assert_eq!(PagePath::new("blog/my-first-post.md").derive_title(), "My First Post");
    /// assert_eq!(PagePath::new("home.md").derive_title(), "Home");
    /// ```
    pub fn derive_title(&self) -> String {
        let segment = self.0.rsplit('/').next().unwrap_or(&self.0);
        let stem = match segment.rfind('.') {
            Some(idx) if idx > 0 => &segment[..idx],
            _ => segment,
        };
        capitalize_words(&stem.replace(['-', '_'], " "))
    }

    /// Returns the link target used in navigation listings.
    ///
    /// The markdown extension is stripped, and the home page becomes `/`.
    pub fn display_path(&self) -> String {
        if self.0 == HOME_PAGE {
            return "/".to_string();
        }
        self.0
            .strip_suffix(MARKDOWN_EXTENSION)
            .unwrap_or(&self.0)
            .to_string()
    }
}

impl fmt::Display for PagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PagePath {
    fn from(s: &str) -> Self {
        PagePath(s.to_string())
    }
}

/// Uppercases the first character of every whitespace-separated word.
fn capitalize_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    out
}

/// A registry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub path: PagePath,
    /// Set once when the row is created; never recomputed.
    pub title: String,
    pub is_visible: bool,
    pub visit_count: u64,
}

/// A navigation entry for a visible page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEntry {
    /// Display path (see [`PagePath::display_path`]).
    pub path: String,
    pub title: String,
}
