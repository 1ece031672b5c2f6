//! Core domain types for the page registry.
//!
//! Pages are identified by their canonical relative path inside the content
//! tree. The newtype keeps the normalization and display rules in one place.

pub mod page;

pub use page::{HOME_PAGE, InvalidPagePath, MARKDOWN_EXTENSION, NavEntry, Page, PagePath};
