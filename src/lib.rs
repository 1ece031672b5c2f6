//! pagesync - keeps a markdown page registry in step with a git repository.
//!
//! A signed push webhook schedules a pull of the content repository, after
//! which every markdown file in the working copy is registered in a SQLite
//! page registry. The registry tracks per-page visibility and visit counts.

pub mod config;
pub mod content;
pub mod git;
pub mod registry;
pub mod server;
pub mod sync;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
