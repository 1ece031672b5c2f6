//! Page queries and mutations.

use rusqlite::{OptionalExtension, Row, params};
use tracing::{debug, trace, warn};

use super::{PageRegistry, RegistryError, RegistryResult};
use crate::types::{NavEntry, Page, PagePath};

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    let visit_count: i64 = row.get(3)?;
    Ok(Page {
        path: PagePath::new(row.get::<_, String>(0)?),
        title: row.get(1)?,
        is_visible: row.get(2)?,
        visit_count: u64::try_from(visit_count).unwrap_or(0),
    })
}

impl PageRegistry {
    /// Creates a row for `path` unless one already exists.
    ///
    /// The title is derived from the path only on creation; an existing row
    /// is left untouched. Returns `true` if a row was created.
    pub fn upsert_page(&self, path: &PagePath) -> RegistryResult<bool> {
        let title = path.derive_title();
        let inserted = self.conn().execute(
            "INSERT INTO pages (path, title) VALUES (?1, ?2) ON CONFLICT(path) DO NOTHING",
            params![path.as_str(), title],
        )?;
        if inserted > 0 {
            debug!(path = %path, title = %title, "Registered new page");
        }
        Ok(inserted > 0)
    }

    /// Looks up a single page.
    pub fn get_by_path(&self, path: &PagePath) -> RegistryResult<Page> {
        self.conn()
            .query_row(
                "SELECT path, title, is_visible, visit_count FROM pages WHERE path = ?1",
                params![path.as_str()],
                page_from_row,
            )
            .optional()?
            .ok_or_else(|| RegistryError::NotFound(path.clone()))
    }

    /// Lists every page, ordered by path.
    pub fn list_all(&self) -> RegistryResult<Vec<Page>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT path, title, is_visible, visit_count FROM pages ORDER BY path ASC")?;
        let pages = stmt
            .query_map([], page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }

    /// Lists visible pages for navigation, ordered by canonical path.
    ///
    /// Paths are transformed for display: the extension is stripped and the
    /// home page is rendered as `/`.
    pub fn list_visible(&self) -> RegistryResult<Vec<NavEntry>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT path, title FROM pages WHERE is_visible = 1 ORDER BY path ASC")?;
        let entries = stmt
            .query_map([], |row| {
                let path = PagePath::new(row.get::<_, String>(0)?);
                Ok(NavEntry {
                    path: path.display_path(),
                    title: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Increments the visit counter for `path`.
    ///
    /// Best-effort: failures are logged and swallowed, and an unknown path is
    /// a no-op. Counts may be lost under contention or on crash.
    pub fn increment_visit(&self, path: &PagePath) {
        let result = self.conn().execute(
            "UPDATE pages SET visit_count = visit_count + 1 WHERE path = ?1",
            params![path.as_str()],
        );
        match result {
            Ok(0) => trace!(path = %path, "Visit for unregistered page ignored"),
            Ok(_) => trace!(path = %path, "Visit counted"),
            Err(e) => warn!(path = %path, error = %e, "Failed to increment visit count"),
        }
    }

    /// Flips the visibility flag of `path` and returns the new value.
    pub fn toggle_visibility(&self, path: &PagePath) -> RegistryResult<bool> {
        let visible = self
            .conn()
            .query_row(
                "UPDATE pages SET is_visible = NOT is_visible WHERE path = ?1 RETURNING is_visible",
                params![path.as_str()],
                |row| row.get::<_, bool>(0),
            )
            .optional()?
            .ok_or_else(|| RegistryError::NotFound(path.clone()))?;
        debug!(path = %path, is_visible = visible, "Toggled page visibility");
        Ok(visible)
    }
}
