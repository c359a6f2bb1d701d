//! Tag resolver: maps tag names to stable ids, creating tags on first use.

use crate::core::error::KipsError;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

/// Resolve one name with a single atomic get-or-insert.
///
/// `ON CONFLICT DO NOTHING RETURNING` yields the new id when this call created the row
/// and nothing when the name already existed; the follow-up read then sees the existing
/// row. Either way exactly one `tags` row carries the name.
pub fn resolve_tag(conn: &Connection, name: &str) -> Result<i64, KipsError> {
    let inserted: Option<i64> = conn
        .query_row(
            "INSERT INTO tags(name) VALUES(?1) ON CONFLICT(name) DO NOTHING RETURNING id",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(KipsError::from_sqlite)?;

    if let Some(id) = inserted {
        debug!(tag = name, id, "tag created");
        return Ok(id);
    }

    conn.query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
        row.get(0)
    })
    .optional()?
    .ok_or_else(|| KipsError::NotFound(format!("tag '{}' vanished during resolution", name)))
}

/// Resolve every name in order. The output has the input's length; repeated names
/// resolve to the same id. Names are stored verbatim (case-sensitive, untrimmed).
pub fn resolve_tags<S: AsRef<str>>(conn: &Connection, names: &[S]) -> Result<Vec<i64>, KipsError> {
    names
        .iter()
        .map(|name| resolve_tag(conn, name.as_ref()))
        .collect()
}

/// Split a space-separated tag list as given on the command line.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
