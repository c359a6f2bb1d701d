//! Import pipeline: turns raw file content into entity records and links tags.
//!
//! `note` and `conversation` imports store the whole content as one record. `auth` and
//! `task` imports decode CSV, one record per row. Each call runs in a single IMMEDIATE
//! transaction, so a parse or constraint failure leaves the store untouched.

use crate::core::error::KipsError;
use crate::core::store::with_transaction;
use crate::plugins::entities::{
    self, AuthInsert, ConversationInsert, EntityKind, NoteInsert, TaskInsert,
};
use crate::plugins::tabular::{self, TableRow};
use crate::plugins::tags;
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// What one import call produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub kind: EntityKind,
    /// Ids of the created records, in input order
    pub record_ids: Vec<i64>,
    /// Resolved tag ids, parallel to the requested tag names
    pub tag_ids: Vec<i64>,
    /// Join rows actually created (re-links of the same pair are not counted)
    pub links_created: usize,
}

pub fn auth_from_row(row: &TableRow) -> AuthInsert {
    AuthInsert {
        username: row.get("username").to_string(),
        password: row.get("password").to_string(),
        url: row.get("url").to_string(),
        notes: row.get("notes").to_string(),
    }
}

pub fn task_from_row(row: &TableRow) -> TaskInsert {
    TaskInsert {
        objective: row.get("objective").to_string(),
        progress_assessment: row.get("progressAssessment").to_string(),
        completed: row.get("completed").trim() == "true",
    }
}

/// Import raw content of the given kind, associating `tag_names` where the kind allows.
pub fn import_content<S: AsRef<str>>(
    conn: &mut Connection,
    kind: EntityKind,
    raw: &str,
    tag_names: &[S],
) -> Result<ImportReport, KipsError> {
    info!(kind = %kind, tags = tag_names.len(), "import started");
    let result = with_transaction(conn, |tx| import_in_tx(tx, kind, raw, tag_names));
    match &result {
        Ok(report) => info!(
            kind = %kind,
            records = report.record_ids.len(),
            links = report.links_created,
            "import finished"
        ),
        Err(e) => warn!(kind = %kind, error = %e, "import aborted, nothing committed"),
    }
    result
}

/// Read a UTF-8 file and import its content.
pub fn import_file<S: AsRef<str>>(
    conn: &mut Connection,
    kind: EntityKind,
    path: &Path,
    tag_names: &[S],
) -> Result<ImportReport, KipsError> {
    let raw = fs::read_to_string(path).map_err(KipsError::IoError)?;
    import_content(conn, kind, &raw, tag_names)
}

fn import_in_tx<S: AsRef<str>>(
    tx: &Transaction<'_>,
    kind: EntityKind,
    raw: &str,
    tag_names: &[S],
) -> Result<ImportReport, KipsError> {
    let record_ids = match kind {
        EntityKind::Note => vec![entities::insert_note(
            tx,
            &NoteInsert {
                content: raw.to_string(),
            },
        )?],
        EntityKind::Conversation => vec![entities::insert_conversation(
            tx,
            &ConversationInsert {
                content: raw.to_string(),
            },
        )?],
        EntityKind::Auth => {
            let table = tabular::parse_table(raw)?;
            let mut ids = Vec::with_capacity(table.rows.len());
            for row in &table.rows {
                ids.push(entities::insert_auth(tx, &auth_from_row(row))?);
            }
            ids
        }
        EntityKind::Task => {
            let table = tabular::parse_table(raw)?;
            let mut ids = Vec::with_capacity(table.rows.len());
            for row in &table.rows {
                ids.push(entities::insert_task(tx, &task_from_row(row))?);
            }
            ids
        }
    };

    let Some(tagged) = kind.tagged() else {
        if !tag_names.is_empty() {
            warn!(kind = %kind, "tags are not supported for this kind; ignoring");
        }
        return Ok(ImportReport {
            kind,
            record_ids,
            tag_ids: Vec::new(),
            links_created: 0,
        });
    };

    let tag_ids = tags::resolve_tags(tx, tag_names)?;
    let mut links_created = 0;
    for record_id in &record_ids {
        for tag_id in &tag_ids {
            if entities::associate_tag(tx, tagged, *record_id, *tag_id)? {
                links_created += 1;
            }
        }
    }

    Ok(ImportReport {
        kind,
        record_ids,
        tag_ids,
        links_created,
    })
}
