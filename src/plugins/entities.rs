//! Entity repository: typed records and CRUD primitives for the four entity kinds,
//! tags, and the three tag join tables.
//!
//! Rows are decoded into explicit record types here; nothing above this module sees an
//! untyped row. Timestamps are owned by the schema (defaults + triggers), so inserts
//! only ever carry domain fields.

use crate::core::error::KipsError;
use clap::ValueEnum;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// First-class record kinds that can be imported.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Conversation,
    Note,
    Auth,
    Task,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Conversation => "conversation",
            EntityKind::Note => "note",
            EntityKind::Auth => "auth",
            EntityKind::Task => "task",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Conversation => "conversations",
            EntityKind::Note => "notes",
            EntityKind::Auth => "auth",
            EntityKind::Task => "tasks",
        }
    }

    /// Kinds that can carry tags. `auth` records never do.
    pub fn tagged(&self) -> Option<TaggedKind> {
        match self {
            EntityKind::Conversation => Some(TaggedKind::Conversation),
            EntityKind::Note => Some(TaggedKind::Note),
            EntityKind::Task => Some(TaggedKind::Task),
            EntityKind::Auth => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = KipsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "conversation" => Ok(EntityKind::Conversation),
            "note" => Ok(EntityKind::Note),
            "auth" => Ok(EntityKind::Auth),
            "task" => Ok(EntityKind::Task),
            other => Err(KipsError::ValidationError(format!(
                "Invalid type '{}'. Expected one of: conversation, note, auth, task",
                other
            ))),
        }
    }
}

/// Entity kinds with a tag join table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TaggedKind {
    Note,
    Task,
    Conversation,
}

impl TaggedKind {
    pub const ALL: [TaggedKind; 3] = [TaggedKind::Note, TaggedKind::Task, TaggedKind::Conversation];

    pub fn join_table(&self) -> &'static str {
        match self {
            TaggedKind::Note => "noteTag",
            TaggedKind::Task => "taskTag",
            TaggedKind::Conversation => "conversationTag",
        }
    }

    pub fn owner_column(&self) -> &'static str {
        match self {
            TaggedKind::Note => "noteId",
            TaggedKind::Task => "taskId",
            TaggedKind::Conversation => "conversationId",
        }
    }

    pub fn entity(&self) -> EntityKind {
        match self {
            TaggedKind::Note => EntityKind::Note,
            TaggedKind::Task => EntityKind::Task,
            TaggedKind::Conversation => EntityKind::Conversation,
        }
    }
}

// --- Records ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auth {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub objective: String,
    pub progress_assessment: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub name: String,
}

/// One join-table row, whichever table it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagLink {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub owner_id: i64,
    pub tag_id: i64,
}

// --- Insert payloads (caller-settable fields only) ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInsert {
    pub username: String,
    pub password: String,
    pub url: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInsert {
    pub objective: String,
    pub progress_assessment: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteInsert {
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationInsert {
    pub content: String,
}

// --- Row decoding ---

fn text_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

/// `completed` is declared BOOLEAN, but anything can land there through the gateway.
fn bool_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(n) => n != 0,
        ValueRef::Real(f) => f != 0.0,
        ValueRef::Text(t) => matches!(t, b"true" | b"1"),
        ValueRef::Null | ValueRef::Blob(_) => false,
    })
}

fn auth_from_row(row: &Row<'_>) -> rusqlite::Result<Auth> {
    Ok(Auth {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        username: text_col(row, 3)?,
        password: text_col(row, 4)?,
        url: text_col(row, 5)?,
        notes: text_col(row, 6)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        objective: text_col(row, 3)?,
        progress_assessment: text_col(row, 4)?,
        completed: bool_col(row, 5)?,
    })
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        content: text_col(row, 3)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        content: text_col(row, 3)?,
    })
}

pub(crate) fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        name: row.get(3)?,
    })
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<TagLink> {
    Ok(TagLink {
        id: row.get(0)?,
        created_at: row.get(1)?,
        updated_at: row.get(2)?,
        owner_id: row.get(3)?,
        tag_id: row.get(4)?,
    })
}

// --- Inserts ---

pub fn insert_auth(conn: &Connection, auth: &AuthInsert) -> Result<i64, KipsError> {
    conn.query_row(
        "INSERT INTO auth(username, password, url, notes) VALUES(?1, ?2, ?3, ?4) RETURNING id",
        params![auth.username, auth.password, auth.url, auth.notes],
        |row| row.get(0),
    )
    .map_err(KipsError::from_sqlite)
}

pub fn insert_task(conn: &Connection, task: &TaskInsert) -> Result<i64, KipsError> {
    conn.query_row(
        "INSERT INTO tasks(objective, progressAssessment, completed) VALUES(?1, ?2, ?3) RETURNING id",
        params![task.objective, task.progress_assessment, task.completed],
        |row| row.get(0),
    )
    .map_err(KipsError::from_sqlite)
}

pub fn insert_note(conn: &Connection, note: &NoteInsert) -> Result<i64, KipsError> {
    conn.query_row(
        "INSERT INTO notes(content) VALUES(?1) RETURNING id",
        params![note.content],
        |row| row.get(0),
    )
    .map_err(KipsError::from_sqlite)
}

pub fn insert_conversation(
    conn: &Connection,
    conversation: &ConversationInsert,
) -> Result<i64, KipsError> {
    conn.query_row(
        "INSERT INTO conversations(content) VALUES(?1) RETURNING id",
        params![conversation.content],
        |row| row.get(0),
    )
    .map_err(KipsError::from_sqlite)
}

// --- Natural-key lookups (newest match wins) ---

pub fn find_auth(conn: &Connection, auth: &AuthInsert) -> Result<Option<i64>, KipsError> {
    let id = conn
        .query_row(
            "SELECT id FROM auth WHERE username = ?1 AND password = ?2 AND url = ?3 AND notes = ?4
             ORDER BY id DESC LIMIT 1",
            params![auth.username, auth.password, auth.url, auth.notes],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn find_task(conn: &Connection, task: &TaskInsert) -> Result<Option<i64>, KipsError> {
    let id = conn
        .query_row(
            "SELECT id FROM tasks WHERE objective = ?1 AND progressAssessment = ?2 AND completed = ?3
             ORDER BY id DESC LIMIT 1",
            params![task.objective, task.progress_assessment, task.completed],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn find_note(conn: &Connection, content: &str) -> Result<Option<i64>, KipsError> {
    let id = conn
        .query_row(
            "SELECT id FROM notes WHERE content = ?1 ORDER BY id DESC LIMIT 1",
            params![content],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn find_conversation(conn: &Connection, content: &str) -> Result<Option<i64>, KipsError> {
    let id = conn
        .query_row(
            "SELECT id FROM conversations WHERE content = ?1 ORDER BY id DESC LIMIT 1",
            params![content],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn find_tag(conn: &Connection, name: &str) -> Result<Option<i64>, KipsError> {
    let id = conn
        .query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(id)
}

// --- Reads by id ---

pub fn get_auth(conn: &Connection, id: i64) -> Result<Option<Auth>, KipsError> {
    let auth = conn
        .query_row(
            "SELECT id, createdAt, updatedAt, username, password, url, notes FROM auth WHERE id = ?1",
            params![id],
            auth_from_row,
        )
        .optional()?;
    Ok(auth)
}

pub fn get_task(conn: &Connection, id: i64) -> Result<Option<Task>, KipsError> {
    let task = conn
        .query_row(
            "SELECT id, createdAt, updatedAt, objective, progressAssessment, completed
             FROM tasks WHERE id = ?1",
            params![id],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

pub fn get_note(conn: &Connection, id: i64) -> Result<Option<Note>, KipsError> {
    let note = conn
        .query_row(
            "SELECT id, createdAt, updatedAt, content FROM notes WHERE id = ?1",
            params![id],
            note_from_row,
        )
        .optional()?;
    Ok(note)
}

pub fn get_conversation(conn: &Connection, id: i64) -> Result<Option<Conversation>, KipsError> {
    let conversation = conn
        .query_row(
            "SELECT id, createdAt, updatedAt, content FROM conversations WHERE id = ?1",
            params![id],
            conversation_from_row,
        )
        .optional()?;
    Ok(conversation)
}

pub fn get_tag(conn: &Connection, id: i64) -> Result<Option<Tag>, KipsError> {
    let tag = conn
        .query_row(
            "SELECT id, createdAt, updatedAt, name FROM tags WHERE id = ?1",
            params![id],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

/// Tags for a set of ids, in id order. Unknown ids are skipped.
pub fn tags_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<Tag>, KipsError> {
    let mut stmt = conn.prepare(
        "SELECT id, createdAt, updatedAt, name FROM tags
         WHERE id IN (SELECT value FROM json_each(?1)) ORDER BY id",
    )?;
    let ids_json = serde_json::to_string(ids)?;
    let rows = stmt.query_map(params![ids_json], tag_from_row)?;

    let mut results = Vec::new();
    for r in rows {
        results.push(r?);
    }
    Ok(results)
}

// --- Tag links ---

/// Link a tag to an entity. Returns `false` when the pair already existed.
///
/// A missing owner or tag surfaces as a constraint error from the foreign keys.
pub fn associate_tag(
    conn: &Connection,
    kind: TaggedKind,
    owner_id: i64,
    tag_id: i64,
) -> Result<bool, KipsError> {
    let sql = format!(
        "INSERT INTO {table}({owner}, tagId) VALUES(?1, ?2) ON CONFLICT({owner}, tagId) DO NOTHING",
        table = kind.join_table(),
        owner = kind.owner_column(),
    );
    let changed = conn
        .execute(&sql, params![owner_id, tag_id])
        .map_err(KipsError::from_sqlite)?;
    Ok(changed == 1)
}

pub fn links_for(
    conn: &Connection,
    kind: TaggedKind,
    owner_id: i64,
) -> Result<Vec<TagLink>, KipsError> {
    let sql = format!(
        "SELECT id, createdAt, updatedAt, {owner}, tagId FROM {table} WHERE {owner} = ?1 ORDER BY id",
        table = kind.join_table(),
        owner = kind.owner_column(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner_id], link_from_row)?;

    let mut results = Vec::new();
    for r in rows {
        results.push(r?);
    }
    Ok(results)
}

pub fn tags_for(conn: &Connection, kind: TaggedKind, owner_id: i64) -> Result<Vec<Tag>, KipsError> {
    let sql = format!(
        "SELECT t.id, t.createdAt, t.updatedAt, t.name FROM tags t
         JOIN {table} j ON j.tagId = t.id
         WHERE j.{owner} = ?1 ORDER BY t.id",
        table = kind.join_table(),
        owner = kind.owner_column(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner_id], tag_from_row)?;

    let mut results = Vec::new();
    for r in rows {
        results.push(r?);
    }
    Ok(results)
}

// --- Mutations ---

pub fn update_note_content(conn: &Connection, id: i64, content: &str) -> Result<bool, KipsError> {
    let changed = conn
        .execute(
            "UPDATE notes SET content = ?1 WHERE id = ?2",
            params![content, id],
        )
        .map_err(KipsError::from_sqlite)?;
    Ok(changed > 0)
}

pub fn update_conversation_content(
    conn: &Connection,
    id: i64,
    content: &str,
) -> Result<bool, KipsError> {
    let changed = conn
        .execute(
            "UPDATE conversations SET content = ?1 WHERE id = ?2",
            params![content, id],
        )
        .map_err(KipsError::from_sqlite)?;
    Ok(changed > 0)
}

pub fn update_task(
    conn: &Connection,
    id: i64,
    progress_assessment: &str,
    completed: bool,
) -> Result<bool, KipsError> {
    let changed = conn
        .execute(
            "UPDATE tasks SET progressAssessment = ?1, completed = ?2 WHERE id = ?3",
            params![progress_assessment, completed, id],
        )
        .map_err(KipsError::from_sqlite)?;
    Ok(changed > 0)
}

/// Delete one entity row; its join rows go with it through the cascade.
pub fn delete_entity(conn: &Connection, kind: EntityKind, id: i64) -> Result<bool, KipsError> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
    let changed = conn
        .execute(&sql, params![id])
        .map_err(KipsError::from_sqlite)?;
    Ok(changed > 0)
}

pub fn delete_tag(conn: &Connection, id: i64) -> Result<bool, KipsError> {
    let changed = conn
        .execute("DELETE FROM tags WHERE id = ?1", params![id])
        .map_err(KipsError::from_sqlite)?;
    Ok(changed > 0)
}
