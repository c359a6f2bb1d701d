//! Centralized schema definitions for the kips store.
//!
//! One database file holds eight tables:
//! 1. Entities: `auth`, `tasks`, `notes`, `conversations`.
//! 2. Labels: `tags` (unique names).
//! 3. Join tables: `noteTag`, `taskTag`, `conversationTag`, cascading on both sides.
//!
//! Every statement is `IF NOT EXISTS`, so applying the whole set is idempotent.
//! Schema changes are additive only: append new statements, never edit old ones.

pub const AUTH_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS auth (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        createdAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updatedAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        username TEXT,
        password TEXT,
        url TEXT,
        notes TEXT
    )
";

pub const TASKS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        createdAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updatedAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        objective TEXT,
        progressAssessment TEXT,
        completed BOOLEAN
    )
";

pub const NOTES_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        createdAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updatedAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        content TEXT
    )
";

pub const CONVERSATIONS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        createdAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updatedAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        content TEXT
    )
";

pub const TAGS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        createdAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updatedAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        name TEXT NOT NULL UNIQUE
    )
";

pub const NOTE_TAG_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS noteTag (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        createdAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updatedAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        noteId INTEGER NOT NULL,
        tagId INTEGER NOT NULL,
        FOREIGN KEY(noteId) REFERENCES notes(id) ON DELETE CASCADE,
        FOREIGN KEY(tagId) REFERENCES tags(id) ON DELETE CASCADE,
        UNIQUE(noteId, tagId)
    )
";

pub const TASK_TAG_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS taskTag (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        createdAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updatedAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        taskId INTEGER NOT NULL,
        tagId INTEGER NOT NULL,
        FOREIGN KEY(taskId) REFERENCES tasks(id) ON DELETE CASCADE,
        FOREIGN KEY(tagId) REFERENCES tags(id) ON DELETE CASCADE,
        UNIQUE(taskId, tagId)
    )
";

pub const CONVERSATION_TAG_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS conversationTag (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        createdAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updatedAt DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        conversationId INTEGER NOT NULL,
        tagId INTEGER NOT NULL,
        FOREIGN KEY(conversationId) REFERENCES conversations(id) ON DELETE CASCADE,
        FOREIGN KEY(tagId) REFERENCES tags(id) ON DELETE CASCADE,
        UNIQUE(conversationId, tagId)
    )
";

pub const TAGS_NAME_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_tags_name ON tags(name)";
pub const NOTE_TAG_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_noteTag_noteId ON noteTag(noteId, tagId)";
pub const TASK_TAG_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_taskTag_taskId ON taskTag(taskId, tagId)";
pub const CONVERSATION_TAG_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_conversationTag_conversationId ON conversationTag(conversationId, tagId)";

/// One table and the statements that belong to it.
pub(crate) struct TableSchema {
    pub name: &'static str,
    pub create: &'static str,
    pub indexes: &'static [&'static str],
}

/// Creation order matters: join tables reference their owners and `tags`.
pub(crate) const TABLES: &[TableSchema] = &[
    TableSchema { name: "auth", create: AUTH_TABLE, indexes: &[] },
    TableSchema { name: "tasks", create: TASKS_TABLE, indexes: &[] },
    TableSchema { name: "notes", create: NOTES_TABLE, indexes: &[] },
    TableSchema { name: "conversations", create: CONVERSATIONS_TABLE, indexes: &[] },
    TableSchema { name: "tags", create: TAGS_TABLE, indexes: &[TAGS_NAME_INDEX] },
    TableSchema { name: "noteTag", create: NOTE_TAG_TABLE, indexes: &[NOTE_TAG_INDEX] },
    TableSchema { name: "taskTag", create: TASK_TAG_TABLE, indexes: &[TASK_TAG_INDEX] },
    TableSchema {
        name: "conversationTag",
        create: CONVERSATION_TAG_TABLE,
        indexes: &[CONVERSATION_TAG_INDEX],
    },
];

/// `updatedAt` refresh trigger for one table.
///
/// The new value is `max(now, OLD.updatedAt + 1ms)` so that two updates inside the same
/// millisecond still advance the column. Recursive triggers are off, so the inner
/// UPDATE does not fire the trigger again.
pub fn update_timestamp_trigger(table: &str) -> String {
    format!(
        "CREATE TRIGGER IF NOT EXISTS {table}_update_timestamp AFTER UPDATE ON {table}
         BEGIN
             UPDATE {table}
             SET updatedAt = strftime('%Y-%m-%d %H:%M:%f',
                 MAX(julianday('now'), COALESCE(julianday(OLD.updatedAt), 0) + 0.001 / 86400.0))
             WHERE id = OLD.id;
         END"
    )
}

pub fn table_names() -> Vec<&'static str> {
    TABLES.iter().map(|t| t.name).collect()
}
