use kips::core::store::{Store, ensure_schema};
use kips::plugins::entities::{
    self, AuthInsert, ConversationInsert, EntityKind, NoteInsert, TaggedKind, TaskInsert,
};
use kips::plugins::tags::resolve_tag;
use rusqlite::params;
use std::thread::sleep;
use std::time::Duration;
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::open(&tmp.path().join("kips.db"), 5_000).unwrap();
    (tmp, store)
}

fn count(store: &Store, table: &str) -> i64 {
    store
        .conn()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap()
}

fn insert_owner(store: &Store, kind: TaggedKind) -> i64 {
    match kind {
        TaggedKind::Note => entities::insert_note(
            store.conn(),
            &NoteInsert {
                content: "note".into(),
            },
        ),
        TaggedKind::Task => entities::insert_task(
            store.conn(),
            &TaskInsert {
                objective: "task".into(),
                ..Default::default()
            },
        ),
        TaggedKind::Conversation => entities::insert_conversation(
            store.conn(),
            &ConversationInsert {
                content: "conversation".into(),
            },
        ),
    }
    .unwrap()
}

#[test]
fn test_open_enables_wal_and_foreign_keys() {
    let (_tmp, store) = test_store();
    let mode: String = store
        .conn()
        .query_row("PRAGMA journal_mode", [], |r| r.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
    let fk: i64 = store
        .conn()
        .query_row("PRAGMA foreign_keys", [], |r| r.get(0))
        .unwrap();
    assert_eq!(fk, 1);
}

#[test]
fn test_ensure_schema_is_idempotent() {
    let (tmp, store) = test_store();
    let id = entities::insert_note(
        store.conn(),
        &NoteInsert {
            content: "kept".into(),
        },
    )
    .unwrap();
    ensure_schema(store.conn()).unwrap();
    store.close().unwrap();

    let reopened = Store::open(&tmp.path().join("kips.db"), 5_000).unwrap();
    let note = entities::get_note(reopened.conn(), id).unwrap().unwrap();
    assert_eq!(note.content, "kept");
}

#[test]
fn test_insert_and_get_round_trip_fields() {
    let (_tmp, store) = test_store();
    let auth_id = entities::insert_auth(
        store.conn(),
        &AuthInsert {
            username: "alice".into(),
            password: "pw".into(),
            url: "https://example.com".into(),
            notes: String::new(),
        },
    )
    .unwrap();
    let auth = entities::get_auth(store.conn(), auth_id).unwrap().unwrap();
    assert_eq!(auth.username, "alice");
    assert_eq!(auth.notes, "");
    assert!(!auth.created_at.is_empty());

    let task_id = entities::insert_task(
        store.conn(),
        &TaskInsert {
            objective: "ship".into(),
            progress_assessment: "close".into(),
            completed: true,
        },
    )
    .unwrap();
    let task = entities::get_task(store.conn(), task_id).unwrap().unwrap();
    assert!(task.completed);
    assert_eq!(task.progress_assessment, "close");
    assert!(entities::get_task(store.conn(), task_id + 100).unwrap().is_none());
}

#[test]
fn test_associate_twice_keeps_one_row() {
    let (_tmp, store) = test_store();
    let note = insert_owner(&store, TaggedKind::Note);
    let tag = resolve_tag(store.conn(), "x").unwrap();
    assert!(entities::associate_tag(store.conn(), TaggedKind::Note, note, tag).unwrap());
    assert!(!entities::associate_tag(store.conn(), TaggedKind::Note, note, tag).unwrap());
    assert_eq!(count(&store, "noteTag"), 1);

    let links = entities::links_for(store.conn(), TaggedKind::Note, note).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].tag_id, tag);
    assert_eq!(links[0].owner_id, note);
}

#[test]
fn test_associate_missing_owner_is_constraint_error() {
    let (_tmp, store) = test_store();
    let tag = resolve_tag(store.conn(), "x").unwrap();
    let err = entities::associate_tag(store.conn(), TaggedKind::Task, 999, tag).unwrap_err();
    assert!(err.is_constraint(), "{err}");
    assert_eq!(count(&store, "taskTag"), 0);
}

#[test]
fn test_deleting_owner_cascades_to_links() {
    let (_tmp, store) = test_store();
    for kind in TaggedKind::ALL {
        let owner = insert_owner(&store, kind);
        let tag = resolve_tag(store.conn(), "cascade").unwrap();
        entities::associate_tag(store.conn(), kind, owner, tag).unwrap();
        assert_eq!(count(&store, kind.join_table()), 1);

        assert!(entities::delete_entity(store.conn(), kind.entity(), owner).unwrap());
        assert_eq!(count(&store, kind.join_table()), 0, "{}", kind.join_table());
        assert!(entities::get_tag(store.conn(), tag).unwrap().is_some());
    }
}

#[test]
fn test_deleting_tag_cascades_to_links() {
    let (_tmp, store) = test_store();
    let tag = resolve_tag(store.conn(), "gone").unwrap();
    let mut owners = Vec::new();
    for kind in TaggedKind::ALL {
        let owner = insert_owner(&store, kind);
        entities::associate_tag(store.conn(), kind, owner, tag).unwrap();
        owners.push((kind, owner));
    }

    assert!(entities::delete_tag(store.conn(), tag).unwrap());
    for (kind, owner) in owners {
        assert_eq!(count(&store, kind.join_table()), 0);
        assert!(
            entities::tags_for(store.conn(), kind, owner)
                .unwrap()
                .is_empty()
        );
    }
    assert_eq!(count(&store, "notes"), 1);
    assert_eq!(count(&store, "tasks"), 1);
    assert_eq!(count(&store, "conversations"), 1);
}

#[test]
fn test_delete_missing_row_reports_false() {
    let (_tmp, store) = test_store();
    assert!(!entities::delete_entity(store.conn(), EntityKind::Auth, 42).unwrap());
    assert!(!entities::delete_tag(store.conn(), 42).unwrap());
}

#[test]
fn test_updated_at_equals_created_at_on_insert() {
    let (_tmp, store) = test_store();
    let id = insert_owner(&store, TaggedKind::Note);
    let note = entities::get_note(store.conn(), id).unwrap().unwrap();
    assert_eq!(note.created_at, note.updated_at);
}

#[test]
fn test_updated_at_strictly_increases_on_update() {
    let (_tmp, store) = test_store();
    let id = insert_owner(&store, TaggedKind::Task);
    let before = entities::get_task(store.conn(), id).unwrap().unwrap();

    assert!(entities::update_task(store.conn(), id, "halfway", false).unwrap());
    let first = entities::get_task(store.conn(), id).unwrap().unwrap();
    assert!(first.updated_at > before.updated_at);
    assert_eq!(first.created_at, before.created_at);
    assert_eq!(first.progress_assessment, "halfway");

    // Back-to-back updates inside the same millisecond still move forward.
    assert!(entities::update_task(store.conn(), id, "done", true).unwrap());
    let second = entities::get_task(store.conn(), id).unwrap().unwrap();
    assert!(second.updated_at > first.updated_at);
    assert!(second.completed);
}

#[test]
fn test_updated_at_trigger_covers_every_table() {
    let (_tmp, store) = test_store();
    let note = insert_owner(&store, TaggedKind::Note);
    let tag = resolve_tag(store.conn(), "t").unwrap();
    entities::associate_tag(store.conn(), TaggedKind::Note, note, tag).unwrap();
    entities::insert_auth(store.conn(), &AuthInsert::default()).unwrap();
    insert_owner(&store, TaggedKind::Task);
    insert_owner(&store, TaggedKind::Conversation);
    let conv = insert_owner(&store, TaggedKind::Conversation);
    let task = insert_owner(&store, TaggedKind::Task);
    entities::associate_tag(store.conn(), TaggedKind::Task, task, tag).unwrap();
    entities::associate_tag(store.conn(), TaggedKind::Conversation, conv, tag).unwrap();

    sleep(Duration::from_millis(5));
    for table in [
        "auth",
        "tasks",
        "notes",
        "conversations",
        "tags",
        "noteTag",
        "taskTag",
        "conversationTag",
    ] {
        let (before, id): (String, i64) = store
            .conn()
            .query_row(
                &format!("SELECT updatedAt, id FROM {} ORDER BY id LIMIT 1", table),
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        store
            .conn()
            .execute(
                &format!("UPDATE {} SET createdAt = createdAt WHERE id = ?1", table),
                params![id],
            )
            .unwrap();
        let after: String = store
            .conn()
            .query_row(
                &format!("SELECT updatedAt FROM {} WHERE id = ?1", table),
                params![id],
                |r| r.get(0),
            )
            .unwrap();
        assert!(after > before, "{table}: {after} <= {before}");
    }
}

#[test]
fn test_content_updates() {
    let (_tmp, store) = test_store();
    let note = insert_owner(&store, TaggedKind::Note);
    let conv = insert_owner(&store, TaggedKind::Conversation);
    assert!(entities::update_note_content(store.conn(), note, "edited").unwrap());
    assert!(entities::update_conversation_content(store.conn(), conv, "edited").unwrap());
    assert!(!entities::update_note_content(store.conn(), note + 50, "x").unwrap());
    assert_eq!(
        entities::get_note(store.conn(), note).unwrap().unwrap().content,
        "edited"
    );
    assert_eq!(
        entities::get_conversation(store.conn(), conv)
            .unwrap()
            .unwrap()
            .content,
        "edited"
    );
}

#[test]
fn test_tags_by_ids_returns_requested_rows() {
    let (_tmp, store) = test_store();
    let a = resolve_tag(store.conn(), "a").unwrap();
    let _b = resolve_tag(store.conn(), "b").unwrap();
    let c = resolve_tag(store.conn(), "c").unwrap();
    let tags = entities::tags_by_ids(store.conn(), &[a, c]).unwrap();
    let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["a", "c"]);
    assert!(entities::tags_by_ids(store.conn(), &[]).unwrap().is_empty());
}

#[test]
fn test_find_by_natural_key_hit_and_miss() {
    let (_tmp, store) = test_store();
    let auth = AuthInsert {
        username: "alice".into(),
        password: "pw".into(),
        url: "https://a.example".into(),
        notes: String::new(),
    };
    let auth_id = entities::insert_auth(store.conn(), &auth).unwrap();
    assert_eq!(entities::find_auth(store.conn(), &auth).unwrap(), Some(auth_id));
    let other = AuthInsert {
        password: "different".into(),
        ..auth.clone()
    };
    assert_eq!(entities::find_auth(store.conn(), &other).unwrap(), None);

    let task = TaskInsert {
        objective: "ship".into(),
        progress_assessment: "started".into(),
        completed: false,
    };
    let task_id = entities::insert_task(store.conn(), &task).unwrap();
    assert_eq!(entities::find_task(store.conn(), &task).unwrap(), Some(task_id));
    let done = TaskInsert {
        completed: true,
        ..task.clone()
    };
    assert_eq!(entities::find_task(store.conn(), &done).unwrap(), None);

    let note_id = entities::insert_note(
        store.conn(),
        &NoteInsert {
            content: "remember".into(),
        },
    )
    .unwrap();
    assert_eq!(entities::find_note(store.conn(), "remember").unwrap(), Some(note_id));
    assert_eq!(entities::find_note(store.conn(), "forget").unwrap(), None);

    let conv_id = entities::insert_conversation(
        store.conn(),
        &ConversationInsert {
            content: "hi".into(),
        },
    )
    .unwrap();
    assert_eq!(
        entities::find_conversation(store.conn(), "hi").unwrap(),
        Some(conv_id)
    );
    assert_eq!(entities::find_conversation(store.conn(), "bye").unwrap(), None);
}

#[test]
fn test_find_by_natural_key_prefers_newest_duplicate() {
    let (_tmp, store) = test_store();
    let note = NoteInsert {
        content: "same".into(),
    };
    let first = entities::insert_note(store.conn(), &note).unwrap();
    let second = entities::insert_note(store.conn(), &note).unwrap();
    assert!(second > first);
    assert_eq!(entities::find_note(store.conn(), "same").unwrap(), Some(second));

    let conv = ConversationInsert {
        content: "again".into(),
    };
    entities::insert_conversation(store.conn(), &conv).unwrap();
    let newest = entities::insert_conversation(store.conn(), &conv).unwrap();
    assert_eq!(
        entities::find_conversation(store.conn(), "again").unwrap(),
        Some(newest)
    );

    let task = TaskInsert {
        objective: "repeat".into(),
        ..Default::default()
    };
    entities::insert_task(store.conn(), &task).unwrap();
    let newest_task = entities::insert_task(store.conn(), &task).unwrap();
    assert_eq!(entities::find_task(store.conn(), &task).unwrap(), Some(newest_task));

    entities::insert_auth(store.conn(), &AuthInsert::default()).unwrap();
    let newest_auth = entities::insert_auth(store.conn(), &AuthInsert::default()).unwrap();
    assert_eq!(
        entities::find_auth(store.conn(), &AuthInsert::default()).unwrap(),
        Some(newest_auth)
    );
}
