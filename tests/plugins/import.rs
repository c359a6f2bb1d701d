use kips::core::error::KipsError;
use kips::core::store::Store;
use kips::plugins::entities::{self, EntityKind, TaggedKind};
use kips::plugins::import::{import_content, import_file};
use std::fs;
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

const TASKS_CSV: &str = "objective,progressAssessment,completed\n\
Ship v1,\"nearly, there\",false\n\
Write docs,,true\n";

#[test]
fn test_task_csv_with_tag() {
    let (_tmp, mut store) = test_store();
    let report = import_content(store.conn_mut(), EntityKind::Task, TASKS_CSV, &["work"]).unwrap();

    assert_eq!(report.record_ids.len(), 2);
    assert_eq!(report.tag_ids.len(), 1);
    assert_eq!(report.links_created, 2);
    assert_eq!(count(&store, "tasks"), 2);
    assert_eq!(count(&store, "tags"), 1);
    assert_eq!(count(&store, "taskTag"), 2);

    let first = entities::get_task(store.conn(), report.record_ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(first.objective, "Ship v1");
    assert_eq!(first.progress_assessment, "nearly, there");
    assert!(!first.completed);

    let second = entities::get_task(store.conn(), report.record_ids[1])
        .unwrap()
        .unwrap();
    assert_eq!(second.progress_assessment, "");
    assert!(second.completed);

    for id in &report.record_ids {
        let tags = entities::tags_for(store.conn(), TaggedKind::Task, *id).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "work");
    }
}

#[test]
fn test_task_headers_are_case_insensitive() {
    let (_tmp, mut store) = test_store();
    let csv = "OBJECTIVE,ProgressAssessment,Completed\nplan,started,true\n";
    let report = import_content::<&str>(store.conn_mut(), EntityKind::Task, csv, &[]).unwrap();
    let task = entities::get_task(store.conn(), report.record_ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(task.objective, "plan");
    assert_eq!(task.progress_assessment, "started");
    assert!(task.completed);
}

#[test]
fn test_completed_accepts_only_literal_true() {
    let (_tmp, mut store) = test_store();
    let csv = "objective,completed\na,TRUE\nb,1\nc,yes\nd, true \n";
    let report = import_content::<&str>(store.conn_mut(), EntityKind::Task, csv, &[]).unwrap();
    let flags: Vec<bool> = report
        .record_ids
        .iter()
        .map(|id| entities::get_task(store.conn(), *id).unwrap().unwrap().completed)
        .collect();
    assert_eq!(flags, vec![false, false, false, true]);
}

#[test]
fn test_auth_csv_normalizes_headers_and_ignores_tags() {
    let (_tmp, mut store) = test_store();
    let csv = "Username, PASSWORD ,url,Notes,extra\nalice,s3cret,https://a.example,,zz\nbob,hunter2,,shared,\n";
    let report = import_content(store.conn_mut(), EntityKind::Auth, csv, &["secret"]).unwrap();

    assert_eq!(report.record_ids.len(), 2);
    assert!(report.tag_ids.is_empty());
    assert_eq!(report.links_created, 0);
    assert_eq!(count(&store, "tags"), 0);

    let alice = entities::get_auth(store.conn(), report.record_ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(alice.username, "alice");
    assert_eq!(alice.password, "s3cret");
    assert_eq!(alice.url, "https://a.example");
    assert_eq!(alice.notes, "");

    let bob = entities::get_auth(store.conn(), report.record_ids[1])
        .unwrap()
        .unwrap();
    assert_eq!(bob.notes, "shared");
    assert_eq!(bob.url, "");
}

#[test]
fn test_note_import_stores_content_verbatim() {
    let (_tmp, mut store) = test_store();
    let content = "# Title\n\nline with, comma\n\"quoted\"\n";
    let report =
        import_content(store.conn_mut(), EntityKind::Note, content, &["ideas", "work"]).unwrap();

    assert_eq!(report.record_ids.len(), 1);
    assert_eq!(report.links_created, 2);
    let note = entities::get_note(store.conn(), report.record_ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(note.content, content);

    let names: Vec<String> = entities::tags_for(store.conn(), TaggedKind::Note, note.id)
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["ideas", "work"]);
}

#[test]
fn test_conversation_import_with_repeated_tag() {
    let (_tmp, mut store) = test_store();
    let report = import_content(
        store.conn_mut(),
        EntityKind::Conversation,
        "user: hi\nassistant: hello",
        &["chat", "chat"],
    )
    .unwrap();
    assert_eq!(report.tag_ids[0], report.tag_ids[1]);
    assert_eq!(report.links_created, 1);
    assert_eq!(count(&store, "conversationTag"), 1);
}

#[test]
fn test_header_only_csv_creates_nothing() {
    let (_tmp, mut store) = test_store();
    let report = import_content(
        store.conn_mut(),
        EntityKind::Task,
        "objective,progressAssessment,completed\n",
        &["work"],
    )
    .unwrap();
    assert!(report.record_ids.is_empty());
    assert_eq!(report.links_created, 0);
    assert_eq!(count(&store, "tasks"), 0);
}

#[test]
fn test_parse_error_rolls_back_everything() {
    let (_tmp, mut store) = test_store();
    let csv = "objective,completed\nfine,true\n\"broken,true\n";
    let err = import_content(store.conn_mut(), EntityKind::Task, csv, &["work"]).unwrap_err();
    assert!(matches!(err, KipsError::ParseError { .. }), "{err}");
    assert_eq!(count(&store, "tasks"), 0);
    assert_eq!(count(&store, "tags"), 0);
    assert_eq!(count(&store, "taskTag"), 0);
}

#[test]
fn test_too_many_fields_is_a_parse_error() {
    let (_tmp, mut store) = test_store();
    let csv = "username,password\nalice,pw,extra\n";
    let err = import_content::<&str>(store.conn_mut(), EntityKind::Auth, csv, &[]).unwrap_err();
    match err {
        KipsError::ParseError { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(count(&store, "auth"), 0);
}

#[test]
fn test_import_file_reads_from_disk() {
    let (tmp, mut store) = test_store();
    let path = tmp.path().join("tasks.csv");
    fs::write(&path, TASKS_CSV).unwrap();
    let report = import_file(store.conn_mut(), EntityKind::Task, &path, &["work"]).unwrap();
    assert_eq!(report.record_ids.len(), 2);

    let missing = tmp.path().join("missing.csv");
    let err = import_file::<&str>(store.conn_mut(), EntityKind::Task, &missing, &[]).unwrap_err();
    assert!(matches!(err, KipsError::IoError(_)), "{err}");
    assert_eq!(count(&store, "tasks"), 2);
}
