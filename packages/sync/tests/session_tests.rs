//! Editing session tests: load, default creation, edit-to-save flow.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use storyforge_editor::{BlockKind, Command, KeyPress, Mark, Point, Selection};
use storyforge_sync::{
    EditingSession, Fields, MemoryDocumentStore, Record, SaveStatus, StoreError, StoreOp, SyncConfig, SyncError,
    DEFAULT_TITLE,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

async fn advance(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    settle().await;
}

fn config() -> SyncConfig {
    SyncConfig {
        debounce_ms: 1000,
        ..SyncConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn missing_document_is_created_once_with_default_content() {
    init_tracing();
    let store = MemoryDocumentStore::new();
    let shared: Arc<MemoryDocumentStore> = Arc::new(store.clone());

    let session = EditingSession::open(shared.clone(), "new-doc", &config()).await.unwrap();
    assert_eq!(session.title(), DEFAULT_TITLE);
    assert_eq!(session.status(), SaveStatus::Idle);

    let doc = session.editor().document();
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.blocks[0].kind, Some(BlockKind::Paragraph));
    assert_eq!(doc.blocks[0].children.len(), 1);
    assert_eq!(doc.blocks[0].children[0].text, "");

    let record = store.get("documents", "new-doc").await.unwrap();
    let content = record.get("content").unwrap();
    assert_eq!(content[0]["type"], json!("paragraph"));
    assert_eq!(content[0]["children"], json!([{ "text": "" }]));
    session.close();

    let reopened = EditingSession::open(shared, "new-doc", &config()).await.unwrap();
    assert_eq!(reopened.editor().document().blocks.len(), 1);
    assert_eq!(store.calls().await.set, 1);
    assert_eq!(store.calls().await.fetch, 2);
}

#[tokio::test(start_paused = true)]
async fn existing_document_loads_content_and_title() {
    let store = MemoryDocumentStore::new();
    let mut fields = Fields::new();
    fields.insert("title".into(), json!("The Long Night"));
    fields.insert(
        "content".into(),
        json!([{ "type": "heading-1", "align": "center", "children": [{ "text": "Prologue", "bold": true }] }]),
    );
    fields.insert("clientUpdatedAt".into(), json!("2024-05-01T12:00:00Z"));
    store.seed("documents", Record::new("d1", fields)).await;

    let session = EditingSession::open(Arc::new(store.clone()), "d1", &config()).await.unwrap();
    assert_eq!(session.title(), "The Long Night");
    assert_eq!(session.editor().document().plain_text(), "Prologue");
    assert!(session.editor().format().is_heading1);
    assert_eq!(
        session.updated_at().map(|at| at.to_rfc3339()),
        Some("2024-05-01T12:00:00+00:00".to_string())
    );
    assert_eq!(store.calls().await.set, 0);
}

#[tokio::test(start_paused = true)]
async fn typing_is_autosaved_after_the_debounce() {
    init_tracing();
    let store = MemoryDocumentStore::new();
    let mut session = EditingSession::open(Arc::new(store.clone()), "d1", &config()).await.unwrap();

    for text in ["H", "e", "l", "l", "o"] {
        session.apply(Command::InsertText { text: text.into() }).unwrap();
        advance(100).await;
    }
    assert_eq!(session.status(), SaveStatus::Saving);
    assert_eq!(store.calls().await.update, 0);

    session.apply(Command::SelectAll).unwrap();
    session.apply(Command::ToggleMark { mark: Mark::Bold }).unwrap();
    advance(1000).await;

    assert_eq!(session.status(), SaveStatus::Saved);
    assert_eq!(store.calls().await.update, 1);
    let record = store.get("documents", "d1").await.unwrap();
    assert_eq!(record.get("content").unwrap()[0]["children"], json!([{ "text": "Hello", "bold": true }]));
    assert_eq!(record.get_str("title"), Some(DEFAULT_TITLE));
}

#[tokio::test(start_paused = true)]
async fn selection_changes_do_not_schedule_saves() {
    let store = MemoryDocumentStore::new();
    let mut session = EditingSession::open(Arc::new(store.clone()), "d1", &config()).await.unwrap();

    let caret = Selection::caret(Point::new(0, 0, 0));
    session.apply(Command::Select { selection: caret }).unwrap();
    session.apply(Command::ToggleMark { mark: Mark::Italic }).unwrap();
    advance(5000).await;

    assert_eq!(session.status(), SaveStatus::Idle);
    assert_eq!(store.calls().await.update, 0);
}

#[tokio::test(start_paused = true)]
async fn save_shortcut_persists_immediately() {
    let store = MemoryDocumentStore::new();
    let mut session = EditingSession::open(Arc::new(store.clone()), "d1", &config()).await.unwrap();

    session.apply(Command::InsertText { text: "Draft".into() }).unwrap();
    session.rename("Chapter One").unwrap();

    let outcome = session.handle_key(KeyPress::ctrl('s')).await.unwrap();
    assert!(outcome.is_none());
    assert_eq!(session.status(), SaveStatus::Saved);

    let record = store.get("documents", "d1").await.unwrap();
    assert_eq!(record.get_str("title"), Some("Chapter One"));
    assert_eq!(store.calls().await.update, 1);

    let outcome = session.handle_key(KeyPress::meta('b')).await.unwrap();
    assert!(outcome.is_some());
}

#[tokio::test(start_paused = true)]
async fn store_outage_on_open_is_reported() {
    let store = MemoryDocumentStore::new();
    store.fail_next(StoreOp::Fetch, 1).await;

    let err = EditingSession::open(Arc::new(store), "d1", &config())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, SyncError::Store(StoreError::Unavailable(_))));
}
