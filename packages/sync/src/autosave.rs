//! # Autosave
//!
//! Debounced persistence of one document.
//!
//! ```text
//! notify_change ──► [task] ──(debounce elapsed / save_now)──► DocumentStore::update
//!      │                                                           │
//!      └────────── status: Saving ◄──────────── Saved / Error ◄────┘
//! ```
//!
//! ## Design
//!
//! - Each pipeline owns one background task; every persist for the document
//!   runs on it, so writes never overlap and land in order
//! - Every change restarts the debounce timer from the moment it was
//!   reported and replaces the pending snapshot, so a burst of edits is
//!   written once with the last content
//! - Changes carry a revision number; a revision that is already stored is
//!   never written again
//! - Status is published on a `watch` channel. `Saving` is set as soon as a
//!   change is reported; `Saved` only once the newest revision is stored
//! - A failed write reports `Error` and keeps the snapshot; the next change
//!   or a manual save tries again
//! - `close` drops any pending debounce. A write already in flight finishes,
//!   but nothing is published afterwards

use crate::errors::SyncError;
use crate::store::{DocumentStore, Fields, CLIENT_UPDATED_AT};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Save state shown next to the document title
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "camelCase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error(String),
}

impl SaveStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SaveStatus::Error(_))
    }
}

/// Document fields written by one save
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub content: Value,
    pub title: Option<String>,
}

impl DocumentSnapshot {
    fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("content".to_string(), self.content.clone());
        if let Some(title) = &self.title {
            fields.insert("title".to_string(), Value::String(title.clone()));
        }
        fields.insert(CLIENT_UPDATED_AT.to_string(), Value::String(Utc::now().to_rfc3339()));
        fields
    }
}

struct Revision {
    number: u64,
    /// When the edit was reported; the debounce window starts here.
    at: Instant,
    snapshot: DocumentSnapshot,
}

enum Message {
    Changed(Revision),
    SaveNow(oneshot::Sender<Result<(), SyncError>>),
    Close,
}

/// State shared between the pipeline handle and its task
struct Shared {
    status: watch::Sender<SaveStatus>,

    /// Cleared by `close`; nothing is published afterwards
    live: AtomicBool,

    /// Newest revision reported through `notify_change`
    latest: AtomicU64,
}

impl Shared {
    fn publish(&self, status: SaveStatus) {
        if self.live.load(Ordering::SeqCst) {
            self.status.send_replace(status);
        }
    }
}

/// Handle to a document's autosave task
pub struct AutosavePipeline {
    document_id: String,
    tx: mpsc::UnboundedSender<Message>,
    shared: Arc<Shared>,
}

impl AutosavePipeline {
    /// Start the autosave task for `document_id`. Must be called inside a
    /// tokio runtime.
    pub fn spawn(
        store: Arc<dyn DocumentStore>,
        collection: impl Into<String>,
        document_id: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        let document_id = document_id.into();
        let (status, _) = watch::channel(SaveStatus::Idle);
        let shared = Arc::new(Shared {
            status,
            live: AtomicBool::new(true),
            latest: AtomicU64::new(0),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = Worker {
            store,
            collection: collection.into(),
            document_id: document_id.clone(),
            debounce,
            shared: shared.clone(),
            pending: None,
            saved: 0,
        };
        tokio::spawn(worker.run(rx));

        Self {
            document_id,
            tx,
            shared,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn status(&self) -> SaveStatus {
        self.shared.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SaveStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        !self.shared.live.load(Ordering::SeqCst)
    }

    /// Report new document content. Sets `Saving` and restarts the debounce
    /// from now, even when the task is busy with an earlier write.
    pub fn notify_change(&self, content: Value, title: Option<String>) -> Result<(), SyncError> {
        if self.is_closed() {
            return Err(SyncError::Closed);
        }

        let number = self.shared.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.publish(SaveStatus::Saving);
        self.tx
            .send(Message::Changed(Revision {
                number,
                at: Instant::now(),
                snapshot: DocumentSnapshot { content, title },
            }))
            .map_err(|_| SyncError::Closed)
    }

    /// Persist the pending change now instead of waiting for the debounce.
    pub async fn save_now(&self) -> Result<(), SyncError> {
        if self.is_closed() {
            return Err(SyncError::Closed);
        }

        let (reply, result) = oneshot::channel();
        self.tx
            .send(Message::SaveNow(reply))
            .map_err(|_| SyncError::Closed)?;
        result.await.map_err(|_| SyncError::Closed)?
    }

    /// Stop the task. A pending debounce is dropped.
    pub fn close(&self) {
        if self.shared.live.swap(false, Ordering::SeqCst) {
            tracing::debug!(document = %self.document_id, "Closing autosave");
            let _ = self.tx.send(Message::Close);
        }
    }
}

impl Drop for AutosavePipeline {
    fn drop(&mut self) {
        self.close();
    }
}

struct Worker {
    store: Arc<dyn DocumentStore>,
    collection: String,
    document_id: String,
    debounce: Duration,
    shared: Arc<Shared>,
    pending: Option<Revision>,
    saved: u64,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message>) {
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                message = rx.recv() => match message {
                    Some(Message::Changed(revision)) => {
                        deadline = Some(revision.at + self.debounce);
                        self.pending = Some(revision);
                    }
                    Some(Message::SaveNow(reply)) => {
                        deadline = None;
                        let _ = reply.send(self.flush().await);
                    }
                    Some(Message::Close) | None => break,
                },

                _ = async {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    deadline = None;
                    // Failures are reported through the status channel.
                    let _ = self.flush().await;
                }
            }
        }

        tracing::debug!(document = %self.document_id, "Autosave task stopped");
    }

    async fn flush(&mut self) -> Result<(), SyncError> {
        let revision = match self.pending.take() {
            Some(revision) if revision.number > self.saved => revision,
            _ => {
                self.publish_settled();
                return Ok(());
            }
        };

        tracing::debug!(document = %self.document_id, revision = revision.number, "Persisting document");
        let fields = revision.snapshot.to_fields();

        match self.store.update(&self.collection, &self.document_id, fields).await {
            Ok(()) => {
                self.saved = revision.number;
                tracing::info!(document = %self.document_id, revision = revision.number, "Saved document");
                self.publish_settled();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    document = %self.document_id,
                    revision = revision.number,
                    error = %e,
                    "Autosave failed"
                );
                self.shared.publish(SaveStatus::Error(e.to_string()));
                self.pending = Some(revision);
                Err(SyncError::Store(e))
            }
        }
    }

    /// Publish `Saved` unless a newer change is still on its way.
    fn publish_settled(&self) {
        if self.shared.latest.load(Ordering::SeqCst) <= self.saved {
            self.shared.publish(SaveStatus::Saved);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryDocumentStore, Record};
    use serde_json::json;

    #[test]
    fn test_status_serializes_with_message() {
        assert_eq!(serde_json::to_value(SaveStatus::Saved).unwrap(), json!({ "state": "saved" }));
        assert_eq!(
            serde_json::to_value(SaveStatus::Error("offline".into())).unwrap(),
            json!({ "state": "error", "message": "offline" })
        );
    }

    #[test]
    fn test_snapshot_fields() {
        let snapshot = DocumentSnapshot {
            content: json!([]),
            title: Some("Chapter 1".into()),
        };
        let fields = snapshot.to_fields();
        assert_eq!(fields["content"], json!([]));
        assert_eq!(fields["title"], json!("Chapter 1"));
        assert!(fields.contains_key(CLIENT_UPDATED_AT));

        let untitled = DocumentSnapshot {
            content: json!([]),
            title: None,
        };
        assert!(!untitled.to_fields().contains_key("title"));
    }

    #[tokio::test]
    async fn test_save_now_without_changes_skips_store() {
        let store = MemoryDocumentStore::new();
        store.seed("documents", Record::new("d1", Fields::new())).await;
        let pipeline = AutosavePipeline::spawn(Arc::new(store.clone()), "documents", "d1", Duration::from_secs(2));

        assert_eq!(pipeline.status(), SaveStatus::Idle);
        pipeline.save_now().await.unwrap();
        assert_eq!(pipeline.status(), SaveStatus::Saved);
        assert_eq!(store.calls().await.update, 0);
    }

    #[tokio::test]
    async fn test_closed_pipeline_rejects_changes() {
        let store = MemoryDocumentStore::new();
        let pipeline = AutosavePipeline::spawn(Arc::new(store), "documents", "d1", Duration::from_secs(2));

        pipeline.close();
        assert!(pipeline.is_closed());
        assert!(matches!(pipeline.notify_change(json!([]), None), Err(SyncError::Closed)));
        assert!(matches!(pipeline.save_now().await, Err(SyncError::Closed)));
    }
}
