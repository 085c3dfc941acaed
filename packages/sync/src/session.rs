//! # Editing Session
//!
//! Ties an [`Editor`] to its stored record and autosave pipeline.
//!
//! ## Lifecycle
//!
//! 1. `open` fetches the record. A missing record is not an error: the
//!    session starts from the initial document and stores it once
//! 2. Every command that changes content hands the new content to the
//!    autosave pipeline
//! 3. `close` stops autosave; unsaved changes still in the debounce window
//!    are dropped, so callers that care call `save_now` first

use crate::autosave::{AutosavePipeline, SaveStatus};
use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::store::{DocumentStore, Fields, CLIENT_UPDATED_AT};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use storyforge_editor::{shortcut_for, Command, CommandOutcome, Document, Editor, KeyPress, Shortcut};
use tokio::sync::watch;

pub const DEFAULT_TITLE: &str = "Untitled";

/// One open document
pub struct EditingSession {
    id: String,
    title: String,
    updated_at: Option<DateTime<Utc>>,
    editor: Editor,
    autosave: AutosavePipeline,
}

impl EditingSession {
    pub async fn open(
        store: Arc<dyn DocumentStore>,
        id: &str,
        config: &SyncConfig,
    ) -> Result<Self, SyncError> {
        let record = store.fetch(&config.collection, id).await?;

        let (editor, title, updated_at) = match record {
            Some(record) => {
                let document = Document::from_stored(record.get("content"));
                let title = record.get_str("title").unwrap_or(DEFAULT_TITLE).to_string();
                let editor = Editor::new(document)?;
                tracing::info!(document = %id, "Opened document");
                (editor, title, record.updated_at())
            }
            None => {
                let editor = Editor::new(Document::initial())?;
                let now = Utc::now();

                let mut fields = Fields::new();
                fields.insert("content".to_string(), editor.content()?);
                fields.insert("title".to_string(), Value::String(DEFAULT_TITLE.to_string()));
                fields.insert(CLIENT_UPDATED_AT.to_string(), Value::String(now.to_rfc3339()));
                store.set(&config.collection, id, fields).await?;

                tracing::info!(document = %id, "Document not found, stored a new default document");
                (editor, DEFAULT_TITLE.to_string(), Some(now))
            }
        };

        let autosave = AutosavePipeline::spawn(store, config.collection.clone(), id, config.debounce());
        Ok(Self {
            id: id.to_string(),
            title,
            updated_at,
            editor: editor.with_history_depth(config.history_depth),
            autosave,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Last modification time known when the session was opened.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn status(&self) -> SaveStatus {
        self.autosave.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<SaveStatus> {
        self.autosave.watch_status()
    }

    /// Apply a command and schedule a save when content changed.
    pub fn apply(&mut self, command: Command) -> Result<CommandOutcome, SyncError> {
        let outcome = self.editor.apply(command)?;
        if outcome.changed {
            self.autosave
                .notify_change(self.editor.content()?, Some(self.title.clone()))?;
        }
        Ok(outcome)
    }

    pub fn rename(&mut self, title: impl Into<String>) -> Result<(), SyncError> {
        self.title = title.into();
        self.autosave
            .notify_change(self.editor.content()?, Some(self.title.clone()))
    }

    /// Handle a key press. Returns the command outcome for bound commands,
    /// `None` for the save shortcut and unbound keys.
    pub async fn handle_key(&mut self, press: KeyPress) -> Result<Option<CommandOutcome>, SyncError> {
        match shortcut_for(&press) {
            Some(Shortcut::Command(command)) => self.apply(command).map(Some),
            Some(Shortcut::Save) => {
                self.save_now().await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub async fn save_now(&self) -> Result<(), SyncError> {
        self.autosave.save_now().await
    }

    pub fn close(self) {
        tracing::debug!(document = %self.id, "Closing editing session");
        self.autosave.close();
    }
}
