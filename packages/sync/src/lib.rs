//! # StoryForge Sync
//!
//! Persistence for the editor: store interfaces, debounced autosave,
//! image uploads and the relationship diagram layout.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ EditingSession                              │
//! │  - Editor (storyforge-editor)               │
//! │  - AutosavePipeline (one task per document) │
//! └─────────────────────────────────────────────┘
//!                     ↓ update(content, title)
//! ┌─────────────────────────────────────────────┐
//! │ DocumentStore / BlobStore (injected)        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Collaborators are passed in as `Arc<dyn DocumentStore>` and
//! `Arc<dyn BlobStore>`; the in-memory implementations are used by tests and
//! local tooling.
//!
//! Concurrent edits from several clients are not merged: the last completed
//! write wins.

mod autosave;
mod blob;
mod config;
mod errors;
mod layout;
mod library;
mod retry;
mod session;
mod store;

pub use autosave::{AutosavePipeline, DocumentSnapshot, SaveStatus};
pub use blob::{blob_path, validate_image, BlobStore, ImageFile, ImageUploader, MemoryBlobStore, MAX_IMAGE_BYTES};
pub use config::{SyncConfig, DEFAULT_CONFIG_NAME};
pub use errors::{StoreError, SyncError, UploadError};
pub use layout::{default_position, DiagramLayout, Edge, LayoutStore, Position, RELATIONSHIPS_COLLECTION};
pub use library::{summarize, DocumentLibrary, DocumentSummary};
pub use retry::RetryPolicy;
pub use session::{EditingSession, DEFAULT_TITLE};
pub use store::{
    CallCounts, DocumentStore, Fields, Filter, MemoryDocumentStore, Record, SnapshotResult, StoreOp,
    Subscription, WriteLog, CLIENT_UPDATED_AT,
};
