//! # Document Store
//!
//! Records live in named collections and are addressed by id. Field values
//! are plain JSON; the store owns the `createdAt`/`updatedAt` timestamps and
//! stamps them on every write.
//!
//! [`MemoryDocumentStore`] keeps everything in process. It counts calls per
//! operation, logs writes with the tokio clock, and can be told to fail the
//! next N calls of an operation.

use crate::errors::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Client-clock timestamp written next to the store-managed `updatedAt`.
pub const CLIENT_UPDATED_AT: &str = "clientUpdatedAt";

/// Field values of a record
pub type Fields = serde_json::Map<String, Value>;

/// A stored record
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Last modification time: the store timestamp when present, otherwise
    /// the client-side `clientUpdatedAt` string.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or_else(|| {
            self.get_str(CLIENT_UPDATED_AT)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|at| at.with_timezone(&Utc))
        })
    }
}

/// Which records a subscription receives.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub collection: String,
    pub field_equals: Vec<(String, Value)>,
}

impl Filter {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field_equals: Vec::new(),
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field_equals.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, collection: &str, record: &Record) -> bool {
        self.collection == collection
            && self
                .field_equals
                .iter()
                .all(|(field, value)| record.get(field) == Some(value))
    }
}

/// Snapshot or error delivered to a subscriber
pub type SnapshotResult = Result<Vec<Record>, StoreError>;

/// Live query over a collection.
///
/// Yields the full set of matching records once on subscribe and again after
/// every change to the collection. Dropping the subscription, or calling
/// [`Subscription::unsubscribe`], ends it.
pub struct Subscription {
    inner: UnboundedReceiverStream<SnapshotResult>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<SnapshotResult>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
        }
    }

    pub fn unsubscribe(mut self) {
        self.inner.close();
    }
}

impl Stream for Subscription {
    type Item = SnapshotResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Record storage used for documents, layouts and other app data.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a record. A missing record is `Ok(None)`.
    async fn fetch(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError>;

    /// Create a record under a generated id.
    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StoreError>;

    /// Create or replace the record at `id`.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    /// Merge `fields` into an existing record.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError>;

    async fn subscribe(&self, filter: Filter) -> Result<Subscription, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// Store operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Fetch,
    Create,
    Set,
    Update,
    Subscribe,
    Delete,
}

/// Calls made to a [`MemoryDocumentStore`], including failed ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetch: usize,
    pub create: usize,
    pub set: usize,
    pub update: usize,
    pub subscribe: usize,
    pub delete: usize,
}

impl CallCounts {
    fn bump(&mut self, op: StoreOp) {
        match op {
            StoreOp::Fetch => self.fetch += 1,
            StoreOp::Create => self.create += 1,
            StoreOp::Set => self.set += 1,
            StoreOp::Update => self.update += 1,
            StoreOp::Subscribe => self.subscribe += 1,
            StoreOp::Delete => self.delete += 1,
        }
    }

    pub fn writes(&self) -> usize {
        self.create + self.set + self.update + self.delete
    }
}

/// A successful write, as logged by [`MemoryDocumentStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteLog {
    pub op: StoreOp,
    pub collection: String,
    pub id: String,
    pub fields: Fields,
    pub at: tokio::time::Instant,
}

struct Subscriber {
    filter: Filter,
    tx: mpsc::UnboundedSender<SnapshotResult>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, HashMap<String, Record>>,
    subscribers: Vec<Subscriber>,
    calls: CallCounts,
    failures: HashMap<StoreOp, usize>,
    writes: Vec<WriteLog>,
}

impl Inner {
    /// Count the call and consume an injected failure, if any.
    fn begin(&mut self, op: StoreOp) -> Result<(), StoreError> {
        self.calls.bump(op);
        match self.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Unavailable(format!("injected {:?} failure", op)))
            }
            _ => Ok(()),
        }
    }

    fn snapshot(&self, filter: &Filter) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .records
            .get(&filter.collection)
            .into_iter()
            .flat_map(|records| records.values())
            .filter(|record| filter.matches(&filter.collection, record))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    fn notify(&mut self, collection: &str) {
        let snapshots: Vec<Option<Vec<Record>>> = self
            .subscribers
            .iter()
            .map(|sub| (sub.filter.collection == collection).then(|| self.snapshot(&sub.filter)))
            .collect();

        let mut index = 0;
        self.subscribers.retain(|sub| {
            let snapshot = snapshots[index].clone();
            index += 1;
            match snapshot {
                Some(records) => sub.tx.send(Ok(records)).is_ok(),
                None => !sub.tx.is_closed(),
            }
        });
    }

    fn log(&mut self, op: StoreOp, collection: &str, id: &str, fields: &Fields) {
        self.writes.push(WriteLog {
            op,
            collection: collection.to_string(),
            id: id.to_string(),
            fields: fields.clone(),
            at: tokio::time::Instant::now(),
        });
    }
}

/// In-process [`DocumentStore`].
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing counters, timestamps and
    /// subscribers.
    pub async fn seed(&self, collection: &str, record: Record) {
        let mut inner = self.inner.lock().await;
        inner
            .records
            .entry(collection.to_string())
            .or_default()
            .insert(record.id.clone(), record);
    }

    /// Fail the next `times` calls of `op` with [`StoreError::Unavailable`].
    pub async fn fail_next(&self, op: StoreOp, times: usize) {
        self.inner.lock().await.failures.insert(op, times);
    }

    /// Delay every call by `latency` before it touches the data.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().await = latency;
    }

    pub async fn calls(&self) -> CallCounts {
        self.inner.lock().await.calls
    }

    pub async fn writes(&self) -> Vec<WriteLog> {
        self.inner.lock().await.writes.clone()
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<Record> {
        let inner = self.inner.lock().await;
        inner.records.get(collection)?.get(id).cloned()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        self.delay().await;
        let mut inner = self.inner.lock().await;
        inner.begin(StoreOp::Fetch)?;
        Ok(inner
            .records
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        self.delay().await;
        let mut inner = self.inner.lock().await;
        inner.begin(StoreOp::Create)?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        inner.log(StoreOp::Create, collection, &id, &fields);
        inner.records.entry(collection.to_string()).or_default().insert(
            id.clone(),
            Record {
                id: id.clone(),
                fields,
                created_at: Some(now),
                updated_at: Some(now),
            },
        );
        inner.notify(collection);

        tracing::debug!(collection, id = %id, "Created record");
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.delay().await;
        let mut inner = self.inner.lock().await;
        inner.begin(StoreOp::Set)?;

        let now = Utc::now();
        inner.log(StoreOp::Set, collection, id, &fields);
        let records = inner.records.entry(collection.to_string()).or_default();
        let created_at = records.get(id).and_then(|r| r.created_at).or(Some(now));
        records.insert(
            id.to_string(),
            Record {
                id: id.to_string(),
                fields,
                created_at,
                updated_at: Some(now),
            },
        );
        inner.notify(collection);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.delay().await;
        let mut inner = self.inner.lock().await;
        inner.begin(StoreOp::Update)?;

        let record = inner
            .records
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        record.fields.extend(fields.clone());
        record.updated_at = Some(Utc::now());

        inner.log(StoreOp::Update, collection, id, &fields);
        inner.notify(collection);
        Ok(())
    }

    async fn subscribe(&self, filter: Filter) -> Result<Subscription, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.begin(StoreOp::Subscribe)?;

        let (tx, rx) = mpsc::unbounded_channel();
        // Subscribers always start from the current state.
        let _ = tx.send(Ok(inner.snapshot(&filter)));
        inner.subscribers.push(Subscriber { filter, tx });
        Ok(Subscription::new(rx))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.delay().await;
        let mut inner = self.inner.lock().await;
        inner.begin(StoreOp::Delete)?;

        let removed = inner
            .records
            .get_mut(collection)
            .and_then(|records| records.remove(id));
        if removed.is_none() {
            return Err(StoreError::not_found(collection, id));
        }

        inner.log(StoreOp::Delete, collection, id, &Fields::new());
        inner.notify(collection);
        Ok(())
    }
}
