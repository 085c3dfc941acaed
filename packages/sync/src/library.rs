//! Project document listing: create, delete and watch the documents of a
//! project, newest first.

use crate::errors::StoreError;
use crate::session::DEFAULT_TITLE;
use crate::store::{DocumentStore, Fields, Filter, Record, CLIENT_UPDATED_AT};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use storyforge_editor::Document;

/// Entry in a project's document list
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DocumentSummary {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            title: record.get_str("title").unwrap_or(DEFAULT_TITLE).to_string(),
            updated_at: record.updated_at(),
        }
    }
}

/// Newest first; records without any timestamp go last.
pub fn summarize(records: &[Record]) -> Vec<DocumentSummary> {
    let mut summaries: Vec<DocumentSummary> = records.iter().map(DocumentSummary::from_record).collect();
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    summaries
}

#[derive(Clone)]
pub struct DocumentLibrary {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl DocumentLibrary {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Create a document in `project_id` holding the initial content.
    pub async fn create_document(&self, project_id: &str, title: Option<&str>) -> Result<String, StoreError> {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), Value::String(title.unwrap_or(DEFAULT_TITLE).to_string()));
        fields.insert("projectId".to_string(), Value::String(project_id.to_string()));
        fields.insert("content".to_string(), Document::initial().to_value()?);
        fields.insert(CLIENT_UPDATED_AT.to_string(), Value::String(Utc::now().to_rfc3339()));

        let id = self.store.create(&self.collection, fields).await?;
        tracing::info!(project = %project_id, document = %id, "Created document");
        Ok(id)
    }

    pub async fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(&self.collection, id).await?;
        tracing::info!(document = %id, "Deleted document");
        Ok(())
    }

    /// Live document list for a project.
    pub async fn watch_project(
        &self,
        project_id: &str,
    ) -> Result<impl Stream<Item = Result<Vec<DocumentSummary>, StoreError>>, StoreError> {
        let filter = Filter::collection(self.collection.clone()).where_eq("projectId", project_id);
        let subscription = self.store.subscribe(filter).await?;
        Ok(subscription.map(|snapshot| snapshot.map(|records| summarize(&records))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use serde_json::json;

    fn record(id: &str, title: Option<&str>, client: Option<&str>) -> Record {
        let mut fields = Fields::new();
        if let Some(title) = title {
            fields.insert("title".into(), json!(title));
        }
        if let Some(client) = client {
            fields.insert(CLIENT_UPDATED_AT.into(), json!(client));
        }
        Record::new(id, fields)
    }

    #[test]
    fn test_summaries_sort_newest_first() {
        let records = vec![
            record("a", Some("Old"), Some("2024-01-01T00:00:00Z")),
            record("b", None, None),
            record("c", Some("New"), Some("2024-06-01T00:00:00Z")),
        ];

        let summaries = summarize(&records);
        let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(summaries[2].title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_watch_project_tracks_creates_and_deletes() {
        let store = MemoryDocumentStore::new();
        let library = DocumentLibrary::new(Arc::new(store.clone()), "documents");
        let mut list = Box::pin(library.watch_project("p1").await.unwrap());

        assert!(list.next().await.unwrap().unwrap().is_empty());

        let id = library.create_document("p1", Some("Chapter 1")).await.unwrap();
        library.create_document("p2", None).await.unwrap();

        let summaries = list.next().await.unwrap().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].title, "Chapter 1");
        assert!(summaries[0].updated_at.is_some());

        // The p2 create also notifies the collection.
        list.next().await.unwrap().unwrap();

        library.delete_document(&id).await.unwrap();
        assert!(list.next().await.unwrap().unwrap().is_empty());

        let stored = store.calls().await;
        assert_eq!(stored.create, 2);
        assert_eq!(stored.delete, 1);
    }
}
