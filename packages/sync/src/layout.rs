//! Character relationship diagram layout, stored per project.
//!
//! Loads and saves go through the [`RetryPolicy`]: the diagram is secondary
//! data, so a flaky connection is retried in the background instead of
//! surfacing immediately.

use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::retry::RetryPolicy;
use crate::store::{DocumentStore, Fields, CLIENT_UPDATED_AT};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const RELATIONSHIPS_COLLECTION: &str = "relationships";

const GRID_COLUMNS: usize = 3;
const COLUMN_WIDTH: f64 = 250.0;
const ROW_HEIGHT: f64 = 200.0;
const GRID_MARGIN: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Relationship between two characters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramLayout {
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub node_positions: BTreeMap<String, Position>,
}

impl DiagramLayout {
    /// Saved position of a node, or its grid slot when it was never moved.
    pub fn position_of(&self, node_id: &str, index: usize) -> Position {
        self.node_positions
            .get(node_id)
            .copied()
            .unwrap_or_else(|| default_position(index))
    }

    fn to_fields(&self) -> Result<Fields, SyncError> {
        let mut fields = Fields::new();
        fields.insert(
            "edges".to_string(),
            serde_json::to_value(&self.edges).map_err(crate::errors::StoreError::from)?,
        );
        fields.insert(
            "nodePositions".to_string(),
            serde_json::to_value(&self.node_positions).map_err(crate::errors::StoreError::from)?,
        );
        Ok(fields)
    }
}

/// Grid slot for the `index`-th node: three columns, left to right.
pub fn default_position(index: usize) -> Position {
    Position {
        x: (index % GRID_COLUMNS) as f64 * COLUMN_WIDTH + GRID_MARGIN,
        y: (index / GRID_COLUMNS) as f64 * ROW_HEIGHT + GRID_MARGIN,
    }
}

/// Reads and writes diagram layouts.
#[derive(Clone)]
pub struct LayoutStore {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl LayoutStore {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Layout store using the configured retry policy.
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &SyncConfig) -> Self {
        Self::new(store, config.retry)
    }

    /// Layout for `project_id`. A project without one gets an empty layout,
    /// which is stored.
    pub async fn load_layout(&self, project_id: &str) -> Result<DiagramLayout, SyncError> {
        let record = self
            .retry
            .run("load_layout", || self.store.fetch(RELATIONSHIPS_COLLECTION, project_id))
            .await?;

        if let Some(record) = record {
            return Ok(decode_layout(&record.fields));
        }

        tracing::info!(project = %project_id, "Creating empty relationship layout");
        let layout = DiagramLayout::default();
        let fields = layout.to_fields()?;
        self.retry
            .run("create_layout", || {
                self.store.set(RELATIONSHIPS_COLLECTION, project_id, fields.clone())
            })
            .await?;
        Ok(layout)
    }

    pub async fn save_layout(&self, project_id: &str, layout: &DiagramLayout) -> Result<(), SyncError> {
        let mut fields = layout.to_fields()?;
        fields.insert(CLIENT_UPDATED_AT.to_string(), Value::String(Utc::now().to_rfc3339()));

        self.retry
            .run("save_layout", || {
                self.store.update(RELATIONSHIPS_COLLECTION, project_id, fields.clone())
            })
            .await?;
        tracing::debug!(project = %project_id, edges = layout.edges.len(), "Saved relationship layout");
        Ok(())
    }
}

/// Missing or malformed parts of a stored layout read as empty.
fn decode_layout(fields: &Fields) -> DiagramLayout {
    let edges = fields
        .get("edges")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    let node_positions = fields
        .get("nodePositions")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default();
    DiagramLayout { edges, node_positions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::store::{MemoryDocumentStore, Record, StoreOp};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::Instant;

    fn layouts(store: &MemoryDocumentStore) -> LayoutStore {
        LayoutStore::new(Arc::new(store.clone()), RetryPolicy::default())
    }

    #[test]
    fn test_default_grid() {
        assert_eq!(default_position(0), Position { x: 100.0, y: 100.0 });
        assert_eq!(default_position(2), Position { x: 600.0, y: 100.0 });
        assert_eq!(default_position(4), Position { x: 350.0, y: 300.0 });
    }

    #[test]
    fn test_saved_position_wins() {
        let mut layout = DiagramLayout::default();
        layout
            .node_positions
            .insert("c1".into(), Position { x: 5.0, y: 6.0 });
        assert_eq!(layout.position_of("c1", 3), Position { x: 5.0, y: 6.0 });
        assert_eq!(layout.position_of("c2", 3), default_position(3));
    }

    #[tokio::test]
    async fn test_first_load_creates_empty_layout() {
        let store = MemoryDocumentStore::new();
        let layout = layouts(&store).load_layout("p1").await.unwrap();

        assert_eq!(layout, DiagramLayout::default());
        let record = store.get(RELATIONSHIPS_COLLECTION, "p1").await.unwrap();
        assert_eq!(record.get("edges"), Some(&json!([])));
        assert_eq!(record.get("nodePositions"), Some(&json!({})));

        layouts(&store).load_layout("p1").await.unwrap();
        assert_eq!(store.calls().await.set, 1);
    }

    #[tokio::test]
    async fn test_malformed_layout_reads_as_empty() {
        let store = MemoryDocumentStore::new();
        let fields = match json!({ "edges": "nope", "nodePositions": { "c1": { "x": 1.0, "y": 2.0 } } }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        store.seed(RELATIONSHIPS_COLLECTION, Record::new("p1", fields)).await;

        let layout = layouts(&store).load_layout("p1").await.unwrap();
        assert!(layout.edges.is_empty());
        assert_eq!(layout.position_of("c1", 0), Position { x: 1.0, y: 2.0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_retries_with_linear_backoff() {
        let store = MemoryDocumentStore::new();
        let layouts = layouts(&store);
        layouts.load_layout("p1").await.unwrap();
        store.fail_next(StoreOp::Update, 2).await;

        let mut layout = DiagramLayout::default();
        layout.edges.push(Edge {
            id: "e1".into(),
            source: "c1".into(),
            target: "c2".into(),
            label: Some("rivals".into()),
        });

        let started = Instant::now();
        layouts.save_layout("p1", &layout).await.unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3010));
        assert_eq!(store.calls().await.update, 3);
        assert_eq!(layouts.load_layout("p1").await.unwrap(), layout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_retry_policy_is_used() {
        let store = MemoryDocumentStore::new();
        let config: SyncConfig =
            serde_json::from_str(r#"{ "retry": { "maxRetries": 1, "baseDelayMs": 200 } }"#).unwrap();
        let layouts = LayoutStore::from_config(Arc::new(store.clone()), &config);
        layouts.load_layout("p1").await.unwrap();
        store.fail_next(StoreOp::Update, 10).await;

        let started = Instant::now();
        let err = layouts
            .save_layout("p1", &DiagramLayout::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::RetriesExhausted { attempts: 2, .. }));
        assert_eq!(store.calls().await.update, 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(210));
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_gives_up_after_three_retries() {
        let store = MemoryDocumentStore::new();
        let layouts = layouts(&store);
        layouts.load_layout("p1").await.unwrap();
        store.fail_next(StoreOp::Update, 10).await;

        let err = layouts
            .save_layout("p1", &DiagramLayout::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::RetriesExhausted {
                attempts: 4,
                last: StoreError::Unavailable(_)
            }
        ));
        assert_eq!(store.calls().await.update, 4);
    }
}
