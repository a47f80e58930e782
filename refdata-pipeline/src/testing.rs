//! In-memory search index shared by the pipeline tests.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use refdata_repository::{
    BulkIndexSummary, BulkItemError, IndexDocument, SearchIndexError, SearchIndexProvider,
};
use serde_json::Value;
use tokio::sync::Mutex;

/// Records every call and keeps documents per index.
#[derive(Default)]
pub struct RecordingIndex {
    pub calls: Mutex<Vec<String>>,
    pub indices: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    /// Bulk requests containing a document of this type fail.
    pub fail_bulk_for: Option<String>,
    /// Bulk requests report this document id as rejected.
    pub reject_id: Option<String>,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, index: &str, id: &str, body: Value) {
        self.indices
            .lock()
            .await
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), body);
    }

    pub async fn ids_of_type(&self, index: &str, data_type: &str) -> Vec<String> {
        self.indices
            .lock()
            .await
            .get(index)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, body)| body["type"] == data_type)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: String) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl SearchIndexProvider for RecordingIndex {
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        Ok(self.indices.lock().await.contains_key(index))
    }

    async fn create_index(&self, index: &str, _schema: &Value) -> Result<(), SearchIndexError> {
        self.record(format!("create_index:{}", index)).await;
        self.indices
            .lock()
            .await
            .entry(index.to_string())
            .or_default();
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError> {
        self.record(format!("delete_index:{}", index)).await;
        self.indices.lock().await.remove(index);
        Ok(())
    }

    async fn delete_by_query(&self, index: &str, data_type: &str) -> Result<u64, SearchIndexError> {
        self.record(format!("delete_by_query:{}:{}", index, data_type))
            .await;
        let mut indices = self.indices.lock().await;
        let docs = indices.entry(index.to_string()).or_default();
        let before = docs.len();
        docs.retain(|_, body| body["type"] != data_type);
        Ok((before - docs.len()) as u64)
    }

    async fn bulk_index(
        &self,
        index: &str,
        documents: &[IndexDocument],
    ) -> Result<BulkIndexSummary, SearchIndexError> {
        self.record(format!("bulk_index:{}:{}", index, documents.len()))
            .await;

        if let Some(failing) = &self.fail_bulk_for {
            if documents.iter().any(|d| d.body["type"] == failing.as_str()) {
                return Err(SearchIndexError::bulk_operation("connection reset"));
            }
        }

        let rejected: HashSet<&str> = self.reject_id.iter().map(String::as_str).collect();
        let mut summary = BulkIndexSummary::all_succeeded(documents.len());
        let mut indices = self.indices.lock().await;
        let docs = indices.entry(index.to_string()).or_default();
        for doc in documents {
            if rejected.contains(doc.id.as_str()) {
                summary.succeeded -= 1;
                summary.failed += 1;
                summary.errors.push(BulkItemError {
                    id: doc.id.clone(),
                    reason: "mapper_parsing_exception".to_string(),
                });
                continue;
            }
            docs.insert(doc.id.clone(), doc.body.clone());
        }
        Ok(summary)
    }

    async fn fetch_all(&self, index: &str) -> Result<Vec<Value>, SearchIndexError> {
        Ok(self
            .indices
            .lock()
            .await
            .get(index)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        Ok(true)
    }
}
