//! Where a reload reads reference data from.

use std::sync::Arc;

use async_trait::async_trait;
use refdata_repository::{SearchIndexProvider, ORGANIZATION_DATA_INDEX, REFERENCE_DATA_INDEX};
use refdata_shared::{CacheBlob, OrganizationUnit, VocabularyTerm};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::CacheError;

/// Produces a complete snapshot of the published reference data.
#[async_trait]
pub trait ReferenceDataSource: Send + Sync {
    async fn fetch_all(&self) -> Result<CacheBlob, CacheError>;
}

/// Reads both search indices in full.
pub struct SearchIndexSource {
    provider: Arc<dyn SearchIndexProvider>,
}

impl SearchIndexSource {
    pub fn new(provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self { provider }
    }
}

fn decode<T: serde::de::DeserializeOwned>(index: &str, doc: Value) -> Option<T> {
    let id = doc.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
    match serde_json::from_value(doc) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(index = %index, id = %id, error = %e, "Skipping unreadable document");
            None
        }
    }
}

#[async_trait]
impl ReferenceDataSource for SearchIndexSource {
    async fn fetch_all(&self) -> Result<CacheBlob, CacheError> {
        let terms = self
            .provider
            .fetch_all(REFERENCE_DATA_INDEX)
            .await
            .map_err(CacheError::source)?;
        let organizations = self
            .provider
            .fetch_all(ORGANIZATION_DATA_INDEX)
            .await
            .map_err(CacheError::source)?;

        let mut blob = CacheBlob::new();
        for doc in terms {
            if let Some(term) = decode::<VocabularyTerm>(REFERENCE_DATA_INDEX, doc) {
                blob.push_term(term);
            }
        }
        for doc in organizations {
            if let Some(org) = decode::<OrganizationUnit>(ORGANIZATION_DATA_INDEX, doc) {
                blob.push_organization(org);
            }
        }

        info!(counts = ?blob.counts(), "Read reference data from search index");
        Ok(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdata_repository::{BulkIndexSummary, IndexDocument, SearchIndexError};
    use serde_json::json;

    struct FixedIndex {
        terms: Vec<Value>,
        organizations: Vec<Value>,
    }

    #[async_trait]
    impl SearchIndexProvider for FixedIndex {
        async fn index_exists(&self, _index: &str) -> Result<bool, SearchIndexError> {
            Ok(true)
        }

        async fn create_index(
            &self,
            _index: &str,
            _schema: &Value,
        ) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn delete_index(&self, _index: &str) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn delete_by_query(
            &self,
            _index: &str,
            _data_type: &str,
        ) -> Result<u64, SearchIndexError> {
            Ok(0)
        }

        async fn bulk_index(
            &self,
            _index: &str,
            documents: &[IndexDocument],
        ) -> Result<BulkIndexSummary, SearchIndexError> {
            Ok(BulkIndexSummary::all_succeeded(documents.len()))
        }

        async fn fetch_all(&self, index: &str) -> Result<Vec<Value>, SearchIndexError> {
            match index {
                REFERENCE_DATA_INDEX => Ok(self.terms.clone()),
                ORGANIZATION_DATA_INDEX => Ok(self.organizations.clone()),
                other => Err(SearchIndexError::query(format!("no index {}", other))),
            }
        }

        async fn health_check(&self) -> Result<bool, SearchIndexError> {
            Ok(true)
        }
    }

    fn doc(data_type: &str, code: &str) -> Value {
        json!({
            "id": format!("{}_{}", data_type, code),
            "type": data_type,
            "code": code,
            "uri": format!("http://example.org/{}", code),
            "label": { "und": code },
            "scheme": "http://example.org/scheme"
        })
    }

    #[tokio::test]
    async fn test_groups_terms_by_type() {
        let mut sub_unit = doc("organization", "10076-E700");
        sub_unit["parent_id"] = json!("organization_10076");

        let source = SearchIndexSource::new(Arc::new(FixedIndex {
            terms: vec![
                doc("language", "fin"),
                doc("license", "CC0-1.0"),
                doc("language", "swe"),
                json!({ "id": "broken" }),
            ],
            organizations: vec![doc("organization", "10076"), sub_unit],
        }));

        let blob = source.fetch_all().await.unwrap();

        assert_eq!(blob.terms("language").len(), 2);
        assert_eq!(blob.terms("license").len(), 1);
        assert_eq!(blob.organizations().len(), 2);
        assert_eq!(
            blob.organizations()[1].parent_id.as_deref(),
            Some("organization_10076")
        );
    }

    #[tokio::test]
    async fn test_empty_indices_give_empty_blob() {
        let source = SearchIndexSource::new(Arc::new(FixedIndex {
            terms: vec![],
            organizations: vec![],
        }));

        assert!(source.fetch_all().await.unwrap().is_empty());
    }
}
