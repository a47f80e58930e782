//! Index publisher.
//!
//! Replaces a data type's documents in an index with a freshly harvested
//! set: delete every document of the type, then insert the new ones in one
//! bulk request. The two steps are not atomic; a reader in between sees the
//! type as empty.

use std::sync::Arc;

use refdata_repository::{IndexDocument, IndexSpec, SearchIndexError, SearchIndexProvider};
use refdata_shared::ReferenceEntry;
use tracing::{error, info, instrument, warn};

use crate::errors::PipelineError;

/// Outcome of one replace cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub data_type: String,
    /// Documents removed by the delete step.
    pub deleted: u64,
    /// Documents written by the bulk step.
    pub indexed: usize,
}

/// Writes harvested entries into the search index.
pub struct IndexPublisher {
    provider: Arc<dyn SearchIndexProvider>,
    indices: Vec<IndexSpec>,
}

impl IndexPublisher {
    /// Create a publisher managing both reference data indices.
    pub fn new(provider: Arc<dyn SearchIndexProvider>) -> Self {
        Self {
            provider,
            indices: IndexSpec::all(),
        }
    }

    /// Drop both indices if present and create them with their schemas.
    #[instrument(skip(self))]
    pub async fn recreate_indices(&self) -> Result<(), PipelineError> {
        for spec in &self.indices {
            if self.provider.index_exists(&spec.name).await? {
                self.provider.delete_index(&spec.name).await?;
                info!(index = %spec.name, "Deleted index");
            }
            self.provider.create_index(&spec.name, &spec.schema).await?;
            info!(index = %spec.name, "Created index");
        }
        Ok(())
    }

    /// Create whichever index is missing, leaving existing ones untouched.
    #[instrument(skip(self))]
    pub async fn ensure_indices(&self) -> Result<(), PipelineError> {
        for spec in &self.indices {
            if !self.provider.index_exists(&spec.name).await? {
                self.provider.create_index(&spec.name, &spec.schema).await?;
                info!(index = %spec.name, "Created missing index");
            }
        }
        Ok(())
    }

    /// Replace every document of `data_type` in `index` with `entries`.
    ///
    /// An empty `entries` is a no-op: nothing is deleted and the previous
    /// documents stay. A failure after the delete step leaves the type empty.
    #[instrument(skip(self, entries), fields(entry_count = entries.len()))]
    pub async fn replace(
        &self,
        index: &str,
        data_type: &str,
        entries: &[ReferenceEntry],
    ) -> Result<ReplaceSummary, PipelineError> {
        if entries.is_empty() {
            warn!("No entries, keeping existing documents");
            return Ok(ReplaceSummary {
                data_type: data_type.to_string(),
                deleted: 0,
                indexed: 0,
            });
        }

        let documents = entries
            .iter()
            .map(|entry| {
                entry
                    .to_document()
                    .map(|body| IndexDocument::new(entry.doc_id(), body))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                PipelineError::index_write(
                    data_type,
                    SearchIndexError::serialization(e.to_string()),
                )
            })?;

        let deleted = self
            .provider
            .delete_by_query(index, data_type)
            .await
            .map_err(|e| PipelineError::index_write(data_type, e))?;

        let summary = self
            .provider
            .bulk_index(index, &documents)
            .await
            .map_err(|e| {
                error!(error = %e, deleted = deleted, "Bulk insert failed after delete");
                PipelineError::index_write(data_type, e)
            })?;

        if !summary.is_complete() {
            let first = summary
                .errors
                .first()
                .map(|item| format!(", first: {} ({})", item.id, item.reason))
                .unwrap_or_default();
            error!(
                failed = summary.failed,
                total = summary.total,
                "Bulk insert rejected documents"
            );
            return Err(PipelineError::index_write(
                data_type,
                SearchIndexError::bulk_operation(format!(
                    "{} of {} documents rejected{}",
                    summary.failed, summary.total, first
                )),
            ));
        }

        info!(deleted = deleted, indexed = summary.succeeded, "Replaced documents");
        Ok(ReplaceSummary {
            data_type: data_type.to_string(),
            deleted,
            indexed: summary.succeeded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingIndex;
    use refdata_shared::{EntryCore, LabelMap, VocabularyTerm};
    use serde_json::json;

    fn term(data_type: &str, code: &str) -> ReferenceEntry {
        VocabularyTerm::new(EntryCore::new(
            data_type,
            code,
            LabelMap::new().with("en", code),
            format!("http://example.org/{}", code),
        ))
        .into()
    }

    #[tokio::test]
    async fn test_replace_deletes_then_inserts() {
        let index = Arc::new(RecordingIndex::new());
        index
            .seed("reference_data", "language_swe", json!({ "type": "language" }))
            .await;
        index
            .seed("reference_data", "license_CC0", json!({ "type": "license" }))
            .await;
        let publisher = IndexPublisher::new(index.clone());

        let summary = publisher
            .replace(
                "reference_data",
                "language",
                &[term("language", "fin"), term("language", "eng")],
            )
            .await
            .unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.indexed, 2);
        assert_eq!(
            index.calls().await,
            vec![
                "delete_by_query:reference_data:language",
                "bulk_index:reference_data:2"
            ]
        );
        assert_eq!(
            index.ids_of_type("reference_data", "language").await,
            vec!["language_eng", "language_fin"]
        );
        assert_eq!(
            index.ids_of_type("reference_data", "license").await,
            vec!["license_CC0"]
        );
    }

    #[tokio::test]
    async fn test_empty_replace_is_noop() {
        let index = Arc::new(RecordingIndex::new());
        index
            .seed("reference_data", "language_swe", json!({ "type": "language" }))
            .await;
        let publisher = IndexPublisher::new(index.clone());

        let summary = publisher
            .replace("reference_data", "language", &[])
            .await
            .unwrap();

        assert_eq!(summary.indexed, 0);
        assert!(index.calls().await.is_empty());
        assert_eq!(
            index.ids_of_type("reference_data", "language").await,
            vec!["language_swe"]
        );
    }

    #[tokio::test]
    async fn test_duplicate_doc_ids_collide() {
        let index = Arc::new(RecordingIndex::new());
        let publisher = IndexPublisher::new(index.clone());

        publisher
            .replace(
                "reference_data",
                "language",
                &[term("language", "fin"), term("language", "fin")],
            )
            .await
            .unwrap();

        assert_eq!(
            index.ids_of_type("reference_data", "language").await,
            vec!["language_fin"]
        );
    }

    #[tokio::test]
    async fn test_failed_bulk_propagates() {
        let index = Arc::new(RecordingIndex {
            fail_bulk_for: Some("language".to_string()),
            ..RecordingIndex::default()
        });
        let publisher = IndexPublisher::new(index.clone());

        let err = publisher
            .replace("reference_data", "language", &[term("language", "fin")])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::IndexWrite { ref data_type, .. } if data_type == "language"
        ));
    }

    #[tokio::test]
    async fn test_rejected_items_are_a_write_failure() {
        let index = Arc::new(RecordingIndex {
            reject_id: Some("language_eng".to_string()),
            ..RecordingIndex::default()
        });
        let publisher = IndexPublisher::new(index.clone());

        let err = publisher
            .replace(
                "reference_data",
                "language",
                &[term("language", "fin"), term("language", "eng")],
            )
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("1 of 2 documents rejected"));
        assert!(message.contains("language_eng"));
    }

    #[tokio::test]
    async fn test_recreate_indices() {
        let index = Arc::new(RecordingIndex::new());
        index
            .seed("reference_data", "language_fin", json!({ "type": "language" }))
            .await;
        let publisher = IndexPublisher::new(index.clone());

        publisher.recreate_indices().await.unwrap();

        assert_eq!(
            index.calls().await,
            vec![
                "delete_index:reference_data",
                "create_index:reference_data",
                "create_index:organization_data"
            ]
        );
        assert!(index.ids_of_type("reference_data", "language").await.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_indices_only_creates_missing() {
        let index = Arc::new(RecordingIndex::new());
        index
            .seed("reference_data", "language_fin", json!({ "type": "language" }))
            .await;
        let publisher = IndexPublisher::new(index.clone());

        publisher.ensure_indices().await.unwrap();

        assert_eq!(index.calls().await, vec!["create_index:organization_data"]);
        assert_eq!(
            index.ids_of_type("reference_data", "language").await,
            vec!["language_fin"]
        );
    }
}
