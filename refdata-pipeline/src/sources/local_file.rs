//! Local JSON reference data files.
//!
//! Small code lists maintained by hand live in `<dir>/<data_type>.json`.

use std::path::PathBuf;

use async_trait::async_trait;
use refdata_shared::{EntryCore, LabelMap, ReferenceEntry, VocabularyTerm};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::SourceAdapter;
use crate::catalog::DataTypeConfig;
use crate::errors::PipelineError;

#[derive(Debug, Deserialize)]
struct LocalRecord {
    code: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    label: LabelMap,
    #[serde(default)]
    parent_ids: Vec<String>,
    #[serde(default)]
    child_ids: Vec<String>,
    #[serde(default)]
    same_as: Vec<String>,
    #[serde(default)]
    scheme: Option<String>,
    #[serde(default)]
    input_file_format: Option<String>,
    #[serde(default)]
    output_format_version: Option<String>,
    #[serde(default)]
    internal_code: Option<String>,
}

impl LocalRecord {
    fn into_term(self, data_type: &DataTypeConfig) -> VocabularyTerm {
        let uri = self
            .uri
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| data_type.uri_for(&self.code));

        let core = EntryCore::new(&data_type.name, self.code, self.label, uri)
            .with_scheme(self.scheme)
            .with_same_as(self.same_as);

        let mut term = VocabularyTerm::new(core).with_hierarchy(self.parent_ids, self.child_ids);
        term.input_file_format = self.input_file_format;
        term.output_format_version = self.output_format_version;
        term.internal_code = self.internal_code;
        term
    }
}

/// Reads one JSON array file per data type.
pub struct LocalFileSource {
    dir: PathBuf,
}

impl LocalFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, data_type: &str) -> PathBuf {
        self.dir.join(format!("{}.json", data_type))
    }
}

#[async_trait]
impl SourceAdapter for LocalFileSource {
    #[instrument(skip(self, data_type), fields(data_type = %data_type.name))]
    async fn fetch(
        &self,
        data_type: &DataTypeConfig,
    ) -> Result<Vec<ReferenceEntry>, PipelineError> {
        let path = self.path_for(&data_type.name);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            PipelineError::source_unavailable(
                &data_type.name,
                format!("{}: {}", path.display(), e),
            )
        })?;

        let records: Vec<Value> = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::source_format(&data_type.name, e))?;

        let mut entries = Vec::with_capacity(records.len());
        for (index, value) in records.into_iter().enumerate() {
            let record = match serde_json::from_value::<LocalRecord>(value) {
                Ok(record) if !record.code.trim().is_empty() => record,
                Ok(_) => {
                    let err = PipelineError::malformed_row(
                        &data_type.name,
                        index.to_string(),
                        "empty code",
                    );
                    warn!(error = %err, "Skipping record");
                    continue;
                }
                Err(e) => {
                    let err = PipelineError::malformed_row(&data_type.name, index.to_string(), e);
                    warn!(error = %err, "Skipping record");
                    continue;
                }
            };
            entries.push(record.into_term(data_type).into());
        }

        info!(path = %path.display(), count = entries.len(), "Read local reference data");
        Ok(entries)
    }
}
