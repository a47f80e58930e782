//! Source adapters.
//!
//! Each upstream source kind has one adapter that fetches the raw data of a
//! data type and normalizes it into [`ReferenceEntry`] values. Adapters are
//! independent of each other and of the index.

mod coordinates;
mod finto;
mod local_file;
mod mime_type;
mod organization;
mod reconcile;
mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::events::BytesStart;
use refdata_shared::ReferenceEntry;

use crate::catalog::{DataTypeConfig, SourceKind};
use crate::errors::PipelineError;

pub use coordinates::{CoordinateMode, CoordinateResolver};
pub use finto::{parse_skos, FintoSource, SkosConcept};
pub use local_file::LocalFileSource;
pub use mime_type::{parse_media_types, MediaTypeSource, ALLOWED_REGISTRIES};
pub use organization::{
    build_entries, read_records, to_csv_bytes, write_records, OrganizationCsvSource,
    OrganizationRecord, CSV_HEADERS,
};
pub use reconcile::{merge_records, OrganizationReconciler, ReconcileSummary};
pub use retry::{retry, RetryPolicy};

/// Fetches and normalizes the terms of one data type.
///
/// An `Err` means the whole data type is unusable for this run. Individual
/// malformed records are logged and skipped inside the adapter.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, data_type: &DataTypeConfig) -> Result<Vec<ReferenceEntry>, PipelineError>;
}

/// One adapter per source kind.
#[derive(Clone)]
pub struct SourceAdapters {
    pub graph: Arc<dyn SourceAdapter>,
    pub local_file: Arc<dyn SourceAdapter>,
    pub organization: Arc<dyn SourceAdapter>,
    pub media_type: Arc<dyn SourceAdapter>,
}

impl SourceAdapters {
    /// The adapter responsible for a source kind.
    pub fn for_source(&self, source: &SourceKind) -> &Arc<dyn SourceAdapter> {
        match source {
            SourceKind::Graph { .. } => &self.graph,
            SourceKind::LocalFile => &self.local_file,
            SourceKind::Organization => &self.organization,
            SourceKind::MediaTypeRegistry => &self.media_type,
        }
    }
}

/// GET a URL and return the body, failing on non-success statuses.
async fn get_text(
    client: &reqwest::Client,
    url: &str,
    accept: &str,
) -> Result<String, reqwest::Error> {
    client
        .get(url)
        .header(reqwest::header::ACCEPT, accept)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
}

/// Value of the attribute with the given local name, prefix ignored.
fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, quick_xml::Error> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Last path segment of a URI, used as the term code.
fn code_from_uri(uri: &str) -> &str {
    uri.trim_end_matches(['/', '#'])
        .rsplit(['/', '#'])
        .next()
        .unwrap_or(uri)
}
