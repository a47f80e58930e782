//! Data type catalog.
//!
//! Maps every logical data type to the upstream source it is harvested from
//! and the index it is published into.

use refdata_repository::{ORGANIZATION_DATA_INDEX, REFERENCE_DATA_INDEX};
use refdata_shared::ORGANIZATION_DATA_TYPE;

use crate::errors::PipelineError;

const FAIRDATA_URI_BASE: &str = "http://uri.suomi.fi/codelist/fairdata/";

/// URI base of media-type entries.
pub const MEDIA_TYPE_URI_BASE: &str = "https://www.iana.org/assignments/media-types/";

/// Where a data type's terms come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// A SKOS vocabulary published by the graph endpoint.
    Graph {
        vocabulary: String,
        /// Whether terms carry coordinates.
        geographic: bool,
    },
    /// A JSON file in the local reference data directory.
    LocalFile,
    /// The organization CSV.
    Organization,
    /// The media-type registry XML document.
    MediaTypeRegistry,
}

/// Configuration of one data type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeConfig {
    pub name: String,
    pub source: SourceKind,
    /// Prefix of URIs built from codes when the source has none.
    pub uri_base: String,
    /// Target index name.
    pub index: String,
}

impl DataTypeConfig {
    fn new(name: &str, source: SourceKind) -> Self {
        let (uri_base, index) = match &source {
            SourceKind::Organization => (
                refdata_shared::ORGANIZATION_URI_BASE.to_string(),
                ORGANIZATION_DATA_INDEX,
            ),
            SourceKind::MediaTypeRegistry => {
                (MEDIA_TYPE_URI_BASE.to_string(), REFERENCE_DATA_INDEX)
            }
            _ => (
                format!("{}{}/code/", FAIRDATA_URI_BASE, name),
                REFERENCE_DATA_INDEX,
            ),
        };

        Self {
            name: name.to_string(),
            source,
            uri_base,
            index: index.to_string(),
        }
    }

    fn graph(name: &str, vocabulary: &str, geographic: bool) -> Self {
        Self::new(
            name,
            SourceKind::Graph {
                vocabulary: vocabulary.to_string(),
                geographic,
            },
        )
    }

    /// URI of a code, used when the source does not provide one.
    pub fn uri_for(&self, code: &str) -> String {
        format!("{}{}", self.uri_base, code)
    }
}

const LOCAL_FILE_TYPES: &[&str] = &[
    "access_type",
    "resource_type",
    "identifier_type",
    "license",
    "file_format_version",
    "checksum_algorithm",
    "contributor_role",
    "contributor_type",
    "funder_type",
    "lifecycle_event",
    "preservation_event",
    "relation_type",
    "research_infra",
    "restriction_grounds",
    "event_outcome",
    "file_type",
    "use_category",
];

/// The ordered set of data types a pipeline run processes.
#[derive(Debug, Clone)]
pub struct DataTypeCatalog {
    types: Vec<DataTypeConfig>,
    partial: bool,
}

impl DataTypeCatalog {
    pub fn new(types: Vec<DataTypeConfig>) -> Self {
        Self {
            types,
            partial: false,
        }
    }

    /// Every data type known to the system.
    pub fn builtin() -> Self {
        let mut types = vec![
            DataTypeConfig::graph("language", "lexvo", false),
            DataTypeConfig::graph("field_of_science", "okm-tieteenala", false),
            DataTypeConfig::graph("keyword", "yso", false),
            DataTypeConfig::graph("location", "yso-paikat", true),
        ];
        types.extend(
            LOCAL_FILE_TYPES
                .iter()
                .map(|name| DataTypeConfig::new(name, SourceKind::LocalFile)),
        );
        types.push(DataTypeConfig::new("mime_type", SourceKind::MediaTypeRegistry));
        types.push(DataTypeConfig::new(
            ORGANIZATION_DATA_TYPE,
            SourceKind::Organization,
        ));

        Self::new(types)
    }

    pub fn get(&self, name: &str) -> Option<&DataTypeConfig> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Restrict the catalog to the given names, keeping catalog order.
    ///
    /// Any unknown name rejects the whole selection. An empty selection
    /// keeps everything.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, PipelineError> {
        if names.is_empty() {
            return Ok(self.clone());
        }

        if let Some(unknown) = names.iter().find(|n| self.get(n.as_ref()).is_none()) {
            return Err(PipelineError::UnknownDataType(unknown.as_ref().to_string()));
        }

        let types = self
            .types
            .iter()
            .filter(|t| names.iter().any(|n| n.as_ref() == t.name))
            .cloned()
            .collect();

        Ok(Self {
            types,
            partial: true,
        })
    }

    /// True when [`select`](Self::select) narrowed this catalog.
    ///
    /// A partial run must leave unselected data types in the index alone.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataTypeConfig> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for DataTypeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
