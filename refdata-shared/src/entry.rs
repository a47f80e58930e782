//! Indexable reference data entries.
//!
//! [`EntryCore`] holds the fields every indexed term shares. The two entry
//! kinds embed it (flattened on the wire) and add their own hierarchy fields:
//!
//! - [`VocabularyTerm`]: controlled vocabulary terms with a parent/child graph
//! - [`OrganizationUnit`]: organizations and their sub-units (two levels)

use serde::{Deserialize, Serialize};

use crate::label::LabelMap;

/// Data type of organization entries.
pub const ORGANIZATION_DATA_TYPE: &str = "organization";

/// URI base used for organizations whose source gives no URI.
pub const ORGANIZATION_URI_BASE: &str = "http://uri.suomi.fi/codelist/fairdata/organization/code/";

const SCHEME_BASE: &str = "http://uri.suomi.fi/codelist/fairdata/";

/// Derive the index document id of a term.
///
/// Two terms with the same data type and code always collide.
pub fn doc_id(data_type: &str, code: &str) -> String {
    format!("{}_{}", data_type, code)
}

/// Codelist URL used as the scheme when a source does not provide one.
pub fn default_scheme(data_type: &str) -> String {
    format!("{}{}", SCHEME_BASE, data_type)
}

/// Fields shared by every indexable entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCore {
    /// Index document key, `data_type + "_" + code`.
    #[serde(rename = "id")]
    pub doc_id: String,
    /// Logical data type, e.g. `language` or `organization`.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Natural key of the term in its source system.
    pub code: String,
    /// Canonical dereferenceable identifier.
    pub uri: String,
    /// Labels by language tag, always including `und`.
    #[serde(default)]
    pub label: LabelMap,
    /// Provenance URI of the source vocabulary.
    pub scheme: String,
    /// Equivalent external identifiers, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub same_as: Vec<String>,
}

impl EntryCore {
    /// Create the shared fields of an entry.
    ///
    /// The document id is derived here and nowhere else. The label map gets
    /// its `und` value and the scheme defaults to the data type's codelist.
    pub fn new(
        data_type: impl Into<String>,
        code: impl Into<String>,
        label: LabelMap,
        uri: impl Into<String>,
    ) -> Self {
        let data_type = data_type.into();
        let code = code.into();
        Self {
            doc_id: doc_id(&data_type, &code),
            label: label.with_undetermined(&code),
            scheme: default_scheme(&data_type),
            uri: uri.into(),
            same_as: Vec::new(),
            data_type,
            code,
        }
    }

    /// Override the scheme when the source supplies one.
    pub fn with_scheme(mut self, scheme: Option<String>) -> Self {
        if let Some(scheme) = scheme.filter(|s| !s.trim().is_empty()) {
            self.scheme = scheme;
        }
        self
    }

    pub fn with_same_as(mut self, same_as: Vec<String>) -> Self {
        self.same_as = same_as;
        self
    }
}

/// A controlled vocabulary term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyTerm {
    #[serde(flatten)]
    pub core: EntryCore,
    /// Document ids of broader terms. Dangling ids are allowed.
    #[serde(default)]
    pub parent_ids: Vec<String>,
    /// Document ids of narrower terms. Dangling ids are allowed.
    #[serde(default)]
    pub child_ids: Vec<String>,
    #[serde(default)]
    pub has_children: bool,
    /// Well-known-text geometry, geographic terms only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_code: Option<String>,
}

impl VocabularyTerm {
    pub fn new(core: EntryCore) -> Self {
        Self {
            core,
            parent_ids: Vec::new(),
            child_ids: Vec::new(),
            has_children: false,
            wkt: None,
            input_file_format: None,
            output_format_version: None,
            internal_code: None,
        }
    }

    /// Set the hierarchy edges from raw source codes.
    ///
    /// Codes are turned into document ids of the same data type.
    pub fn with_hierarchy<P, C>(mut self, parent_codes: P, child_codes: C) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let data_type = self.core.data_type.clone();
        self.parent_ids = parent_codes
            .into_iter()
            .map(|code| doc_id(&data_type, code.as_ref()))
            .collect();
        self.child_ids = child_codes
            .into_iter()
            .map(|code| doc_id(&data_type, code.as_ref()))
            .collect();
        self.has_children = !self.child_ids.is_empty();
        self
    }

    pub fn with_wkt(mut self, wkt: Option<String>) -> Self {
        self.wkt = wkt;
        self
    }
}

/// An organization or one of its sub-units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationUnit {
    #[serde(flatten)]
    pub core: EntryCore,
    /// Document id of the root organization, sub-units only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_csc: Option<String>,
}

impl OrganizationUnit {
    pub fn root(core: EntryCore) -> Self {
        Self {
            core,
            parent_id: None,
            org_csc: None,
        }
    }

    /// Create a sub-unit of the organization with code `parent_code`.
    pub fn sub_unit(core: EntryCore, parent_code: &str) -> Self {
        let parent_id = doc_id(&core.data_type, parent_code);
        Self {
            core,
            parent_id: Some(parent_id),
            org_csc: None,
        }
    }

    pub fn with_org_csc(mut self, org_csc: Option<String>) -> Self {
        self.org_csc = org_csc.filter(|s| !s.trim().is_empty());
        self
    }
}

/// Any entry that can be written to the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReferenceEntry {
    Term(VocabularyTerm),
    Organization(OrganizationUnit),
}

impl ReferenceEntry {
    pub fn core(&self) -> &EntryCore {
        match self {
            ReferenceEntry::Term(term) => &term.core,
            ReferenceEntry::Organization(org) => &org.core,
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.core().doc_id
    }

    pub fn data_type(&self) -> &str {
        &self.core().data_type
    }

    /// The JSON body stored in the search index.
    pub fn to_document(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl From<VocabularyTerm> for ReferenceEntry {
    fn from(term: VocabularyTerm) -> Self {
        ReferenceEntry::Term(term)
    }
}

impl From<OrganizationUnit> for ReferenceEntry {
    fn from(org: OrganizationUnit) -> Self {
        ReferenceEntry::Organization(org)
    }
}
