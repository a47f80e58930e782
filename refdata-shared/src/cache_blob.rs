//! The shared cache value read by API workers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::{OrganizationUnit, VocabularyTerm, ORGANIZATION_DATA_TYPE};

/// Key of the single list inside `organization_data`.
pub const ORGANIZATION_DATA_KEY: &str = ORGANIZATION_DATA_TYPE;

/// Snapshot of every indexed reference data entry.
///
/// Always written as a whole; there are no partial updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBlob {
    /// Vocabulary terms grouped by data type.
    #[serde(default)]
    pub reference_data: BTreeMap<String, Vec<VocabularyTerm>>,
    /// Organization units under [`ORGANIZATION_DATA_KEY`].
    #[serde(default)]
    pub organization_data: BTreeMap<String, Vec<OrganizationUnit>>,
}

impl CacheBlob {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when neither map holds a single entry.
    pub fn is_empty(&self) -> bool {
        self.reference_data.values().all(Vec::is_empty)
            && self.organization_data.values().all(Vec::is_empty)
    }

    pub fn push_term(&mut self, term: VocabularyTerm) {
        self.reference_data
            .entry(term.core.data_type.clone())
            .or_default()
            .push(term);
    }

    pub fn push_organization(&mut self, org: OrganizationUnit) {
        self.organization_data
            .entry(ORGANIZATION_DATA_KEY.to_string())
            .or_default()
            .push(org);
    }

    /// Terms of one data type, empty when the type is unknown.
    pub fn terms(&self, data_type: &str) -> &[VocabularyTerm] {
        self.reference_data
            .get(data_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn organizations(&self) -> &[OrganizationUnit] {
        self.organization_data
            .get(ORGANIZATION_DATA_KEY)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Entry counts per data type, organizations included.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = self
            .reference_data
            .iter()
            .map(|(data_type, terms)| (data_type.clone(), terms.len()))
            .collect();
        counts.insert(ORGANIZATION_DATA_KEY.to_string(), self.organizations().len());
        counts
    }
}
