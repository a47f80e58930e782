//! Organization CSV adapter.
//!
//! The CSV lists root organizations and their sub-units, one row per unit.
//! Rows of a root organization without a sub-unit code describe the
//! organization itself.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use refdata_shared::{EntryCore, LabelMap, OrganizationUnit, ReferenceEntry};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, instrument, warn};

use super::SourceAdapter;
use crate::catalog::DataTypeConfig;
use crate::errors::PipelineError;

const ISNI_URI_BASE: &str = "http://isni.org/isni/";

/// Column order of the CSV file.
pub const CSV_HEADERS: [&str; 9] = [
    "org_name_fi",
    "org_name_en",
    "org_name_sv",
    "org_code",
    "unit_main_code",
    "unit_sub_code",
    "unit_name",
    "org_isni",
    "org_csc",
];

fn empty_if_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One row of the organization CSV, or one record of the remote registry.
///
/// Absent values are empty strings so that rows serialize back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRecord {
    #[serde(default, deserialize_with = "empty_if_null")]
    pub org_name_fi: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub org_name_en: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub org_name_sv: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub org_code: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub unit_main_code: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub unit_sub_code: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub unit_name: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub org_isni: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub org_csc: String,
}

impl OrganizationRecord {
    /// Identity of a row across the local file and the remote registry.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.org_code, &self.unit_sub_code, &self.unit_main_code)
    }

    /// Ordering used when writing the file.
    pub fn sort_key(&self) -> (&str, &str, &str) {
        (&self.org_code, &self.unit_main_code, &self.unit_sub_code)
    }

    pub fn is_sub_unit(&self) -> bool {
        !self.unit_sub_code.trim().is_empty()
    }

    pub(crate) fn fields_mut(&mut self) -> [&mut String; 9] {
        [
            &mut self.org_name_fi,
            &mut self.org_name_en,
            &mut self.org_name_sv,
            &mut self.org_code,
            &mut self.unit_main_code,
            &mut self.unit_sub_code,
            &mut self.unit_name,
            &mut self.org_isni,
            &mut self.org_csc,
        ]
    }

    pub(crate) fn fields(&self) -> [&String; 9] {
        [
            &self.org_name_fi,
            &self.org_name_en,
            &self.org_name_sv,
            &self.org_code,
            &self.unit_main_code,
            &self.unit_sub_code,
            &self.unit_name,
            &self.org_isni,
            &self.org_csc,
        ]
    }

    fn root_labels(&self) -> LabelMap {
        LabelMap::new()
            .with("fi", self.org_name_fi.trim())
            .with("en", self.org_name_en.trim())
            .with("sv", self.org_name_sv.trim())
    }
}

/// Parse CSV rows, skipping rows that cannot be read.
pub(crate) fn parse_records<R: Read>(reader: R) -> Result<Vec<OrganizationRecord>, PipelineError> {
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut records = Vec::new();

    for (index, row) in csv_reader.deserialize::<OrganizationRecord>().enumerate() {
        match row {
            Ok(record) => records.push(record),
            Err(e) => {
                // Line 1 is the header.
                let err = PipelineError::malformed_row(
                    "organization",
                    format!("line {}", index + 2),
                    e,
                );
                warn!(error = %err, "Skipping CSV row");
            }
        }
    }

    Ok(records)
}

/// Read every row of the organization CSV.
pub async fn read_records(path: &Path) -> Result<Vec<OrganizationRecord>, PipelineError> {
    let raw = tokio::fs::read(path).await.map_err(|e| {
        PipelineError::source_unavailable("organization", format!("{}: {}", path.display(), e))
    })?;
    parse_records(raw.as_slice())
}

/// Serialize rows in CSV form, header first.
pub fn to_csv_bytes(records: &[OrganizationRecord]) -> Result<Vec<u8>, PipelineError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(CSV_HEADERS)
        .map_err(PipelineError::reconcile)?;
    for record in records {
        writer.serialize(record).map_err(PipelineError::reconcile)?;
    }

    writer
        .into_inner()
        .map_err(|e| PipelineError::reconcile(e.error()))
}

/// Replace the organization CSV with the given rows.
pub async fn write_records(
    path: &Path,
    records: &[OrganizationRecord],
) -> Result<(), PipelineError> {
    let bytes = to_csv_bytes(records)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// Build the two-level organization hierarchy from CSV rows.
///
/// A root entry is emitted once per `org_code`, named by the first row that
/// mentions it. Rows without the root's required fields are dropped
/// entirely; sub-unit rows without a name keep only their root.
pub fn build_entries(
    records: &[OrganizationRecord],
    data_type: &DataTypeConfig,
) -> Vec<ReferenceEntry> {
    let mut entries = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        let org_code = record.org_code.trim();
        if org_code.is_empty() || record.org_name_fi.trim().is_empty() {
            let err = PipelineError::malformed_row(
                &data_type.name,
                format!("row {}", index + 1),
                "org_name_fi and org_code are required",
            );
            warn!(error = %err, "Skipping organization");
            continue;
        }

        if seen.insert(org_code.to_string()) {
            let same_as = if record.org_isni.trim().is_empty() {
                Vec::new()
            } else {
                vec![format!("{}{}", ISNI_URI_BASE, record.org_isni.trim())]
            };
            let core = EntryCore::new(
                &data_type.name,
                org_code,
                record.root_labels(),
                data_type.uri_for(org_code),
            )
            .with_same_as(same_as);
            entries.push(
                OrganizationUnit::root(core)
                    .with_org_csc(Some(record.org_csc.clone()))
                    .into(),
            );
        }

        if !record.is_sub_unit() {
            continue;
        }

        if record.unit_name.trim().is_empty() {
            let err = PipelineError::malformed_row(
                &data_type.name,
                format!("row {}", index + 1),
                "sub-unit without unit_name",
            );
            warn!(error = %err, "Skipping sub-unit");
            continue;
        }

        let code = format!("{}-{}", org_code, record.unit_sub_code.trim());
        if !seen.insert(code.clone()) {
            continue;
        }

        let core = EntryCore::new(
            &data_type.name,
            code.as_str(),
            LabelMap::new().with("fi", record.unit_name.trim()),
            data_type.uri_for(&code),
        );
        entries.push(OrganizationUnit::sub_unit(core, org_code).into());
    }

    entries
}

/// Reads organizations from the local CSV file.
pub struct OrganizationCsvSource {
    path: PathBuf,
}

impl OrganizationCsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourceAdapter for OrganizationCsvSource {
    #[instrument(skip(self, data_type), fields(data_type = %data_type.name))]
    async fn fetch(
        &self,
        data_type: &DataTypeConfig,
    ) -> Result<Vec<ReferenceEntry>, PipelineError> {
        let records = read_records(&self.path).await?;
        let entries = build_entries(&records, data_type);

        info!(
            path = %self.path.display(),
            rows = records.len(),
            count = entries.len(),
            "Read organizations"
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataTypeCatalog;

    const SAMPLE: &str = "\
org_name_fi,org_name_en,org_name_sv,org_code,unit_main_code,unit_sub_code,unit_name,org_isni,org_csc
Aalto-yliopisto,Aalto University,Aalto-universitetet,10076,,,,0000000108389418,1
Aalto-yliopisto,Aalto University,Aalto-universitetet,10076,E,E700,Insinööritieteiden korkeakoulu,,
Aalto-yliopisto,Aalto University,Aalto-universitetet,10076,E,E701,,,
,Missing Name,,99999,,,,,
Helsingin yliopisto,University of Helsinki,Helsingfors universitet,01901,,,,,
";

    fn organization() -> DataTypeConfig {
        DataTypeCatalog::builtin()
            .get("organization")
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_parse_records() {
        let records = parse_records(SAMPLE.as_bytes()).unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(records[1].unit_sub_code, "E700");
        assert!(records[1].is_sub_unit());
        assert!(!records[0].is_sub_unit());
    }

    #[test]
    fn test_build_hierarchy() {
        let records = parse_records(SAMPLE.as_bytes()).unwrap();
        let entries = build_entries(&records, &organization());

        let ids: Vec<&str> = entries.iter().map(|e| e.doc_id()).collect();
        assert_eq!(
            ids,
            vec!["organization_10076", "organization_10076-E700", "organization_01901"]
        );

        let ReferenceEntry::Organization(aalto) = &entries[0] else {
            panic!("expected an organization");
        };
        assert_eq!(aalto.parent_id, None);
        assert_eq!(aalto.core.label.get("und"), Some("Aalto-yliopisto"));
        assert_eq!(aalto.core.label.get("sv"), Some("Aalto-universitetet"));
        assert_eq!(aalto.core.same_as, vec!["http://isni.org/isni/0000000108389418"]);
        assert_eq!(aalto.org_csc.as_deref(), Some("1"));
        assert_eq!(
            aalto.core.uri,
            "http://uri.suomi.fi/codelist/fairdata/organization/code/10076"
        );

        let ReferenceEntry::Organization(unit) = &entries[1] else {
            panic!("expected an organization");
        };
        assert_eq!(unit.parent_id.as_deref(), Some("organization_10076"));
        assert_eq!(unit.core.label.get("fi"), Some("Insinööritieteiden korkeakoulu"));
        assert_eq!(unit.core.code, "10076-E700");
    }

    #[test]
    fn test_csv_round_trip_is_byte_stable() {
        let records = parse_records(SAMPLE.as_bytes()).unwrap();
        let bytes = to_csv_bytes(&records).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), SAMPLE);
    }

    #[test]
    fn test_empty_file_keeps_header() {
        let bytes = to_csv_bytes(&[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            format!("{}\n", CSV_HEADERS.join(","))
        );
    }

    #[tokio::test]
    async fn test_fetch_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("organizations.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let source = OrganizationCsvSource::new(&path);
        let entries = source.fetch(&organization()).await.unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_csv_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = OrganizationCsvSource::new(dir.path().join("missing.csv"));

        let err = source.fetch(&organization()).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }
}
