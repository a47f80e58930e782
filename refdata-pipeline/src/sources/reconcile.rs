//! Organization reconciliation against the remote registry.
//!
//! The local CSV is hand-curated. Remote data only fills gaps: an existing
//! non-empty local value is never overwritten.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::{info, instrument};

use super::organization::{read_records, write_records, OrganizationRecord};
use super::retry::{retry, RetryPolicy};
use crate::errors::PipelineError;

/// What a reconciliation run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Local rows that got at least one empty field filled.
    pub updated: usize,
    /// Remote rows that had no local counterpart.
    pub added: usize,
    /// Rows in the written file.
    pub total: usize,
}

fn fill_empty(local: &mut OrganizationRecord, remote: &OrganizationRecord) -> bool {
    let mut changed = false;
    for (target, source) in local.fields_mut().into_iter().zip(remote.fields()) {
        if target.trim().is_empty() && !source.trim().is_empty() {
            *target = source.clone();
            changed = true;
        }
    }
    changed
}

type OwnedKey = (String, String, String);

fn owned_key(record: &OrganizationRecord) -> OwnedKey {
    let (a, b, c) = record.key();
    (a.to_string(), b.to_string(), c.to_string())
}

/// Merge remote records into local ones.
///
/// The result is sorted by `(org_code, unit_main_code, unit_sub_code)` and
/// holds at most one row per `(org_code, unit_sub_code, unit_main_code)`.
pub fn merge_records(
    local: Vec<OrganizationRecord>,
    remote: &[OrganizationRecord],
) -> (Vec<OrganizationRecord>, ReconcileSummary) {
    let mut merged = local;
    let mut summary = ReconcileSummary::default();

    let mut index: HashMap<OwnedKey, usize> = HashMap::new();
    for (position, record) in merged.iter().enumerate() {
        index.entry(owned_key(record)).or_insert(position);
    }

    let mut updated: HashSet<usize> = HashSet::new();
    for record in remote {
        if record.org_code.trim().is_empty() {
            continue;
        }
        match index.get(&owned_key(record)) {
            Some(&position) => {
                if fill_empty(&mut merged[position], record) {
                    updated.insert(position);
                }
            }
            None => {
                index.insert(owned_key(record), merged.len());
                merged.push(record.clone());
                summary.added += 1;
            }
        }
    }
    summary.updated = updated.len();

    merged.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    let mut seen: HashSet<OwnedKey> = HashSet::new();
    merged.retain(|record| seen.insert(owned_key(record)));

    summary.total = merged.len();
    (merged, summary)
}

/// Updates the organization CSV from the remote registry.
pub struct OrganizationReconciler {
    http: reqwest::Client,
    api_url: String,
    csv_path: PathBuf,
    policy: RetryPolicy,
}

impl OrganizationReconciler {
    pub fn new(
        http: reqwest::Client,
        api_url: impl Into<String>,
        csv_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            csv_path: csv_path.into(),
            policy: RetryPolicy::source_fetch(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn fetch_remote(&self) -> Result<Vec<OrganizationRecord>, PipelineError> {
        retry(&self.policy, &self.api_url, || async {
            self.http
                .get(&self.api_url)
                .send()
                .await?
                .error_for_status()?
                .json::<Vec<OrganizationRecord>>()
                .await
        })
        .await
        .map_err(|e| PipelineError::source_unavailable("organization", e))
    }

    /// Merge the remote registry into the CSV and rewrite it.
    #[instrument(skip(self), fields(path = %self.csv_path.display()))]
    pub async fn run(&self) -> Result<ReconcileSummary, PipelineError> {
        let local = read_records(&self.csv_path).await?;
        let remote = self.fetch_remote().await?;

        let (merged, summary) = merge_records(local, &remote);
        write_records(&self.csv_path, &merged).await?;

        info!(
            updated = summary.updated,
            added = summary.added,
            total = summary.total,
            "Reconciled organizations"
        );
        Ok(summary)
    }
}
