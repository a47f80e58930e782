//! Orchestrator module for the reference data pipeline.
//!
//! Runs every configured data type through its source adapter and the
//! index publisher. Data types are independent: a source failure only
//! skips its own type, and a failed replace is reported after all types
//! have been attempted.

use std::fmt;

use tracing::{error, info, instrument, warn};

use crate::catalog::DataTypeCatalog;
use crate::errors::PipelineError;
use crate::publisher::IndexPublisher;
use crate::sources::SourceAdapters;

/// What happened to one data type during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataTypeOutcome {
    /// The type was replaced with this many documents.
    Indexed(usize),
    /// The source failed or returned nothing; existing documents were kept.
    Skipped(String),
    /// Writing to the index failed.
    Failed(String),
}

impl fmt::Display for DataTypeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataTypeOutcome::Indexed(count) => write!(f, "indexed {}", count),
            DataTypeOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            DataTypeOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Per-data-type outcomes of a run, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub outcomes: Vec<(String, DataTypeOutcome)>,
}

impl PipelineReport {
    pub fn outcome(&self, data_type: &str) -> Option<&DataTypeOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == data_type)
            .map(|(_, outcome)| outcome)
    }

    pub fn indexed_total(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                DataTypeOutcome::Indexed(count) => *count,
                _ => 0,
            })
            .sum()
    }

    /// Names of the data types whose replace failed.
    pub fn failed(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, DataTypeOutcome::Failed(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Orchestrator that drives sources into the publisher.
pub struct Orchestrator {
    catalog: DataTypeCatalog,
    sources: SourceAdapters,
    publisher: IndexPublisher,
}

impl Orchestrator {
    pub fn new(
        catalog: DataTypeCatalog,
        sources: SourceAdapters,
        publisher: IndexPublisher,
    ) -> Self {
        Self {
            catalog,
            sources,
            publisher,
        }
    }

    /// Prepare the indices, then harvest and publish every data type.
    ///
    /// A full catalog recreates both indices. A partial catalog only creates
    /// missing indices, so unselected data types keep their documents.
    ///
    /// Returns [`PipelineError::ReplaceFailed`] when any replace failed.
    #[instrument(skip(self), fields(data_types = self.catalog.len()))]
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        info!(partial = self.catalog.is_partial(), "Starting reference data pipeline");
        if self.catalog.is_partial() {
            self.publisher.ensure_indices().await?;
        } else {
            self.publisher.recreate_indices().await?;
        }

        let report = self.index_all().await;

        let failed = report.failed();
        if !failed.is_empty() {
            error!(failed = ?failed, "Pipeline finished with failed data types");
            return Err(PipelineError::ReplaceFailed {
                data_types: failed,
                report: Box::new(report),
            });
        }

        info!(indexed = report.indexed_total(), "Pipeline finished");
        Ok(report)
    }

    /// Harvest and publish every data type into the existing indices.
    pub async fn index_all(&self) -> PipelineReport {
        let mut report = PipelineReport::default();

        for data_type in self.catalog.iter() {
            let adapter = self.sources.for_source(&data_type.source);

            let outcome = match adapter.fetch(data_type).await {
                Err(e) => {
                    error!(data_type = %data_type.name, error = %e, "Source failed, skipping");
                    DataTypeOutcome::Skipped(e.to_string())
                }
                Ok(entries) if entries.is_empty() => {
                    warn!(data_type = %data_type.name, "Source returned no entries, skipping");
                    DataTypeOutcome::Skipped("no entries".to_string())
                }
                Ok(entries) => match self
                    .publisher
                    .replace(&data_type.index, &data_type.name, &entries)
                    .await
                {
                    Ok(summary) => DataTypeOutcome::Indexed(summary.indexed),
                    Err(e) => {
                        error!(data_type = %data_type.name, error = %e, "Replace failed");
                        DataTypeOutcome::Failed(e.to_string())
                    }
                },
            };

            info!(data_type = %data_type.name, outcome = %outcome, "Processed data type");
            report.outcomes.push((data_type.name.clone(), outcome));
        }

        report
    }
}
