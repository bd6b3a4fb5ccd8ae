//! Run orchestration: fetch, normalize, validate, and stage each source
//! independently, then one merge pass over everything that staged. A
//! source failure never blocks its siblings; only a merge failure leaves
//! the staging table intact for a retry.

use crate::normalize::normalize;
use crate::validate::{validate_batch, ValidationOptions};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use trialstore::errors::Result;
use trialstore::models::Source;
use trialstore::warehouse::MergeOutcome;
use trialstore::TrialStore;
use regfetcher::RegistryFetcher;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub validation: ValidationOptions,
}

/// Where in the per-source sequence a failure happened, with the error
/// text for the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub stage: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: Source,
    pub fetched: usize,
    pub normalized: usize,
    /// Records dropped by normalization failures.
    pub dropped: usize,
    pub rows_staged: u64,
    pub warnings: usize,
    pub error: Option<SourceFailure>,
}

impl SourceOutcome {
    fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "outcome", rename_all = "snake_case")]
pub enum MergeStatus {
    /// Nothing staged, nothing to merge.
    Skipped,
    Completed(MergeOutcome),
    /// Staging is left intact so the run can be retried merge-only.
    Failed(String),
}

/// Operator-facing summary of one run, also persisted in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
    pub merge: MergeStatus,
}

impl RunSummary {
    /// A run succeeds only when every configured source succeeded and
    /// the merge did not fail. Partial data may still have been merged.
    pub fn succeeded(&self) -> bool {
        self.sources.iter().all(SourceOutcome::succeeded)
            && !matches!(self.merge, MergeStatus::Failed(_))
    }
}

pub struct Pipeline {
    store: TrialStore,
    fetchers: Vec<Arc<dyn RegistryFetcher>>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        store: TrialStore,
        fetchers: Vec<Arc<dyn RegistryFetcher>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            fetchers,
            options,
        }
    }

    pub fn store(&self) -> &TrialStore {
        &self.store
    }

    /// Runs the full pipeline once. Per-source errors are captured in the
    /// summary; only warehouse infrastructure failures propagate.
    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        log::info!("run {run_id}: starting with {} sources", self.fetchers.len());

        self.store.catalog.create_run_log(run_id)?;

        // Every run starts from an empty staging table; leftovers from an
        // aborted run would otherwise leak into this run's merge.
        self.store.warehouse.truncate_staging().await?;

        let mut sources = Vec::with_capacity(self.fetchers.len());
        for fetcher in &self.fetchers {
            let outcome = self.run_source(run_id, fetcher.as_ref()).await;
            let (status, error) = match &outcome.error {
                None => ("SUCCESS", None),
                Some(failure) => ("FAILED", Some(failure.message.as_str())),
            };
            self.store.catalog.record_source_outcome(
                run_id,
                outcome.source.as_str(),
                status,
                outcome.rows_staged,
                error,
            )?;
            sources.push(outcome);
        }

        let total_staged: u64 = sources.iter().map(|s| s.rows_staged).sum();
        let merge = if total_staged == 0 {
            log::info!("run {run_id}: nothing staged, skipping merge");
            MergeStatus::Skipped
        } else {
            match self.store.warehouse.merge_into_analytics().await {
                Ok(outcome) => {
                    self.store.warehouse.truncate_staging().await?;
                    MergeStatus::Completed(outcome)
                }
                Err(err) => {
                    log::error!("run {run_id}: merge failed, staging preserved: {err}");
                    MergeStatus::Failed(err.to_string())
                }
            }
        };

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            sources,
            merge,
        };

        let status = if summary.succeeded() { "SUCCESS" } else { "FAILED" };
        let details = serde_json::to_string(&summary)?;
        self.store.catalog.finish_run_log(run_id, status, &details)?;
        log::info!("run {run_id}: finished with status {status}");

        Ok(summary)
    }

    /// Merges whatever a previous run left in the staging table, without
    /// fetching anything. The retry path after a merge failure.
    pub async fn merge_staged(&self) -> Result<MergeStatus> {
        let staged = self.store.warehouse.staging_row_count().await?;
        if staged == 0 {
            log::info!("staging table is empty, nothing to merge");
            return Ok(MergeStatus::Skipped);
        }
        match self.store.warehouse.merge_into_analytics().await {
            Ok(outcome) => {
                self.store.warehouse.truncate_staging().await?;
                Ok(MergeStatus::Completed(outcome))
            }
            Err(err) => {
                log::error!("merge retry failed, staging preserved: {err}");
                Ok(MergeStatus::Failed(err.to_string()))
            }
        }
    }

    async fn run_source(&self, run_id: Uuid, fetcher: &dyn RegistryFetcher) -> SourceOutcome {
        let source = fetcher.source();
        let mut outcome = SourceOutcome {
            source,
            fetched: 0,
            normalized: 0,
            dropped: 0,
            rows_staged: 0,
            warnings: 0,
            error: None,
        };

        let raw = match fetcher.fetch().await {
            Ok(raw) => raw,
            Err(err) => {
                log::error!("{source}: fetch failed: {err}");
                outcome.error = Some(SourceFailure {
                    stage: "fetch",
                    message: err.to_string(),
                });
                return outcome;
            }
        };
        outcome.fetched = raw.len();

        let ingested_at = Utc::now();
        let mut records = Vec::with_capacity(raw.len());
        for record in &raw {
            match normalize(record, ingested_at) {
                Ok(canonical) => records.push(canonical),
                Err(err) => {
                    log::warn!("{source}: dropping record: {err}");
                    outcome.dropped += 1;
                }
            }
        }
        outcome.normalized = records.len();
        if outcome.fetched > 0 && records.is_empty() {
            outcome.error = Some(SourceFailure {
                stage: "normalize",
                message: format!("all {} fetched records failed normalization", outcome.fetched),
            });
            return outcome;
        }
        if records.is_empty() {
            log::info!("{source}: nothing fetched, nothing to stage");
            return outcome;
        }

        match validate_batch(source, &records, &self.options.validation) {
            Ok(report) => {
                outcome.warnings = report.warnings();
                for finding in &report.findings {
                    log::warn!("{source}: {}: {}", finding.rule, finding.message);
                }
            }
            Err(err) => {
                log::error!("{source}: validation failed: {err}");
                outcome.error = Some(SourceFailure {
                    stage: "validate",
                    message: err.to_string(),
                });
                return outcome;
            }
        }

        match self.store.stage_batch(run_id, source, &records).await {
            Ok(staged) => outcome.rows_staged = staged.rows,
            Err(err) => {
                log::error!("{source}: staging failed: {err}");
                outcome.error = Some(SourceFailure {
                    stage: "stage",
                    message: err.to_string(),
                });
            }
        }

        outcome
    }
}
