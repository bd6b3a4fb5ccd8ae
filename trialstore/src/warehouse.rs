//! Warehouse layer: the staging and analytics Delta tables and the three
//! operations the pipeline consumes, truncate / load / merge. The merge is
//! a deduplicating upsert keyed on `trial_id`: incoming rows that are at
//! least as fresh (by `last_updated`) overwrite all columns, strictly older
//! rows are discarded, and unknown trials are inserted.

use crate::artifact;
use crate::config::WarehouseConfig;
use crate::errors::Result;
use crate::models::CanonicalRecord;
use crate::schema::{self, COLUMNS};
use deltalake::datafusion::physical_plan::common::collect as collect_batches;
use deltalake::datafusion::prelude::{col, SessionContext};
use deltalake::protocol::SaveMode;
use deltalake::table::builder::ensure_table_uri;
use deltalake::{open_table, DeltaOps, DeltaTable};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Row counts reported by one merge pass.
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub rows_inserted: u64,
    pub rows_updated: u64,
    pub source_rows: u64,
}

pub struct Warehouse {
    config: WarehouseConfig,
}

impl Warehouse {
    /// Opens the warehouse, creating both tables with the canonical schema
    /// when they do not exist yet.
    pub async fn open(config: WarehouseConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.warehouse_path).await?;
        Self::ensure_table(&config.staging_table_uri()).await?;
        Self::ensure_table(&config.analytics_table_uri()).await?;
        Ok(Self { config })
    }

    async fn ensure_table(uri: &str) -> Result<DeltaTable> {
        let table = DeltaOps::try_from_uri(ensure_table_uri(uri)?)
            .await?
            .create()
            .with_columns(schema::delta_columns())
            .with_save_mode(SaveMode::Ignore)
            .await?;
        Ok(table)
    }

    async fn staging(&self) -> Result<DeltaTable> {
        Ok(open_table(ensure_table_uri(self.config.staging_table_uri())?).await?)
    }

    async fn analytics(&self) -> Result<DeltaTable> {
        Ok(open_table(ensure_table_uri(self.config.analytics_table_uri())?).await?)
    }

    /// Deletes every staged row so the next load starts from empty.
    pub async fn truncate_staging(&self) -> Result<()> {
        let staging = self.staging().await?;
        let (_table, metrics) = DeltaOps(staging).delete().await?;
        log::info!(
            "truncated staging table `{}` ({} rows removed)",
            self.config.staging_table,
            metrics.num_deleted_rows
        );
        Ok(())
    }

    /// Loads a staging artifact into the staging table with append
    /// semantics. The artifact schema is checked against the canonical
    /// schema before anything is written.
    pub async fn load_staging(&self, artifact_path: &Path) -> Result<u64> {
        let batches = artifact::read_parquet(artifact_path)?;
        let rows: u64 = batches.iter().map(|b| b.num_rows() as u64).sum();
        let staging = self.staging().await?;
        DeltaOps(staging)
            .write(batches)
            .with_save_mode(SaveMode::Append)
            .await?;
        log::info!(
            "loaded {} rows into staging table `{}`",
            rows,
            self.config.staging_table
        );
        Ok(rows)
    }

    /// Runs the deduplicating upsert from staging into analytics. The merge
    /// source keeps only the freshest staged row per `trial_id`, mirroring
    /// the warehouse-side ROW_NUMBER dedup, and drops null keys.
    pub async fn merge_into_analytics(&self) -> Result<MergeOutcome> {
        let staging = self.staging().await?;
        let analytics = self.analytics().await?;

        let ctx = SessionContext::new();
        ctx.register_table("staging", Arc::new(staging))?;

        let projection = COLUMNS
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let source = ctx
            .sql(&format!(
                "SELECT {projection} FROM ( \
                     SELECT *, ROW_NUMBER() OVER ( \
                         PARTITION BY \"trial_id\" \
                         ORDER BY \"last_updated\" DESC, \"ingestion_ts\" DESC \
                     ) AS rn \
                     FROM staging WHERE \"trial_id\" IS NOT NULL \
                 ) ranked WHERE rn = 1"
            ))
            .await?;

        let builder = DeltaOps(analytics)
            .merge(source, col("target.trial_id").eq(col("source.trial_id")))
            .with_source_alias("source")
            .with_target_alias("target")
            .when_matched_update(|mut update| {
                update = update
                    .predicate(col("source.last_updated").gt_eq(col("target.last_updated")));
                for column in COLUMNS.iter().filter(|c| **c != "trial_id") {
                    update = update.update(*column, col(format!("source.{column}").as_str()));
                }
                update
            })?
            .when_not_matched_insert(|mut insert| {
                for column in COLUMNS {
                    insert = insert.set(column, col(format!("source.{column}").as_str()));
                }
                insert
            })?;

        let (_table, metrics) = builder.await?;
        let outcome = MergeOutcome {
            rows_inserted: metrics.num_target_rows_inserted as u64,
            rows_updated: metrics.num_target_rows_updated as u64,
            source_rows: metrics.num_source_rows as u64,
        };
        log::info!(
            "merged staging into `{}`: {} inserted, {} updated ({} source rows)",
            self.config.analytics_table,
            outcome.rows_inserted,
            outcome.rows_updated,
            outcome.source_rows
        );
        Ok(outcome)
    }

    pub async fn staging_row_count(&self) -> Result<u64> {
        let staging = self.staging().await?;
        let (_table, stream) = DeltaOps(staging).load().await?;
        let batches = collect_batches(stream).await?;
        Ok(batches.iter().map(|b| b.num_rows() as u64).sum())
    }

    /// Full snapshot of the analytics table, sorted by `trial_id` for
    /// deterministic assertions and summaries.
    pub async fn analytics_records(&self) -> Result<Vec<CanonicalRecord>> {
        let analytics = self.analytics().await?;
        let (_table, stream) = DeltaOps(analytics).load().await?;
        let batches = collect_batches(stream).await?;
        let mut records = Vec::new();
        for batch in &batches {
            records.extend(schema::batch_to_records(batch)?);
        }
        records.sort_by(|a, b| a.trial_id.cmp(&b.trial_id));
        Ok(records)
    }
}
