pub mod artifact;
pub mod bucket;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod models;
pub mod schema;
pub mod warehouse;

use crate::bucket::{ArtifactStore, LocalBucket};
use crate::catalog::Catalog;
use crate::config::WarehouseConfig;
use crate::errors::Result;
use crate::models::{CanonicalRecord, Source, StagedBatch};
use crate::warehouse::Warehouse;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// The main entry point for the `trialstore` library.
///
/// `TrialStore` bundles everything below the pipeline orchestrator:
/// - the warehouse (`Warehouse`) with its staging and analytics Delta
///   tables,
/// - the object store (`ArtifactStore`) staging artifacts are uploaded to,
/// - a SQLite run catalog (`Catalog`) for operator-facing run logs.
pub struct TrialStore {
    pub config: WarehouseConfig,
    pub catalog: Arc<Catalog>,
    pub bucket: Arc<dyn ArtifactStore>,
    pub warehouse: Arc<Warehouse>,
}

impl TrialStore {
    /// Opens a store rooted at the configured paths, creating warehouse
    /// tables and catalog schema on first use.
    pub async fn new(config: WarehouseConfig) -> Result<Self> {
        let bucket = Arc::new(LocalBucket::new(config.bucket_path.clone()));
        Self::with_bucket(config, bucket).await
    }

    /// Same as [`TrialStore::new`] but with an injected object store, for
    /// deployments that target a remote bucket.
    pub async fn with_bucket(
        config: WarehouseConfig,
        bucket: Arc<dyn ArtifactStore>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&config.spool_path).await?;

        let catalog = Arc::new(Catalog::new(&config)?);
        catalog.initialize_schema()?;

        let warehouse = Arc::new(Warehouse::open(config.clone()).await?);

        Ok(Self {
            config,
            catalog,
            bucket,
            warehouse,
        })
    }

    /// Stages one validated batch: spools it to a local Parquet artifact,
    /// uploads the artifact to the object store, then loads it into the
    /// staging table. Both side effects must succeed for the batch to count
    /// as staged.
    pub async fn stage_batch(
        &self,
        run_id: Uuid,
        source: Source,
        records: &[CanonicalRecord],
    ) -> Result<StagedBatch> {
        let batch = schema::records_to_batch(records)?;

        let spool_path = self
            .config
            .spool_path
            .join(run_id.to_string())
            .join(format!("{source}.parquet"));
        artifact::write_parquet(&spool_path, &batch)?;

        let ingestion_date = Utc::now().format("%Y-%m-%d");
        let object_path = format!(
            "staging/unified/ingestion_date={ingestion_date}/{source}_{run_id}.parquet"
        );
        let location = self.bucket.upload(&object_path, &spool_path).await?;

        let rows = self.warehouse.load_staging(&spool_path).await?;
        log::info!("staged {rows} rows for source `{source}` at {location}");

        Ok(StagedBatch {
            source,
            rows,
            location,
        })
    }
}
