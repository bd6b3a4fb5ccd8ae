use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory holding the Delta tables.
    pub warehouse_path: PathBuf,
    /// Root directory of the local object-store bucket.
    pub bucket_path: PathBuf,
    /// Scratch directory where staging artifacts are spooled before upload.
    pub spool_path: PathBuf,
    pub catalog_path: PathBuf,
    pub staging_table: String,
    pub analytics_table: String,
}

impl WarehouseConfig {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        Self {
            warehouse_path: base_path.join("warehouse"),
            bucket_path: base_path.join("bucket"),
            spool_path: base_path.join("spool"),
            catalog_path: base_path.join("catalog.sqlite"),
            staging_table: "stg_trials".to_string(),
            analytics_table: "analytics_trials".to_string(),
        }
    }

    pub fn staging_table_uri(&self) -> String {
        self.warehouse_path
            .join(&self.staging_table)
            .to_string_lossy()
            .into_owned()
    }

    pub fn analytics_table_uri(&self) -> String {
        self.warehouse_path
            .join(&self.analytics_table)
            .to_string_lossy()
            .into_owned()
    }
}
