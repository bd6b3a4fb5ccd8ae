use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite operation failed: {0}")]
    SQLite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Delta table operation failed: {0}")]
    Delta(#[from] deltalake::DeltaTableError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] deltalake::arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] deltalake::parquet::errors::ParquetError),

    #[error("Query engine error: {0}")]
    DataFusion(#[from] deltalake::datafusion::error::DataFusionError),

    #[error("Staging artifact schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Staging failed: {0}")]
    Staging(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
