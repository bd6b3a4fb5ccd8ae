//! Columnar staging artifact. Each validated batch is spooled to a local
//! Parquet file before being uploaded and loaded into the staging table,
//! matching the warehouse load's append semantics.

use crate::errors::Result;
use crate::schema;
use deltalake::arrow::record_batch::RecordBatch;
use deltalake::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use deltalake::parquet::arrow::ArrowWriter;
use deltalake::parquet::basic::Compression;
use deltalake::parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;

/// Writes one batch to `path` as Snappy-compressed Parquet.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Reads a staging artifact back, verifying the schema matches the
/// canonical one before any row is returned.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    schema::ensure_canonical(builder.schema().as_ref())?;
    let reader = builder.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;
    use crate::models::{CanonicalRecord, Source};
    use chrono::{NaiveDate, TimeZone, Utc};
    use deltalake::arrow::array::StringArray;
    use deltalake::arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn record(id: &str) -> CanonicalRecord {
        let mut record = CanonicalRecord::empty(
            Source::Isrctn.prefixed_id(id),
            Source::Isrctn,
            NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 21, 8, 30, 0).unwrap(),
        );
        record.title = Some("Fixture trial".to_string());
        record.status = Some("Ongoing".to_string());
        record
    }

    #[test]
    fn test_artifact_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run/isrctn.parquet");
        let records = vec![record("10001"), record("10002")];
        let batch = schema::records_to_batch(&records).unwrap();

        write_parquet(&path, &batch).unwrap();
        let batches = read_parquet(&path).unwrap();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);

        let restored = schema::batch_to_records(&batches[0]).unwrap();
        assert_eq!(restored, records);
    }

    #[test]
    fn test_foreign_schema_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bogus.parquet");

        let schema = Arc::new(Schema::new(vec![Field::new("name", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(vec!["x".to_string()]))],
        )
        .unwrap();
        write_parquet(&path, &batch).unwrap();

        let err = read_parquet(&path).unwrap_err();
        assert!(matches!(err, StorageError::SchemaMismatch(_)));
    }
}
