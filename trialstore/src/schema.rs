//! Canonical warehouse schema and conversions between `CanonicalRecord`
//! rows and Arrow record batches. The staging artifact, the staging table,
//! and the analytics table all share this exact schema.

use crate::errors::{Result, StorageError};
use crate::models::{CanonicalRecord, Source};
use chrono::{DateTime, Datelike, NaiveDate};
use deltalake::arrow::array::{
    Array, ArrayRef, Date32Array, ListArray, ListBuilder, StringArray, StringBuilder,
    TimestampMicrosecondArray,
};
use deltalake::arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use deltalake::arrow::record_batch::RecordBatch;
use deltalake::kernel::{ArrayType, DataType as DeltaDataType, PrimitiveType, StructField};
use std::sync::Arc;

/// Column order of the canonical schema. The merge statement enumerates
/// columns from this list, so it must stay in sync with `canonical_schema`.
pub const COLUMNS: [&str; 15] = [
    "trial_id",
    "source",
    "registry_id",
    "title",
    "status",
    "phase",
    "conditions",
    "interventions",
    "sponsor",
    "country",
    "start_date",
    "completion_date",
    "last_updated",
    "ingestion_ts",
    "extras",
];

/// Days between 0001-01-01 (chrono's CE epoch) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn string_list_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
        true,
    )
}

pub fn canonical_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("trial_id", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("registry_id", DataType::Utf8, true),
        Field::new("title", DataType::Utf8, true),
        Field::new("status", DataType::Utf8, true),
        Field::new("phase", DataType::Utf8, true),
        string_list_field("conditions"),
        string_list_field("interventions"),
        Field::new("sponsor", DataType::Utf8, true),
        Field::new("country", DataType::Utf8, true),
        Field::new("start_date", DataType::Date32, true),
        Field::new("completion_date", DataType::Date32, true),
        Field::new("last_updated", DataType::Date32, false),
        Field::new(
            "ingestion_ts",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("extras", DataType::Utf8, true),
    ]))
}

/// Delta column definitions used when creating the warehouse tables.
pub fn delta_columns() -> Vec<StructField> {
    let string = || DeltaDataType::Primitive(PrimitiveType::String);
    let date = || DeltaDataType::Primitive(PrimitiveType::Date);
    let string_array =
        || DeltaDataType::Array(Box::new(ArrayType::new(string(), true)));
    vec![
        StructField::new("trial_id", string(), false),
        StructField::new("source", string(), false),
        StructField::new("registry_id", string(), true),
        StructField::new("title", string(), true),
        StructField::new("status", string(), true),
        StructField::new("phase", string(), true),
        StructField::new("conditions", string_array(), true),
        StructField::new("interventions", string_array(), true),
        StructField::new("sponsor", string(), true),
        StructField::new("country", string(), true),
        StructField::new("start_date", date(), true),
        StructField::new("completion_date", date(), true),
        StructField::new("last_updated", date(), false),
        StructField::new(
            "ingestion_ts",
            DeltaDataType::Primitive(PrimitiveType::Timestamp),
            false,
        ),
        StructField::new("extras", string(), true),
    ]
}

fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn days_to_date(days: i32) -> Result<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
        .ok_or_else(|| StorageError::SchemaMismatch(format!("date out of range: {days}")))
}

fn string_list_array(rows: &[CanonicalRecord], values: impl Fn(&CanonicalRecord) -> &[String]) -> ListArray {
    let mut builder = ListBuilder::new(StringBuilder::new());
    for row in rows {
        for value in values(row) {
            builder.values().append_value(value);
        }
        builder.append(true);
    }
    builder.finish()
}

/// Serializes a validated batch into one Arrow record batch with the
/// canonical schema.
pub fn records_to_batch(records: &[CanonicalRecord]) -> Result<RecordBatch> {
    let trial_id = StringArray::from(
        records.iter().map(|r| r.trial_id.clone()).collect::<Vec<_>>(),
    );
    let source = StringArray::from(
        records
            .iter()
            .map(|r| r.source.as_str().to_string())
            .collect::<Vec<_>>(),
    );
    let registry_id = StringArray::from(
        records.iter().map(|r| r.registry_id.clone()).collect::<Vec<_>>(),
    );
    let title = StringArray::from(records.iter().map(|r| r.title.clone()).collect::<Vec<_>>());
    let status =
        StringArray::from(records.iter().map(|r| r.status.clone()).collect::<Vec<_>>());
    let phase = StringArray::from(records.iter().map(|r| r.phase.clone()).collect::<Vec<_>>());
    let conditions = string_list_array(records, |r| &r.conditions);
    let interventions = string_list_array(records, |r| &r.interventions);
    let sponsor =
        StringArray::from(records.iter().map(|r| r.sponsor.clone()).collect::<Vec<_>>());
    let country =
        StringArray::from(records.iter().map(|r| r.country.clone()).collect::<Vec<_>>());
    let start_date = Date32Array::from(
        records
            .iter()
            .map(|r| r.start_date.map(date_to_days))
            .collect::<Vec<_>>(),
    );
    let completion_date = Date32Array::from(
        records
            .iter()
            .map(|r| r.completion_date.map(date_to_days))
            .collect::<Vec<_>>(),
    );
    let last_updated = Date32Array::from(
        records
            .iter()
            .map(|r| date_to_days(r.last_updated))
            .collect::<Vec<_>>(),
    );
    let ingestion_ts = TimestampMicrosecondArray::from(
        records
            .iter()
            .map(|r| r.ingestion_ts.timestamp_micros())
            .collect::<Vec<_>>(),
    )
    .with_timezone("UTC");
    let extras = StringArray::from(
        records
            .iter()
            .map(|r| {
                if r.extras.is_empty() {
                    None
                } else {
                    Some(serde_json::Value::Object(r.extras.clone()).to_string())
                }
            })
            .collect::<Vec<_>>(),
    );

    let batch = RecordBatch::try_new(
        canonical_schema(),
        vec![
            Arc::new(trial_id),
            Arc::new(source),
            Arc::new(registry_id),
            Arc::new(title),
            Arc::new(status),
            Arc::new(phase),
            Arc::new(conditions),
            Arc::new(interventions),
            Arc::new(sponsor),
            Arc::new(country),
            Arc::new(start_date),
            Arc::new(completion_date),
            Arc::new(last_updated),
            Arc::new(ingestion_ts),
            Arc::new(extras),
        ],
    )?;
    Ok(batch)
}

/// Fails loudly when an artifact schema diverges from the canonical one, so
/// the warehouse load never silently coerces columns.
pub fn ensure_canonical(schema: &Schema) -> Result<()> {
    let canonical = canonical_schema();
    if schema.fields().len() != canonical.fields().len() {
        return Err(StorageError::SchemaMismatch(format!(
            "expected {} columns, found {}",
            canonical.fields().len(),
            schema.fields().len()
        )));
    }
    for (expected, actual) in canonical.fields().iter().zip(schema.fields()) {
        if expected.name() != actual.name()
            || expected.data_type() != actual.data_type()
            || (actual.is_nullable() && !expected.is_nullable())
        {
            return Err(StorageError::SchemaMismatch(format!(
                "column `{}`: expected {:?} (nullable: {}), found `{}` {:?} (nullable: {})",
                expected.name(),
                expected.data_type(),
                expected.is_nullable(),
                actual.name(),
                actual.data_type(),
                actual.is_nullable(),
            )));
        }
    }
    Ok(())
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StorageError::SchemaMismatch(format!("missing column `{name}`")))
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| StorageError::SchemaMismatch(format!("unexpected type for `{name}`")))
}

fn opt_string(array: &StringArray, row: usize) -> Option<String> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row).to_string())
    }
}

fn string_list(array: &ListArray, row: usize, name: &str) -> Result<Vec<String>> {
    if array.is_null(row) {
        return Ok(Vec::new());
    }
    let values = array.value(row);
    let strings = values
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StorageError::SchemaMismatch(format!("unexpected item type for `{name}`")))?;
    Ok((0..strings.len())
        .filter(|&i| !strings.is_null(i))
        .map(|i| strings.value(i).to_string())
        .collect())
}

/// Reads canonical records back out of an Arrow batch, for run summaries
/// and tests.
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<CanonicalRecord>> {
    let trial_id = downcast::<StringArray>(column(batch, "trial_id")?, "trial_id")?;
    let source = downcast::<StringArray>(column(batch, "source")?, "source")?;
    let registry_id = downcast::<StringArray>(column(batch, "registry_id")?, "registry_id")?;
    let title = downcast::<StringArray>(column(batch, "title")?, "title")?;
    let status = downcast::<StringArray>(column(batch, "status")?, "status")?;
    let phase = downcast::<StringArray>(column(batch, "phase")?, "phase")?;
    let conditions = downcast::<ListArray>(column(batch, "conditions")?, "conditions")?;
    let interventions = downcast::<ListArray>(column(batch, "interventions")?, "interventions")?;
    let sponsor = downcast::<StringArray>(column(batch, "sponsor")?, "sponsor")?;
    let country = downcast::<StringArray>(column(batch, "country")?, "country")?;
    let start_date = downcast::<Date32Array>(column(batch, "start_date")?, "start_date")?;
    let completion_date =
        downcast::<Date32Array>(column(batch, "completion_date")?, "completion_date")?;
    let last_updated = downcast::<Date32Array>(column(batch, "last_updated")?, "last_updated")?;
    let ingestion_ts =
        downcast::<TimestampMicrosecondArray>(column(batch, "ingestion_ts")?, "ingestion_ts")?;
    let extras = downcast::<StringArray>(column(batch, "extras")?, "extras")?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let source_str = source.value(row);
        let source = Source::parse(source_str).ok_or_else(|| {
            StorageError::SchemaMismatch(format!("unknown source tag `{source_str}`"))
        })?;
        let ingestion = DateTime::from_timestamp_micros(ingestion_ts.value(row))
            .ok_or_else(|| {
                StorageError::SchemaMismatch("ingestion_ts out of range".to_string())
            })?;
        let extras_map = match opt_string(extras, row) {
            Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw)? {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            },
            None => serde_json::Map::new(),
        };
        records.push(CanonicalRecord {
            trial_id: trial_id.value(row).to_string(),
            source,
            registry_id: opt_string(registry_id, row),
            title: opt_string(title, row),
            status: opt_string(status, row),
            phase: opt_string(phase, row),
            conditions: string_list(conditions, row, "conditions")?,
            interventions: string_list(interventions, row, "interventions")?,
            sponsor: opt_string(sponsor, row),
            country: opt_string(country, row),
            start_date: if start_date.is_null(row) {
                None
            } else {
                Some(days_to_date(start_date.value(row))?)
            },
            completion_date: if completion_date.is_null(row) {
                None
            } else {
                Some(days_to_date(completion_date.value(row))?)
            },
            last_updated: days_to_date(last_updated.value(row))?,
            ingestion_ts: ingestion,
            extras: extras_map,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_record(id: &str) -> CanonicalRecord {
        let mut record = CanonicalRecord::empty(
            Source::Ctgov.prefixed_id(id),
            Source::Ctgov,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap(),
        );
        record.registry_id = Some(id.to_string());
        record.title = Some("A trial".to_string());
        record.status = Some("Recruiting".to_string());
        record.conditions = vec!["Heart Attack".to_string(), "Stroke".to_string()];
        record.start_date = NaiveDate::from_ymd_opt(2023, 11, 15);
        record
            .extras
            .insert("study_type".to_string(), "Interventional".into());
        record
    }

    #[test]
    fn test_batch_round_trip() {
        let records = vec![sample_record("NCT001"), sample_record("NCT002")];
        let batch = records_to_batch(&records).unwrap();
        assert_eq!(batch.num_rows(), 2);
        ensure_canonical(batch.schema().as_ref()).unwrap();

        let restored = batch_to_records(&batch).unwrap();
        assert_eq!(restored, records);
    }

    #[test]
    fn test_schema_mismatch_is_detected() {
        let wrong = Schema::new(vec![Field::new("trial_id", DataType::Utf8, false)]);
        let err = ensure_canonical(&wrong).unwrap_err();
        assert!(matches!(err, StorageError::SchemaMismatch(_)));
    }

    #[test]
    fn test_date_conversion_is_consistent() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_days(date), 0);
        let later = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(days_to_date(date_to_days(later)).unwrap(), later);
    }
}
