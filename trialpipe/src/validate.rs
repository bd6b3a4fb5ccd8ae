//! Batch validation between normalization and staging. Two severities:
//! fatal rules (required columns, in-batch key uniqueness) abort the
//! batch; warning rules (sparse optional columns) are reported and let
//! the batch through.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use trialstore::models::{CanonicalRecord, Source};

#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Fraction of null values in an optional column above which a
    /// warning finding is reported.
    pub null_fraction_threshold: f64,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            null_fraction_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Fatal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub rule: &'static str,
    pub message: String,
}

/// Everything the rules surfaced for one batch. The batch is stageable
/// only when no fatal finding is present; `validate_batch` enforces that
/// by returning an error instead.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn warnings(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }
}

#[derive(Debug, Error)]
#[error("batch for source `{source}` failed validation: {}", violations.join("; "))]
pub struct DataValidationError {
    pub source: Source,
    pub violations: Vec<String>,
}

pub type Result<T> = std::result::Result<T, DataValidationError>;

/// Checks one normalized batch. Fatal violations are collected across
/// the whole batch before failing, so the error names every offender.
pub fn validate_batch(
    source: Source,
    records: &[CanonicalRecord],
    options: &ValidationOptions,
) -> Result<ValidationReport> {
    let mut violations = Vec::new();
    let mut report = ValidationReport::default();

    for (index, record) in records.iter().enumerate() {
        if record.trial_id.trim().is_empty() {
            violations.push(format!("record {index}: empty trial_id"));
        }
        if record.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            violations.push(format!(
                "record {index} ({}): missing required column `title`",
                record.trial_id
            ));
        }
        if record
            .status
            .as_deref()
            .map_or(true, |s| s.trim().is_empty())
        {
            violations.push(format!(
                "record {index} ({}): missing required column `status`",
                record.trial_id
            ));
        }
    }

    // Uniqueness is fatal here: duplicates inside one normalized batch
    // mean the normalizer produced colliding keys, not ordinary
    // cross-run duplication.
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        if let Some(&earlier) = first_seen.get(record.trial_id.as_str()) {
            violations.push(format!(
                "duplicate trial_id `{}` at records {earlier} and {index}",
                record.trial_id
            ));
        } else {
            first_seen.insert(record.trial_id.as_str(), index);
        }
    }

    if !violations.is_empty() {
        return Err(DataValidationError { source, violations });
    }

    if !records.is_empty() {
        let total = records.len() as f64;
        let optional_columns: [(&str, Box<dyn Fn(&CanonicalRecord) -> bool>); 7] = [
            ("registry_id", Box::new(|r| r.registry_id.is_none())),
            ("phase", Box::new(|r| r.phase.is_none())),
            ("conditions", Box::new(|r| r.conditions.is_empty())),
            ("interventions", Box::new(|r| r.interventions.is_empty())),
            ("sponsor", Box::new(|r| r.sponsor.is_none())),
            ("country", Box::new(|r| r.country.is_none())),
            ("start_date", Box::new(|r| r.start_date.is_none())),
        ];
        for (column, is_null) in &optional_columns {
            let nulls = records.iter().filter(|r| is_null(r)).count();
            let fraction = nulls as f64 / total;
            if fraction > options.null_fraction_threshold {
                report.findings.push(Finding {
                    severity: Severity::Warning,
                    rule: "null-fraction",
                    message: format!(
                        "column `{column}` is null in {nulls}/{} records ({:.0}%)",
                        records.len(),
                        fraction * 100.0
                    ),
                });
            }
        }
    }

    Ok(report)
}
