//! Pipeline layer: normalization into the canonical record shape, batch
//! validation, and the run orchestrator that drives fetch → normalize →
//! validate → stage → merge across all configured registries.

pub mod normalize;
pub mod pipeline;
pub mod validate;

pub use crate::normalize::{normalize, NormalizationError};
pub use crate::pipeline::{
    MergeStatus, Pipeline, PipelineOptions, RunSummary, SourceFailure, SourceOutcome,
};
pub use crate::validate::{
    validate_batch, DataValidationError, Finding, Severity, ValidationOptions, ValidationReport,
};
