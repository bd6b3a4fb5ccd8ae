use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four registries the pipeline ingests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Ctgov,
    Isrctn,
    Euctr,
    EmaCdp,
}

impl Source {
    pub fn all() -> [Source; 4] {
        [Source::Ctgov, Source::Isrctn, Source::Euctr, Source::EmaCdp]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Ctgov => "ctgov",
            Source::Isrctn => "isrctn",
            Source::Euctr => "euctr",
            Source::EmaCdp => "ema_cdp",
        }
    }

    /// Prefix that makes registry identifiers globally unique across sources.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Source::Ctgov => "CTGOV",
            Source::Isrctn => "ISRCTN",
            Source::Euctr => "EUCTR",
            Source::EmaCdp => "EMA_CDP",
        }
    }

    pub fn prefixed_id(&self, registry_id: &str) -> String {
        format!("{}:{}", self.id_prefix(), registry_id)
    }

    pub fn parse(value: &str) -> Option<Source> {
        match value {
            "ctgov" => Some(Source::Ctgov),
            "isrctn" => Some(Source::Isrctn),
            "euctr" => Some(Source::Euctr),
            "ema_cdp" => Some(Source::EmaCdp),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// `thiserror` treats struct fields named `source` as the error cause and
// requires them to implement `Error`; the pipeline error types carry a
// `Source` under that name.
impl std::error::Error for Source {}

/// One unparsed record as produced by a source adapter. The payload keeps
/// the source's native shape; field extraction happens in the normalizer.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub source: Source,
    pub payload: RawPayload,
}

#[derive(Debug, Clone)]
pub enum RawPayload {
    /// One JSON object from an API response (CTGov study).
    Json(serde_json::Value),
    /// One XML fragment (ISRCTN `fullTrial` subtree).
    Xml(String),
    /// One HTML document or text segment (EUCTR trial page, EMA news item).
    Html(String),
}

impl RawPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            RawPayload::Json(_) => "json",
            RawPayload::Xml(_) => "xml",
            RawPayload::Html(_) => "html",
        }
    }
}

/// The unified record shape every source normalizes into. Column order and
/// types mirror the warehouse schema in `schema.rs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub trial_id: String,
    pub source: Source,
    pub registry_id: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub phase: Option<String>,
    pub conditions: Vec<String>,
    pub interventions: Vec<String>,
    pub sponsor: Option<String>,
    pub country: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    /// Freshness tie-breaker for the merge; falls back to the ingestion date
    /// when the registry does not publish an update date.
    pub last_updated: NaiveDate,
    pub ingestion_ts: DateTime<Utc>,
    /// Source-specific passthrough fields, serialized as one JSON object.
    pub extras: serde_json::Map<String, serde_json::Value>,
}

impl CanonicalRecord {
    /// A record with every optional column null, useful as a starting point
    /// for the per-source normalizers.
    pub fn empty(
        trial_id: String,
        source: Source,
        last_updated: NaiveDate,
        ingestion_ts: DateTime<Utc>,
    ) -> Self {
        Self {
            trial_id,
            source,
            registry_id: None,
            title: None,
            status: None,
            phase: None,
            conditions: Vec::new(),
            interventions: Vec::new(),
            sponsor: None,
            country: None,
            start_date: None,
            completion_date: None,
            last_updated,
            ingestion_ts,
            extras: serde_json::Map::new(),
        }
    }
}

/// Outcome of staging one validated batch: spooled, uploaded, and loaded
/// into the warehouse staging table.
#[derive(Debug, Clone, Serialize)]
pub struct StagedBatch {
    pub source: Source,
    pub rows: u64,
    /// Object-store location of the uploaded artifact.
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_ids_are_globally_distinct() {
        let id = "12345";
        let prefixed: Vec<String> = Source::all()
            .iter()
            .map(|s| s.prefixed_id(id))
            .collect();
        let unique: std::collections::HashSet<&String> = prefixed.iter().collect();
        assert_eq!(unique.len(), 4);
        assert_eq!(prefixed[0], "CTGOV:12345");
    }

    #[test]
    fn test_source_round_trips_through_str() {
        for source in Source::all() {
            assert_eq!(Source::parse(source.as_str()), Some(source));
        }
        assert_eq!(Source::parse("who"), None);
    }
}
