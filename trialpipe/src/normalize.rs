//! Per-source normalization into [`CanonicalRecord`]. Each source tag has
//! its own mapping policy (JSON paths, XML elements, or text labels) but
//! all converge on the same canonical attribute set. Normalization is
//! pure: the run's ingestion instant is passed in, never read here.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use scraper::Html;
use serde_json::Value;
use thiserror::Error;
use trialstore::models::{CanonicalRecord, RawPayload, RawRecord, Source};

#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("{source}: missing required field `{field}`")]
    MissingField { source: Source, field: &'static str },

    #[error("{source}: malformed field `{field}`: {detail}")]
    MalformedField {
        source: Source,
        field: &'static str,
        detail: String,
    },

    #[error("{source}: expected {expected} payload, got {got}")]
    PayloadKind {
        source: Source,
        expected: &'static str,
        got: &'static str,
    },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

pub type Result<T> = std::result::Result<T, NormalizationError>;

/// Normalizes one raw record into the canonical shape, dispatching on the
/// source tag. `ingested_at` stamps `ingestion_ts` and is the fallback for
/// `last_updated` when the registry publishes no update date.
pub fn normalize(raw: &RawRecord, ingested_at: DateTime<Utc>) -> Result<CanonicalRecord> {
    match (raw.source, &raw.payload) {
        (Source::Ctgov, RawPayload::Json(study)) => normalize_ctgov(study, ingested_at),
        (Source::Isrctn, RawPayload::Xml(fragment)) => normalize_isrctn(fragment, ingested_at),
        (Source::Euctr, RawPayload::Html(page)) => normalize_euctr(page, ingested_at),
        (Source::EmaCdp, RawPayload::Html(segment)) => normalize_ema(segment, ingested_at),
        (source, payload) => Err(NormalizationError::PayloadKind {
            source,
            expected: match source {
                Source::Ctgov => "json",
                Source::Isrctn => "xml",
                Source::Euctr | Source::EmaCdp => "html",
            },
            got: payload.kind(),
        }),
    }
}

/// Accepts the date shapes the registries actually emit. Unparseable
/// values become `None`; callers decide whether that is an error.
pub fn parse_flexible_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.date_naive());
    }
    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    // Month-only and year-only dates clamp to the first day.
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{value}-01-01"), "%Y-%m-%d") {
        return Some(date);
    }
    None
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ---- ClinicalTrials.gov ----

fn json_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(key))
}

fn json_str(value: &Value, path: &[&str]) -> Option<String> {
    json_path(value, path)
        .and_then(Value::as_str)
        .and_then(non_empty)
}

fn json_str_list(value: &Value, path: &[&str]) -> Vec<String> {
    json_path(value, path)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(non_empty)
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_ctgov(study: &Value, ingested_at: DateTime<Utc>) -> Result<CanonicalRecord> {
    let registry_id = json_str(
        study,
        &["protocolSection", "identificationModule", "nctId"],
    )
    .ok_or(NormalizationError::MissingField {
        source: Source::Ctgov,
        field: "protocolSection.identificationModule.nctId",
    })?;

    let status_module = json_path(study, &["protocolSection", "statusModule"]);
    let date_of = |module: Option<&Value>, key: &str| {
        module
            .and_then(|m| m.get(key))
            .and_then(|s| s.get("date"))
            .and_then(Value::as_str)
            .and_then(parse_flexible_date)
    };

    let last_updated = date_of(status_module, "lastUpdatePostDateStruct")
        .unwrap_or_else(|| ingested_at.date_naive());

    let mut record = CanonicalRecord::empty(
        Source::Ctgov.prefixed_id(&registry_id),
        Source::Ctgov,
        last_updated,
        ingested_at,
    );
    record.registry_id = Some(registry_id);
    record.title = json_str(
        study,
        &["protocolSection", "identificationModule", "briefTitle"],
    );
    record.status = json_str(study, &["protocolSection", "statusModule", "overallStatus"]);

    let phases = json_str_list(study, &["protocolSection", "designModule", "phases"]);
    if !phases.is_empty() {
        record.phase = Some(phases.join(", "));
    }

    record.conditions = dedup_preserving_order(json_str_list(
        study,
        &["protocolSection", "conditionsModule", "conditions"],
    ));

    let interventions = json_path(
        study,
        &["protocolSection", "armsInterventionsModule", "interventions"],
    )
    .and_then(Value::as_array)
    .map(|items| {
        items
            .iter()
            .filter_map(|i| i.get("name"))
            .filter_map(Value::as_str)
            .filter_map(non_empty)
            .collect()
    })
    .unwrap_or_default();
    record.interventions = dedup_preserving_order(interventions);

    record.sponsor = json_str(
        study,
        &[
            "protocolSection",
            "sponsorCollaboratorsModule",
            "leadSponsor",
            "name",
        ],
    );

    let countries = json_path(
        study,
        &["protocolSection", "contactsLocationsModule", "locations"],
    )
    .and_then(Value::as_array)
    .map(|locations| {
        locations
            .iter()
            .filter_map(|l| l.get("country"))
            .filter_map(Value::as_str)
            .filter_map(non_empty)
            .collect()
    })
    .unwrap_or_default();
    let countries = dedup_preserving_order(countries);
    if !countries.is_empty() {
        record.country = Some(countries.join(", "));
    }

    record.start_date = date_of(status_module, "startDateStruct");
    record.completion_date = date_of(status_module, "completionDateStruct");

    if let Some(study_type) = json_str(study, &["protocolSection", "designModule", "studyType"]) {
        record
            .extras
            .insert("study_type".to_string(), Value::String(study_type));
    }

    Ok(record)
}

// ---- ISRCTN ----

/// Fields pulled out of one `fullTrial` XML fragment by a single pass over
/// the element stream.
#[derive(Default)]
struct IsrctnFields {
    last_updated_attr: Option<String>,
    registry_id: Option<String>,
    title: Option<String>,
    scientific_title: Option<String>,
    status: Option<String>,
    phase: Option<String>,
    conditions: Vec<String>,
    interventions: Vec<String>,
    sponsor: Option<String>,
    country: Option<String>,
}

fn path_ends_with(stack: &[String], suffix: &[&str]) -> bool {
    stack.len() >= suffix.len()
        && stack[stack.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

fn collect_isrctn_fields(fragment: &str) -> Result<IsrctnFields> {
    let mut reader = Reader::from_str(fragment);
    let mut fields = IsrctnFields::default();
    let mut stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                if name == "fullTrial" && fields.last_updated_attr.is_none() {
                    for attr in start.attributes() {
                        let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
                        if attr.key.local_name().as_ref() == b"lastUpdated" {
                            fields.last_updated_attr =
                                Some(attr.unescape_value()?.into_owned());
                        }
                    }
                }
                stack.push(name);
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) => {
                let Some(value) = non_empty(&text.unescape()?) else {
                    continue;
                };
                if path_ends_with(&stack, &["isrctn"]) {
                    fields.registry_id.get_or_insert(value);
                } else if path_ends_with(&stack, &["trialDescription", "title"]) {
                    fields.title.get_or_insert(value);
                } else if path_ends_with(&stack, &["scientificTitle"]) {
                    fields.scientific_title.get_or_insert(value);
                } else if path_ends_with(&stack, &["overallStatus"]) {
                    fields.status.get_or_insert(value);
                } else if path_ends_with(&stack, &["phase"]) {
                    fields.phase.get_or_insert(value);
                } else if path_ends_with(&stack, &["condition", "description"]) {
                    fields.conditions.push(value);
                } else if path_ends_with(&stack, &["intervention", "name"]) {
                    fields.interventions.push(value);
                } else if path_ends_with(&stack, &["sponsor", "organisation"]) {
                    fields.sponsor.get_or_insert(value);
                } else if path_ends_with(&stack, &["recruitmentCountries", "country"]) {
                    fields.country.get_or_insert(value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(fields)
}

fn normalize_isrctn(fragment: &str, ingested_at: DateTime<Utc>) -> Result<CanonicalRecord> {
    let fields = collect_isrctn_fields(fragment)?;

    let registry_id = fields
        .registry_id
        .ok_or(NormalizationError::MissingField {
            source: Source::Isrctn,
            field: "isrctn",
        })?;

    let last_updated = fields
        .last_updated_attr
        .as_deref()
        .and_then(parse_flexible_date)
        .unwrap_or_else(|| ingested_at.date_naive());

    let mut record = CanonicalRecord::empty(
        Source::Isrctn.prefixed_id(&registry_id),
        Source::Isrctn,
        last_updated,
        ingested_at,
    );
    record.registry_id = Some(registry_id);
    record.title = fields.title;
    record.status = fields.status;
    record.phase = fields.phase;
    record.conditions = dedup_preserving_order(fields.conditions);
    record.interventions = dedup_preserving_order(fields.interventions);
    record.sponsor = fields.sponsor;
    record.country = fields.country;
    if let Some(scientific_title) = fields.scientific_title {
        record.extras.insert(
            "scientific_title".to_string(),
            Value::String(scientific_title),
        );
    }

    Ok(record)
}

// ---- EUCTR ----

/// Flattens a trial page to visible text, one line per text node, so the
/// label/value pairs of the register's summary table stay adjacent.
fn flatten_html(page: &str) -> String {
    let document = Html::parse_document(page);
    let text: Vec<&str> = document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect();
    text.join("\n")
}

/// The value printed after a label, whether on the same line or the next.
fn label_value(text: &str, label: &str) -> Option<String> {
    let start = text.find(label)? + label.len();
    text[start..]
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn normalize_euctr(page: &str, ingested_at: DateTime<Utc>) -> Result<CanonicalRecord> {
    let text = flatten_html(page);

    let registry_id =
        label_value(&text, "EudraCT Number:").ok_or(NormalizationError::MissingField {
            source: Source::Euctr,
            field: "EudraCT Number",
        })?;

    let mut record = CanonicalRecord::empty(
        Source::Euctr.prefixed_id(&registry_id),
        Source::Euctr,
        ingested_at.date_naive(),
        ingested_at,
    );
    record.registry_id = Some(registry_id);
    record.title = label_value(&text, "Full title of the trial:");
    record.status = label_value(&text, "Trial Status:");
    record.conditions = label_value(&text, "Medical condition:")
        .map(|c| vec![c])
        .unwrap_or_default();
    record.sponsor = label_value(&text, "Name of Sponsor:");
    record.country = label_value(&text, "Member State Concerned:");
    record.start_date = label_value(
        &text,
        "Date on which this record was first entered in the EudraCT database:",
    )
    .as_deref()
    .and_then(parse_flexible_date);

    Ok(record)
}

// ---- EMA clinical data publication ----

static EMA_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{2}/\d{2}/\d{4})\s+Clinical data published").expect("static regex")
});
static EMA_MEDICINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)refer to\s+([A-Za-z0-9][A-Za-z0-9\- ]+?),\s+a\s").expect("static regex")
});

fn normalize_ema(segment: &str, ingested_at: DateTime<Utc>) -> Result<CanonicalRecord> {
    let captures = EMA_HEADING
        .captures(segment)
        .ok_or(NormalizationError::MissingField {
            source: Source::EmaCdp,
            field: "publication date heading",
        })?;
    let published = captures
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default();
    let heading_end = captures
        .get(0)
        .map(|m| m.end())
        .unwrap_or_default();
    let last_updated =
        parse_flexible_date(published).ok_or_else(|| NormalizationError::MalformedField {
            source: Source::EmaCdp,
            field: "publication date",
            detail: published.to_string(),
        })?;

    let block = &segment[heading_end..];
    let summary = block
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string);
    let medicine = EMA_MEDICINE
        .captures(block)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());

    let title = medicine.clone().or_else(|| summary.clone());
    let registry_id = format!(
        "{published}:{}",
        medicine
            .or(summary)
            .unwrap_or_else(|| "clinical-data".to_string())
    );

    let mut record = CanonicalRecord::empty(
        Source::EmaCdp.prefixed_id(&registry_id),
        Source::EmaCdp,
        last_updated,
        ingested_at,
    );
    record.registry_id = Some(registry_id);
    record.title = title;
    record.status = Some("Published".to_string());
    record.country = Some("EU".to_string());

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ingested() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_flexible_date_formats() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_flexible_date("2024-03-01"), Some(date));
        assert_eq!(parse_flexible_date("01/03/2024"), Some(date));
        assert_eq!(parse_flexible_date("2024-03"), Some(date));
        assert_eq!(
            parse_flexible_date("2024"),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(
            parse_flexible_date("2024-03-01T08:30:00.000Z"),
            Some(date)
        );
        assert_eq!(parse_flexible_date("not a date"), None);
    }

    #[test]
    fn test_ctgov_full_mapping() {
        let study = json!({
            "protocolSection": {
                "identificationModule": {"nctId": "NCT001", "briefTitle": "Aspirin after MI"},
                "statusModule": {
                    "overallStatus": "Recruiting",
                    "startDateStruct": {"date": "2023-05"},
                    "completionDateStruct": {"date": "2025-12-31"},
                    "lastUpdatePostDateStruct": {"date": "2024-02-10"}
                },
                "designModule": {"phases": ["PHASE2", "PHASE3"], "studyType": "INTERVENTIONAL"},
                "conditionsModule": {"conditions": ["Myocardial Infarction", "Myocardial Infarction"]},
                "armsInterventionsModule": {"interventions": [{"name": "Aspirin"}, {"name": "Placebo"}]},
                "sponsorCollaboratorsModule": {"leadSponsor": {"name": "Example University"}},
                "contactsLocationsModule": {"locations": [
                    {"country": "United States"}, {"country": "Canada"}, {"country": "United States"}
                ]}
            }
        });
        let raw = RawRecord {
            source: Source::Ctgov,
            payload: RawPayload::Json(study),
        };

        let record = normalize(&raw, ingested()).unwrap();
        assert_eq!(record.trial_id, "CTGOV:NCT001");
        assert_eq!(record.registry_id.as_deref(), Some("NCT001"));
        assert_eq!(record.title.as_deref(), Some("Aspirin after MI"));
        assert_eq!(record.status.as_deref(), Some("Recruiting"));
        assert_eq!(record.phase.as_deref(), Some("PHASE2, PHASE3"));
        assert_eq!(record.conditions, vec!["Myocardial Infarction"]);
        assert_eq!(record.interventions, vec!["Aspirin", "Placebo"]);
        assert_eq!(record.sponsor.as_deref(), Some("Example University"));
        assert_eq!(record.country.as_deref(), Some("United States, Canada"));
        assert_eq!(record.start_date, NaiveDate::from_ymd_opt(2023, 5, 1));
        assert_eq!(
            record.completion_date,
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
        assert_eq!(
            record.last_updated,
            NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
        );
        assert_eq!(
            record.extras.get("study_type"),
            Some(&Value::String("INTERVENTIONAL".to_string()))
        );
    }

    #[test]
    fn test_ctgov_missing_nct_id_is_an_error() {
        let raw = RawRecord {
            source: Source::Ctgov,
            payload: RawPayload::Json(json!({"protocolSection": {}})),
        };
        let err = normalize(&raw, ingested()).unwrap_err();
        assert!(matches!(err, NormalizationError::MissingField { .. }));
    }

    #[test]
    fn test_ctgov_unparseable_dates_become_null() {
        let study = json!({
            "protocolSection": {
                "identificationModule": {"nctId": "NCT002"},
                "statusModule": {"startDateStruct": {"date": "unknown"}}
            }
        });
        let raw = RawRecord {
            source: Source::Ctgov,
            payload: RawPayload::Json(study),
        };

        let record = normalize(&raw, ingested()).unwrap();
        assert_eq!(record.start_date, None);
        assert_eq!(record.last_updated, ingested().date_naive());
    }

    const ISRCTN_FIXTURE: &str = r#"
<fullTrial xmlns="http://www.67bricks.com/isrctn" lastUpdated="2024-02-10T09:00:00.000Z">
  <trial>
    <isrctn>12345678</isrctn>
    <trialDescription>
      <title>Beta blockers after heart attack</title>
      <scientificTitle>A randomised trial of beta blockade</scientificTitle>
    </trialDescription>
    <trialDesign>
      <overallStatus>Completed</overallStatus>
      <phase>Phase III</phase>
    </trialDesign>
    <conditions>
      <condition><description>Myocardial infarction</description></condition>
      <condition><description>Myocardial infarction</description></condition>
    </conditions>
    <interventions>
      <intervention><name>Bisoprolol</name></intervention>
    </interventions>
    <sponsors>
      <sponsor><organisation>Example Trust</organisation></sponsor>
    </sponsors>
    <participants>
      <recruitmentCountries>
        <country>United Kingdom</country>
      </recruitmentCountries>
    </participants>
  </trial>
</fullTrial>"#;

    #[test]
    fn test_isrctn_full_mapping() {
        let raw = RawRecord {
            source: Source::Isrctn,
            payload: RawPayload::Xml(ISRCTN_FIXTURE.to_string()),
        };

        let record = normalize(&raw, ingested()).unwrap();
        assert_eq!(record.trial_id, "ISRCTN:12345678");
        assert_eq!(
            record.title.as_deref(),
            Some("Beta blockers after heart attack")
        );
        assert_eq!(record.status.as_deref(), Some("Completed"));
        assert_eq!(record.phase.as_deref(), Some("Phase III"));
        assert_eq!(record.conditions, vec!["Myocardial infarction"]);
        assert_eq!(record.interventions, vec!["Bisoprolol"]);
        assert_eq!(record.sponsor.as_deref(), Some("Example Trust"));
        assert_eq!(record.country.as_deref(), Some("United Kingdom"));
        assert_eq!(
            record.last_updated,
            NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
        );
        assert_eq!(
            record.extras.get("scientific_title"),
            Some(&Value::String(
                "A randomised trial of beta blockade".to_string()
            ))
        );
    }

    #[test]
    fn test_isrctn_without_id_is_an_error() {
        let raw = RawRecord {
            source: Source::Isrctn,
            payload: RawPayload::Xml("<fullTrial><trial></trial></fullTrial>".to_string()),
        };
        let err = normalize(&raw, ingested()).unwrap_err();
        assert!(matches!(err, NormalizationError::MissingField { .. }));
    }

    const EUCTR_FIXTURE: &str = r#"
<html><body><table>
  <tr><td>EudraCT Number:</td><td>2008-003457-23</td></tr>
  <tr><td>Full title of the trial:</td><td>Early statin therapy after acute myocardial infarction</td></tr>
  <tr><td>Trial Status:</td><td>Completed</td></tr>
  <tr><td>Medical condition:</td><td>Acute myocardial infarction</td></tr>
  <tr><td>Name of Sponsor:</td><td>Example Pharma GmbH</td></tr>
  <tr><td>Member State Concerned:</td><td>Germany</td></tr>
  <tr><td>Date on which this record was first entered in the EudraCT database:</td><td>2008-10-01</td></tr>
</table></body></html>"#;

    #[test]
    fn test_euctr_full_mapping() {
        let raw = RawRecord {
            source: Source::Euctr,
            payload: RawPayload::Html(EUCTR_FIXTURE.to_string()),
        };

        let record = normalize(&raw, ingested()).unwrap();
        assert_eq!(record.trial_id, "EUCTR:2008-003457-23");
        assert_eq!(
            record.title.as_deref(),
            Some("Early statin therapy after acute myocardial infarction")
        );
        assert_eq!(record.status.as_deref(), Some("Completed"));
        assert_eq!(record.conditions, vec!["Acute myocardial infarction"]);
        assert_eq!(record.sponsor.as_deref(), Some("Example Pharma GmbH"));
        assert_eq!(record.country.as_deref(), Some("Germany"));
        assert_eq!(record.start_date, NaiveDate::from_ymd_opt(2008, 10, 1));
        assert_eq!(record.last_updated, ingested().date_naive());
    }

    #[test]
    fn test_euctr_page_without_eudract_number_is_an_error() {
        let raw = RawRecord {
            source: Source::Euctr,
            payload: RawPayload::Html("<html><body>No trial here</body></html>".to_string()),
        };
        let err = normalize(&raw, ingested()).unwrap_err();
        assert!(matches!(err, NormalizationError::MissingField { .. }));
    }

    #[test]
    fn test_ema_segment_with_medicine_name() {
        let segment = "14/02/2024\nClinical data published\nThe published data\nrefer to Examplamab, a monoclonal antibody.";
        let raw = RawRecord {
            source: Source::EmaCdp,
            payload: RawPayload::Html(segment.to_string()),
        };

        let record = normalize(&raw, ingested()).unwrap();
        assert_eq!(record.title.as_deref(), Some("Examplamab"));
        assert_eq!(record.status.as_deref(), Some("Published"));
        assert_eq!(record.country.as_deref(), Some("EU"));
        assert_eq!(record.registry_id.as_deref(), Some("14/02/2024:Examplamab"));
        assert_eq!(record.trial_id, "EMA_CDP:14/02/2024:Examplamab");
        assert_eq!(
            record.last_updated,
            NaiveDate::from_ymd_opt(2024, 2, 14).unwrap()
        );
    }

    #[test]
    fn test_ema_segment_falls_back_to_summary_line() {
        let segment = "03/11/2023 Clinical data published\nNew clinical data package available.";
        let raw = RawRecord {
            source: Source::EmaCdp,
            payload: RawPayload::Html(segment.to_string()),
        };

        let record = normalize(&raw, ingested()).unwrap();
        assert_eq!(
            record.title.as_deref(),
            Some("New clinical data package available.")
        );
        assert_eq!(
            record.registry_id.as_deref(),
            Some("03/11/2023:New clinical data package available.")
        );
    }

    #[test]
    fn test_ema_segment_without_heading_is_an_error() {
        let raw = RawRecord {
            source: Source::EmaCdp,
            payload: RawPayload::Html("unrelated text".to_string()),
        };
        let err = normalize(&raw, ingested()).unwrap_err();
        assert!(matches!(err, NormalizationError::MissingField { .. }));
    }

    #[test]
    fn test_payload_kind_mismatch_is_an_error() {
        let raw = RawRecord {
            source: Source::Ctgov,
            payload: RawPayload::Html("<html></html>".to_string()),
        };
        let err = normalize(&raw, ingested()).unwrap_err();
        assert!(matches!(err, NormalizationError::PayloadKind { .. }));
    }
}
