//! ClinicalTrials.gov v2 API adapter. Pages through `/api/v2/studies`
//! with a condition query and yields one raw JSON record per study.

use crate::error::Result;
use crate::{default_client, RegistryFetcher, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use trialstore::models::{RawPayload, RawRecord, Source};

const CTGOV_BASE_URL: &str = "https://clinicaltrials.gov/api/v2/studies";
const PAGE_SIZE: u32 = 100;

pub struct CtgovFetcher {
    client: reqwest::Client,
    base_url: String,
    condition: String,
}

impl CtgovFetcher {
    pub fn new(condition: &str) -> Result<Self> {
        Ok(Self {
            client: default_client(DEFAULT_TIMEOUT)?,
            base_url: CTGOV_BASE_URL.to_string(),
            condition: condition.to_string(),
        })
    }

    pub fn with_timeout(condition: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: default_client(timeout)?,
            base_url: CTGOV_BASE_URL.to_string(),
            condition: condition.to_string(),
        })
    }
}

/// Splits one API response page into per-study raw records.
pub fn studies_from_page(page: &Value) -> Vec<RawRecord> {
    page.get("studies")
        .and_then(Value::as_array)
        .map(|studies| {
            studies
                .iter()
                .map(|study| RawRecord {
                    source: Source::Ctgov,
                    payload: RawPayload::Json(study.clone()),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl RegistryFetcher for CtgovFetcher {
    fn source(&self) -> Source {
        Source::Ctgov
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&self.base_url).query(&[
                ("query.cond", self.condition.as_str()),
                ("pageSize", &PAGE_SIZE.to_string()),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: Value = request.send().await?.error_for_status()?.json().await?;
            records.extend(studies_from_page(&page));

            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        log::info!("ctgov: fetched {} studies", records.len());
        Ok(records)
    }
}
