//! ISRCTN registry adapter. The query API returns one XML document with a
//! `fullTrial` element per trial; the adapter splits it into per-trial
//! fragments so the normalizer sees exactly one trial at a time.

use crate::error::{FetchError, Result};
use crate::{default_client, RegistryFetcher, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use trialstore::models::{RawPayload, RawRecord, Source};

const ISRCTN_BASE_URL: &str = "https://www.isrctn.com/api/query/format/default";

pub struct IsrctnFetcher {
    client: reqwest::Client,
    base_url: String,
    query: String,
    limit: u32,
}

impl IsrctnFetcher {
    pub fn new(query: &str, limit: u32) -> Result<Self> {
        Self::with_timeout(query, limit, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(query: &str, limit: u32, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: default_client(timeout)?,
            base_url: ISRCTN_BASE_URL.to_string(),
            query: query.to_string(),
            limit,
        })
    }
}

/// Splits the API response into one XML fragment per `fullTrial` element,
/// keeping the opening tag's attributes (`lastUpdated` among them).
pub fn split_full_trials(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut fragments = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) if start.local_name().as_ref() == b"fullTrial" => {
                let raw_tag = String::from_utf8_lossy(&start).into_owned();
                let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let inner = reader.read_text(start.name())?;
                fragments.push(format!("<{raw_tag}>{inner}</{qname}>"));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(fragments)
}

#[async_trait]
impl RegistryFetcher for IsrctnFetcher {
    fn source(&self) -> Source {
        Source::Isrctn
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", self.query.as_str()), ("limit", &self.limit.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.to_lowercase().contains("xml") {
            return Err(FetchError::ContentType {
                url: self.base_url.clone(),
                content_type,
            });
        }

        let body = response.text().await?;
        let records: Vec<RawRecord> = split_full_trials(&body)?
            .into_iter()
            .map(|fragment| RawRecord {
                source: Source::Isrctn,
                payload: RawPayload::Xml(fragment),
            })
            .collect();

        log::info!("isrctn: fetched {} trials", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<allTrials xmlns="http://www.67bricks.com/isrctn" totalCount="2">
  <fullTrial lastUpdated="2024-02-10T09:00:00.000Z">
    <trial>
      <isrctn>12345678</isrctn>
      <trialDescription><title>First trial</title></trialDescription>
    </trial>
  </fullTrial>
  <fullTrial lastUpdated="2023-11-01T12:30:00.000Z">
    <trial>
      <isrctn>87654321</isrctn>
      <trialDescription><title>Second trial</title></trialDescription>
    </trial>
  </fullTrial>
</allTrials>"#;

    #[test]
    fn test_split_keeps_attributes_and_content() {
        let fragments = split_full_trials(FIXTURE).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].contains("lastUpdated=\"2024-02-10T09:00:00.000Z\""));
        assert!(fragments[0].contains("<isrctn>12345678</isrctn>"));
        assert!(fragments[1].contains("<isrctn>87654321</isrctn>"));
    }

    #[test]
    fn test_split_handles_empty_document() {
        let fragments = split_full_trials("<allTrials></allTrials>").unwrap();
        assert!(fragments.is_empty());
    }
}
