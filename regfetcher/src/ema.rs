//! EMA clinical data publication adapter. The portal has no API; the
//! adapter flattens the home page to text and splits it on the
//! `DD/MM/YYYY Clinical data published` news headings.

use crate::error::Result;
use crate::{default_client, RegistryFetcher, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::USER_AGENT;
use scraper::Html;
use std::time::Duration;
use trialstore::models::{RawPayload, RawRecord, Source};

const EMA_CDP_URL: &str = "https://clinicaldata.ema.europa.eu/web/cdp";

// The portal serves an error page to clients without a browser-like agent.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

static NEWS_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{2}/\d{2}/\d{4}\s+Clinical data published").expect("static regex")
});

pub struct EmaFetcher {
    client: reqwest::Client,
    url: String,
    max_items: usize,
}

impl EmaFetcher {
    pub fn new(max_items: usize) -> Result<Self> {
        Self::with_timeout(max_items, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(max_items: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: default_client(timeout)?,
            url: EMA_CDP_URL.to_string(),
            max_items,
        })
    }
}

/// Flattens an HTML document to visible text, one line per text node.
/// Line structure matters downstream: the normalizer reads the first
/// line after a heading as the item summary.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text: Vec<&str> = document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect();
    text.join("\n")
}

/// Splits flattened page text into news segments, one per
/// `DD/MM/YYYY Clinical data published` heading, heading included.
pub fn split_news_items(text: &str, max_items: usize) -> Vec<String> {
    let headings: Vec<_> = NEWS_HEADING.find_iter(text).collect();
    headings
        .iter()
        .take(max_items)
        .enumerate()
        .map(|(i, heading)| {
            let end = headings
                .get(i + 1)
                .map(|next| next.start())
                .unwrap_or(text.len());
            text[heading.start()..end].trim().to_string()
        })
        .collect()
}

#[async_trait]
impl RegistryFetcher for EmaFetcher {
    fn source(&self) -> Source {
        Source::EmaCdp
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let body = self
            .client
            .get(&self.url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let text = page_text(&body);
        let records: Vec<RawRecord> = split_news_items(&text, self.max_items)
            .into_iter()
            .map(|segment| RawRecord {
                source: Source::EmaCdp,
                payload: RawPayload::Html(segment),
            })
            .collect();

        log::info!("ema: fetched {} news items", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        <html><body>
          <div>News</div>
          <p>14/02/2024   Clinical data published for new medicines. The data
             refer to Examplamab, a treatment for myocardial infarction.</p>
          <p>03/11/2023 Clinical data published. The data refer to Otherdrug, a
             therapy under review.</p>
        </body></html>"#;

    #[test]
    fn test_split_yields_one_segment_per_heading() {
        let items = split_news_items(&page_text(FIXTURE), 10);
        assert_eq!(items.len(), 2);
        assert!(items[0].starts_with("14/02/2024"));
        assert!(items[0].contains("Examplamab"));
        assert!(!items[0].contains("Otherdrug"));
        assert!(items[1].starts_with("03/11/2023"));
    }

    #[test]
    fn test_max_items_caps_segments() {
        let items = split_news_items(&page_text(FIXTURE), 1);
        assert_eq!(items.len(), 1);
        assert!(items[0].starts_with("14/02/2024"));
    }

    #[test]
    fn test_no_headings_yields_nothing() {
        assert!(split_news_items("no news today", 10).is_empty());
    }
}
