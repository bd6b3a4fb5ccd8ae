//! EU Clinical Trials Register adapter. The register has no public API;
//! the adapter scrapes the search results page for trial links, then
//! fetches each trial page. Field extraction happens in the normalizer.

use crate::error::Result;
use crate::{default_client, RegistryFetcher, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use trialstore::models::{RawPayload, RawRecord, Source};

const EUCTR_BASE_URL: &str = "https://www.clinicaltrialsregister.eu";

pub struct EuctrFetcher {
    client: reqwest::Client,
    base_url: String,
    keyword: String,
    max_trials: usize,
}

impl EuctrFetcher {
    pub fn new(keyword: &str, max_trials: usize) -> Result<Self> {
        Self::with_timeout(keyword, max_trials, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(keyword: &str, max_trials: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: default_client(timeout)?,
            base_url: EUCTR_BASE_URL.to_string(),
            keyword: keyword.to_string(),
            max_trials,
        })
    }
}

/// Collects deduplicated trial page links from a search results page,
/// preserving first-seen order.
pub fn trial_page_links(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").expect("static selector");

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&anchors) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !href.contains("/trial/") {
            continue;
        }
        let url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{base_url}{href}")
        };
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }
    links
}

#[async_trait]
impl RegistryFetcher for EuctrFetcher {
    fn source(&self) -> Source {
        Source::Euctr
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>> {
        let search_url = format!("{}/ctr-search/search", self.base_url);
        let search_html = self
            .client
            .get(&search_url)
            .query(&[("query", self.keyword.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let links: Vec<String> = trial_page_links(&search_html, &self.base_url)
            .into_iter()
            .take(self.max_trials)
            .collect();

        let mut records = Vec::new();
        for url in links {
            // A single unreachable trial page does not fail the source.
            let page = match self.client.get(&url).send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => response.text().await,
                    Err(err) => Err(err),
                },
                Err(err) => Err(err),
            };
            match page {
                Ok(html) => records.push(RawRecord {
                    source: Source::Euctr,
                    payload: RawPayload::Html(html),
                }),
                Err(err) => log::warn!("euctr: skipping {url}: {err}"),
            }
        }

        log::info!("euctr: fetched {} trial pages", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_links_are_collected_and_deduplicated() {
        let html = r#"
            <html><body>
              <a href="/ctr-search/trial/2008-003457-23/GB">Trial A</a>
              <a href="/ctr-search/trial/2008-003457-23/GB">Trial A again</a>
              <a href="https://www.clinicaltrialsregister.eu/ctr-search/trial/2010-019348-37/IT">Trial B</a>
              <a href="/about.html">About</a>
            </body></html>"#;

        let links = trial_page_links(html, EUCTR_BASE_URL);
        assert_eq!(
            links,
            vec![
                "https://www.clinicaltrialsregister.eu/ctr-search/trial/2008-003457-23/GB",
                "https://www.clinicaltrialsregister.eu/ctr-search/trial/2010-019348-37/IT",
            ]
        );
    }

    #[test]
    fn test_no_links_on_unrelated_page() {
        let links = trial_page_links("<html><a href=\"/index\">home</a></html>", EUCTR_BASE_URL);
        assert!(links.is_empty());
    }
}
