//! Registry source adapters. Each adapter fetches raw records from one
//! public clinical-trial registry and hands them to the pipeline as
//! [`RawRecord`]s; all field mapping happens downstream in the normalizer.

pub mod ctgov;
pub mod ema;
pub mod error;
pub mod euctr;
pub mod isrctn;

use async_trait::async_trait;
use std::time::Duration;
use trialstore::models::{RawRecord, Source};

pub use crate::ctgov::CtgovFetcher;
pub use crate::ema::EmaFetcher;
pub use crate::error::{FetchError, Result};
pub use crate::euctr::EuctrFetcher;
pub use crate::isrctn::IsrctnFetcher;

/// Default timeout applied to every registry request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The single capability every source adapter exposes to the pipeline.
#[async_trait]
pub trait RegistryFetcher: Send + Sync {
    fn source(&self) -> Source;

    /// Fetches the current set of raw records from the registry. A failure
    /// here is per-source; sibling sources keep running.
    async fn fetch(&self) -> Result<Vec<RawRecord>>;
}

pub(crate) fn default_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}
