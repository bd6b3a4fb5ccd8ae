use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected content type from {url}: {content_type}")]
    ContentType { url: String, content_type: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;
