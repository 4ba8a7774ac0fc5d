use chrono::{DateTime, Local};
use image::DynamicImage;

/// Text encoded into a marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerPayload(String);

impl MarkerPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Payload for page `page` (1-based) of a `count`-page document.
    pub fn for_page(&self, page: usize, count: usize) -> Self {
        Self(format!("{}\nPage: {page} of {count}", self.0))
    }
}

impl From<String> for MarkerPayload {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for MarkerPayload {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl std::fmt::Display for MarkerPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a registered document, as printed into its markers.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub name: String,
    pub version: String,
    pub author: String,
    pub id: String,
    pub timestamp: DateTime<Local>,
}

impl DocumentInfo {
    pub fn payload(&self) -> MarkerPayload {
        MarkerPayload(format!(
            "Document: {}\nVersion: {}\nAuthor: {}\nDate: {}\nID: {}",
            self.name,
            self.version,
            self.author,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.id
        ))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("payload enrichment failed: {0}")]
pub struct EnrichError(pub String);

/// Adds page-derived content (e.g. recognized title-block text) to a payload.
pub trait PayloadEnricher {
    fn enrich(&self, page: &DynamicImage, payload: &MarkerPayload)
    -> Result<MarkerPayload, EnrichError>;
}
