use std::fmt;

use url::Url;

use crate::domain::errors::{DomainError, Result};

/// URL of a segmented-media manifest handed out by the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaybackLocator(Url);

impl PlaybackLocator {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| DomainError::InvalidLocator(format!("{raw}: {e}")))?;
        Self::from_url(url)
    }

    /// Resolve a locator that may be relative to the backend base URL
    pub fn resolve(base: &Url, raw: &str) -> Result<Self> {
        let url = base
            .join(raw)
            .map_err(|e| DomainError::InvalidLocator(format!("{raw}: {e}")))?;
        Self::from_url(url)
    }

    fn from_url(url: Url) -> Result<Self> {
        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            other => Err(DomainError::InvalidLocator(format!(
                "unsupported scheme '{other}' in {url}"
            ))),
        }
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PlaybackLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}
