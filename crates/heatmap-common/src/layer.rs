//! Layer identity: the source locator a layer was loaded from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identity key of a layer binding. Two requests with the same key share one
/// decoded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerKey(String);

impl LayerKey {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Where the bytes for this layer come from.
    pub fn locator(&self) -> SourceLocator {
        SourceLocator::parse(&self.0)
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerKey {
    fn from(value: &str) -> Self {
        LayerKey::new(value)
    }
}

impl From<String> for LayerKey {
    fn from(value: String) -> Self {
        LayerKey::new(value)
    }
}

/// A raster source: a local file or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceLocator {
    Path(PathBuf),
    Url(String),
}

impl SourceLocator {
    /// `http://` and `https://` locators are remote, everything else is a path.
    /// A `file://` prefix is stripped.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        let lower = trimmed.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceLocator::Url(trimmed.to_string())
        } else if lower.starts_with("file://") {
            SourceLocator::Path(PathBuf::from(&trimmed["file://".len()..]))
        } else {
            SourceLocator::Path(PathBuf::from(trimmed))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceLocator::Url(_))
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Path(p) => write!(f, "{}", p.display()),
            SourceLocator::Url(u) => f.write_str(u),
        }
    }
}
