//! Stored reading preferences applied as default filters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Filter, RawQuery};
use crate::error::ConfigError;

/// Preferred sources and categories of one reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub sources: Vec<String>,
    pub categories: Vec<String>,
}

impl Preferences {
    /// Fills the `source` and `category` filters the request left unset.
    /// Explicit request filters always win.
    pub fn apply(&self, mut raw: RawQuery) -> RawQuery {
        for (filter, values) in [
            (Filter::Source, &self.sources),
            (Filter::Category, &self.categories),
        ] {
            let slot = raw.filter_slot(filter);
            let unset = slot.as_deref().map_or(true, |value| value.trim().is_empty());
            if unset {
                if let Some(joined) = join_values(values) {
                    *slot = Some(joined);
                }
            }
        }
        raw
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.categories.is_empty()
    }

    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Reads a `.json` or `.toml` file; the extension picks the format.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }
}

fn join_values(values: &[String]) -> Option<String> {
    let kept = values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>();
    (!kept.is_empty()).then(|| kept.join(","))
}
