use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Optional filters a query may carry. Values are free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Category,
    Date,
    Source,
}

impl Filter {
    pub const ALL: [Self; 3] = [Self::Category, Self::Date, Self::Source];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Date => "date",
            Self::Source => "source",
        }
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "category" => Ok(Self::Category),
            "date" => Ok(Self::Date),
            "source" => Ok(Self::Source),
            other => Err(ValidationError::InvalidFilter {
                value: other.to_owned(),
            }),
        }
    }
}

/// Untrusted search input as it arrives from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuery {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl RawQuery {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter, value: impl Into<String>) -> Self {
        *self.filter_slot(filter) = Some(value.into());
        self
    }

    pub fn filter(&self, filter: Filter) -> Option<&str> {
        match filter {
            Filter::Category => self.category.as_deref(),
            Filter::Date => self.date.as_deref(),
            Filter::Source => self.source.as_deref(),
        }
    }

    pub(crate) fn filter_slot(&mut self, filter: Filter) -> &mut Option<String> {
        match filter {
            Filter::Category => &mut self.category,
            Filter::Date => &mut self.date,
            Filter::Source => &mut self.source,
        }
    }
}

/// Normalized, provider-agnostic search request.
///
/// Built through [`crate::normalize`]; the keyword always holds at least one
/// term and filters are kept sorted so that equal queries compare and hash
/// equal no matter how they were assembled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Query {
    keyword: Vec<String>,
    filters: BTreeMap<Filter, String>,
}

impl Query {
    pub(crate) fn from_parts(keyword: Vec<String>, filters: BTreeMap<Filter, String>) -> Self {
        debug_assert!(!keyword.is_empty());
        Self { keyword, filters }
    }

    pub fn keyword(&self) -> &[String] {
        &self.keyword
    }

    pub fn joined_keyword(&self, delimiter: &str) -> String {
        self.keyword.join(delimiter)
    }

    pub fn filters(&self) -> &BTreeMap<Filter, String> {
        &self.filters
    }

    pub fn filter(&self, filter: Filter) -> Option<&str> {
        self.filters.get(&filter).map(String::as_str)
    }
}
