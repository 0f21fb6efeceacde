//! Query normalization and per-provider parameter encoding.

use std::collections::BTreeMap;

use crate::domain::{Filter, Query, RawQuery};
use crate::error::InvalidQueryError;
use crate::provider::ProviderConfig;

/// Turns raw input into a [`Query`].
///
/// The keyword is split on whitespace into terms. Filters are trimmed and
/// blank values are dropped; their content is not otherwise validated.
pub fn normalize(raw: &RawQuery) -> Result<Query, InvalidQueryError> {
    let keyword = raw
        .keyword
        .as_deref()
        .ok_or(InvalidQueryError::MissingKeyword)?;

    let terms = keyword
        .split_whitespace()
        .map(str::to_owned)
        .collect::<Vec<_>>();
    if terms.is_empty() {
        return Err(InvalidQueryError::EmptyKeyword);
    }

    let filters = Filter::ALL
        .into_iter()
        .filter_map(|filter| {
            let value = raw.filter(filter)?.trim();
            (!value.is_empty()).then(|| (filter, value.to_owned()))
        })
        .collect::<BTreeMap<_, _>>();

    Ok(Query::from_parts(terms, filters))
}

/// Ordered query-string parameters for one provider call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderParams {
    pairs: Vec<(String, String)>,
}

impl ProviderParams {
    /// Sets `name`, replacing an existing value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((name, value)),
        }
    }

    /// Sets `name` as the final parameter, dropping any earlier occurrence.
    pub fn set_last(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.pairs.retain(|(existing, _)| *existing != name);
        self.pairs.push((name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }
}

/// Encodes `query` in `provider`'s parameter shape.
///
/// Order: keyword, static extras, filters, then the API key last.
pub fn to_provider_params(query: &Query, provider: &ProviderConfig) -> ProviderParams {
    let mut params = ProviderParams::default();
    params.set(
        provider.keyword_param.as_str(),
        query.joined_keyword(&provider.keyword_delimiter),
    );

    for (name, value) in &provider.extra_params {
        params.set(name.as_str(), value.as_str());
    }

    for (filter, value) in query.filters() {
        params.set(provider.filter_param(*filter), value.as_str());
    }

    params.set_last(provider.api_key_param.as_str(), provider.api_key.as_str());
    params
}
