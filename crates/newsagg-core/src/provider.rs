//! Provider registry: the fixed set of upstream article-search APIs.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::Filter;
use crate::{ProviderId, ValidationError};

const DEFAULT_KEYWORD_PARAM: &str = "q";
const DEFAULT_KEYWORD_DELIMITER: &str = " ";
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Request budget for a provider: at most `limit` calls per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: u32,
    pub window: Duration,
}

/// Static description of one upstream API.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub name: ProviderId,
    pub base_uri: String,
    pub api_key_param: String,
    pub api_key: String,
    pub keyword_param: String,
    pub keyword_delimiter: String,
    /// Renames a filter to the provider's parameter name. Unlisted filters
    /// keep their own name.
    pub filter_params: BTreeMap<Filter, String>,
    pub extra_params: BTreeMap<String, String>,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    pub rate_limit: Option<RateLimit>,
    /// JSON pointer selecting the part of the response kept as payload.
    pub response_pointer: Option<String>,
}

impl ProviderConfig {
    pub fn new(
        name: ProviderId,
        base_uri: impl Into<String>,
        api_key_param: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name,
            base_uri: base_uri.into(),
            api_key_param: api_key_param.into(),
            api_key: api_key.into(),
            keyword_param: String::from(DEFAULT_KEYWORD_PARAM),
            keyword_delimiter: String::from(DEFAULT_KEYWORD_DELIMITER),
            filter_params: BTreeMap::new(),
            extra_params: BTreeMap::new(),
            cache_ttl: DEFAULT_CACHE_TTL,
            timeout: DEFAULT_TIMEOUT,
            rate_limit: None,
            response_pointer: None,
        }
    }

    pub fn with_keyword_param(mut self, param: impl Into<String>) -> Self {
        self.keyword_param = param.into();
        self
    }

    pub fn with_keyword_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.keyword_delimiter = delimiter.into();
        self
    }

    pub fn with_filter_param(mut self, filter: Filter, param: impl Into<String>) -> Self {
        self.filter_params.insert(filter, param.into());
        self
    }

    pub fn with_extra_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(name.into(), value.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.rate_limit = Some(RateLimit { limit, window });
        self
    }

    pub fn with_response_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.response_pointer = Some(pointer.into());
        self
    }

    /// Parameter name used for `filter` by this provider.
    pub fn filter_param(&self, filter: Filter) -> &str {
        self.filter_params
            .get(&filter)
            .map(String::as_str)
            .unwrap_or(filter.as_str())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let provider = || self.name.as_str().to_owned();

        let has_scheme =
            self.base_uri.starts_with("https://") || self.base_uri.starts_with("http://");
        let has_host = self
            .base_uri
            .split_once("://")
            .map(|(_, rest)| !rest.is_empty() && !rest.starts_with('/'))
            .unwrap_or(false);
        if !has_scheme || !has_host || self.base_uri.contains('?') {
            return Err(ValidationError::InvalidBaseUri {
                provider: provider(),
                value: self.base_uri.clone(),
            });
        }

        for (field, value) in [
            ("api_key_param", &self.api_key_param),
            ("api_key", &self.api_key),
            ("keyword_param", &self.keyword_param),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyProviderField {
                    provider: provider(),
                    field,
                });
            }
        }

        if self.cache_ttl.is_zero() {
            return Err(ValidationError::ZeroDuration {
                provider: provider(),
                field: "cache_ttl",
            });
        }
        if self.timeout.is_zero() {
            return Err(ValidationError::ZeroDuration {
                provider: provider(),
                field: "timeout",
            });
        }
        if let Some(rate) = self.rate_limit {
            if rate.limit == 0 || rate.window.is_zero() {
                return Err(ValidationError::ZeroDuration {
                    provider: provider(),
                    field: "rate_limit",
                });
            }
        }

        Ok(())
    }
}

impl Debug for ProviderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("base_uri", &self.base_uri)
            .field("api_key_param", &self.api_key_param)
            .field("api_key", &"<redacted>")
            .field("keyword_param", &self.keyword_param)
            .field("keyword_delimiter", &self.keyword_delimiter)
            .field("filter_params", &self.filter_params)
            .field("extra_params", &self.extra_params)
            .field("cache_ttl", &self.cache_ttl)
            .field("timeout", &self.timeout)
            .field("rate_limit", &self.rate_limit)
            .field("response_pointer", &self.response_pointer)
            .finish()
    }
}

/// Immutable, ordered set of providers, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<ProviderConfig>>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<ProviderConfig>) -> Result<Self, ValidationError> {
        if providers.is_empty() {
            return Err(ValidationError::EmptyRegistry);
        }

        let mut seen = HashSet::with_capacity(providers.len());
        for provider in &providers {
            provider.validate()?;
            if !seen.insert(provider.name.clone()) {
                return Err(ValidationError::DuplicateProvider {
                    name: provider.name.as_str().to_owned(),
                });
            }
        }

        Ok(Self {
            providers: providers.into_iter().map(Arc::new).collect(),
        })
    }

    /// Stock providers. `api_key` resolves each provider's key; providers
    /// without a key are skipped.
    pub fn builtin<F>(mut api_key: F) -> Result<Self, ValidationError>
    where
        F: FnMut(&ProviderId) -> Option<String>,
    {
        let providers = builtin_providers()?
            .into_iter()
            .filter_map(|provider| {
                let key = api_key(&provider.name)?;
                Some(ProviderConfig {
                    api_key: key,
                    ..provider
                })
            })
            .collect();
        Self::new(providers)
    }

    pub fn list_providers(&self) -> &[Arc<ProviderConfig>] {
        &self.providers
    }

    pub fn get(&self, name: &ProviderId) -> Option<&Arc<ProviderConfig>> {
        self.providers.iter().find(|provider| &provider.name == name)
    }

    pub fn ids(&self) -> Vec<ProviderId> {
        self.providers
            .iter()
            .map(|provider| provider.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// NewsAPI, The Guardian and New York Times article search, without keys.
pub fn builtin_providers() -> Result<Vec<ProviderConfig>, ValidationError> {
    Ok(vec![
        ProviderConfig::new(
            ProviderId::parse("newsapi")?,
            "https://newsapi.org/v2/everything",
            "apiKey",
            "",
        )
        .with_filter_param(Filter::Date, "from")
        .with_filter_param(Filter::Source, "sources"),
        ProviderConfig::new(
            ProviderId::parse("theguardian")?,
            "https://content.guardianapis.com/search",
            "api-key",
            "",
        )
        .with_filter_param(Filter::Date, "from-date")
        .with_filter_param(Filter::Category, "section"),
        ProviderConfig::new(
            ProviderId::parse("nytimes")?,
            "https://api.nytimes.com/svc/search/v2/articlesearch.json",
            "api-key",
            "",
        )
        .with_filter_param(Filter::Date, "begin_date"),
    ])
}
