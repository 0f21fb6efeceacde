//! TOML configuration for the provider registry and the shared pipeline.
//!
//! Lookup order for the file: explicit path, `$NEWSAGG_CONFIG`,
//! `config/newsagg.toml`, then built-in defaults. API keys are never read
//! from the file's defaults; they come from the environment.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheStore;
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::domain::{Filter, ProviderResult};
use crate::error::ConfigError;
use crate::provider::{builtin_providers, ProviderConfig, ProviderRegistry};
use crate::retry::{Backoff, RetryConfig};
use crate::ProviderId;

pub const CONFIG_ENV: &str = "NEWSAGG_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/newsagg.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub cache: CacheSection,
    pub retry: RetrySection,
    pub circuit_breaker: CircuitBreakerSection,
    pub providers: Vec<ProviderSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    /// Unbounded when absent.
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 200,
            max_delay_ms: 3_000,
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CircuitBreakerSection {
    pub failure_threshold: u32,
    pub open_timeout_secs: u64,
}

impl Default for CircuitBreakerSection {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            open_timeout_secs: defaults.open_timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    pub limit: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSection {
    pub name: ProviderId,
    pub base_uri: String,
    pub api_key_param: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub keyword_param: Option<String>,
    #[serde(default)]
    pub keyword_delimiter: Option<String>,
    #[serde(default)]
    pub filter_params: BTreeMap<String, String>,
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitSection>,
    #[serde(default)]
    pub response_pointer: Option<String>,
}

impl ProviderSection {
    fn into_config<F>(self, env: &F) -> Result<ProviderConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = match (&self.api_key, &self.api_key_env) {
            (Some(key), _) => key.clone(),
            (None, Some(var)) => env(var.as_str()).ok_or_else(|| ConfigError::MissingApiKey {
                provider: self.name.to_string(),
                env: var.clone(),
            })?,
            (None, None) => lookup_api_key(&self.name, env).ok_or_else(|| {
                ConfigError::MissingApiKey {
                    provider: self.name.to_string(),
                    env: api_key_env_names(&self.name).join(" or "),
                }
            })?,
        };

        let mut config = ProviderConfig::new(self.name, self.base_uri, self.api_key_param, api_key);
        if let Some(param) = self.keyword_param {
            config = config.with_keyword_param(param);
        }
        if let Some(delimiter) = self.keyword_delimiter {
            config = config.with_keyword_delimiter(delimiter);
        }
        for (filter, param) in self.filter_params {
            config = config.with_filter_param(filter.parse::<Filter>()?, param);
        }
        for (name, value) in self.extra_params {
            config = config.with_extra_param(name, value);
        }
        if let Some(secs) = self.cache_ttl_secs {
            config = config.with_cache_ttl(Duration::from_secs(secs));
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        if let Some(rate) = self.rate_limit {
            config = config.with_rate_limit(rate.limit, Duration::from_secs(rate.window_secs));
        }
        if let Some(pointer) = self.response_pointer {
            config = config.with_response_pointer(pointer);
        }

        Ok(config)
    }
}

impl AppConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_toml_str(&contents)
    }

    /// Finds and loads the active configuration.
    ///
    /// An explicit or `$NEWSAGG_CONFIG` path must exist; the default path is
    /// optional.
    pub fn resolve<F>(explicit: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = env(CONFIG_ENV).filter(|value| !value.trim().is_empty()) {
            return Self::load(&PathBuf::from(path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.is_file() {
            return Self::load(default_path);
        }
        Ok(Self::default())
    }

    /// Builds the provider registry, resolving API keys through `env`.
    ///
    /// With no `[[providers]]` the stock providers are used and those without
    /// a key in the environment are left out.
    pub fn registry<F>(&self, env: F) -> Result<ProviderRegistry, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.providers.is_empty() {
            let candidates = builtin_providers()?;
            let any_key = candidates
                .iter()
                .any(|provider| lookup_api_key(&provider.name, &env).is_some());
            if !any_key {
                return Err(ConfigError::NoProviderKeys {
                    env: candidates
                        .iter()
                        .flat_map(|provider| api_key_env_names(&provider.name))
                        .collect(),
                });
            }
            return Ok(ProviderRegistry::builtin(|id| lookup_api_key(id, &env))?);
        }

        let providers = self
            .providers
            .iter()
            .cloned()
            .map(|section| section.into_config(&env))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProviderRegistry::new(providers)?)
    }

    pub fn cache_store(&self) -> CacheStore<ProviderResult> {
        match self.cache.max_entries {
            Some(max_entries) => CacheStore::bounded(max_entries),
            None => CacheStore::unbounded(),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        let retry = &self.retry;
        RetryConfig {
            max_retries: retry.max_retries,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(retry.base_delay_ms),
                factor: 2.0,
                max: Duration::from_millis(retry.max_delay_ms),
                jitter: retry.jitter,
            },
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker.failure_threshold.max(1),
            open_timeout: Duration::from_secs(self.circuit_breaker.open_timeout_secs),
        }
    }
}

/// Environment variables checked for a provider's key, in order.
pub fn api_key_env_names(provider: &ProviderId) -> [String; 2] {
    let upper = provider.as_str().to_ascii_uppercase().replace('-', "_");
    [format!("NEWSAGG_{upper}_API_KEY"), format!("{upper}_API_KEY")]
}

fn lookup_api_key<F>(provider: &ProviderId, env: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    api_key_env_names(provider)
        .iter()
        .filter_map(|name| env(name.as_str()))
        .find(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn env_names_prefer_namespaced_variable() {
        let id = ProviderId::parse("the-guardian").expect("valid");
        assert_eq!(
            api_key_env_names(&id),
            [
                String::from("NEWSAGG_THE_GUARDIAN_API_KEY"),
                String::from("THE_GUARDIAN_API_KEY")
            ]
        );
    }

    #[test]
    fn namespaced_key_wins_over_plain_key() {
        let id = ProviderId::parse("newsapi").expect("valid");
        let env = env_from(&[("NEWSAGG_NEWSAPI_API_KEY", "a"), ("NEWSAPI_API_KEY", "b")]);
        assert_eq!(lookup_api_key(&id, &env), Some(String::from("a")));
    }

    #[test]
    fn defaults_match_an_empty_file() {
        let parsed = AppConfig::from_toml_str("").expect("empty config");
        assert_eq!(parsed, AppConfig::default());
        assert_eq!(parsed.retry_config().max_retries, 0);
        assert_eq!(parsed.circuit_breaker_config(), CircuitBreakerConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = AppConfig::from_toml_str("[cache]\nmax_entrys = 3\n").expect_err("typo");
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn builtin_registry_requires_at_least_one_key() {
        let error = AppConfig::default()
            .registry(env_from(&[]))
            .expect_err("no keys");
        assert!(matches!(error, ConfigError::NoProviderKeys { .. }));

        let registry = AppConfig::default()
            .registry(env_from(&[("NYTIMES_API_KEY", "k")]))
            .expect("one key is enough");
        assert_eq!(registry.ids(), vec![ProviderId::parse("nytimes").expect("valid")]);
    }
}
