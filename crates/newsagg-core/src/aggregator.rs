//! Fan-out of one query to every registered provider.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheKey, CacheMode, CacheStore, Lookup};
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::dispatcher::FetchDispatcher;
use crate::domain::{AggregateResult, ProviderOutcome, ProviderResult, Query, RawQuery};
use crate::error::{InvalidQueryError, UpstreamError};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::normalize::normalize;
use crate::provider::{ProviderConfig, ProviderRegistry};
use crate::retry::RetryConfig;
use crate::transform::ResponseTransform;
use crate::ProviderId;

/// Builder for [`Aggregator`].
pub struct AggregatorBuilder {
    registry: ProviderRegistry,
    http: Option<Arc<dyn HttpClient>>,
    cache: Option<CacheStore<ProviderResult>>,
    retry: RetryConfig,
    circuit_breaker: CircuitBreakerConfig,
    transforms: Vec<(ProviderId, Arc<dyn ResponseTransform>)>,
}

impl AggregatorBuilder {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            http: None,
            cache: None,
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            transforms: Vec::new(),
        }
    }

    /// Transport shared by all providers. Defaults to [`ReqwestHttpClient`].
    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Cache shared with other aggregators. Defaults to a fresh unbounded store.
    pub fn cache(mut self, cache: CacheStore<ProviderResult>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    pub fn transform(mut self, provider: ProviderId, transform: Arc<dyn ResponseTransform>) -> Self {
        self.transforms.push((provider, transform));
        self
    }

    pub fn build(self) -> Aggregator {
        let http = self
            .http
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let dispatcher = self.transforms.into_iter().fold(
            FetchDispatcher::new(http, &self.registry, self.circuit_breaker),
            |dispatcher, (provider, transform)| dispatcher.with_transform(&provider, transform),
        );

        Aggregator {
            registry: self.registry,
            dispatcher,
            cache: self.cache.unwrap_or_default(),
            retry: self.retry,
        }
    }
}

/// Runs one query against every provider and collects a result per provider.
///
/// A provider failure never aborts the aggregation; it is recorded in that
/// provider's slot. Successful values are cached per provider and query.
#[derive(Debug)]
pub struct Aggregator {
    registry: ProviderRegistry,
    dispatcher: FetchDispatcher,
    cache: CacheStore<ProviderResult>,
    retry: RetryConfig,
}

impl Aggregator {
    pub fn builder(registry: ProviderRegistry) -> AggregatorBuilder {
        AggregatorBuilder::new(registry)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheStore<ProviderResult> {
        &self.cache
    }

    pub async fn fetch_all(&self, query: &Query) -> AggregateResult {
        self.fetch_all_with(query, CacheMode::Use).await
    }

    /// Fetches every provider concurrently. The result holds exactly one entry
    /// per registered provider.
    #[instrument(skip_all, fields(providers = self.registry.len(), mode = ?mode))]
    pub async fn fetch_all_with(&self, query: &Query, mode: CacheMode) -> AggregateResult {
        let started = Instant::now();

        let fetches = self
            .registry
            .list_providers()
            .iter()
            .map(|provider| self.fetch_one(provider, query, mode));
        let entries = join_all(fetches).await.into_iter().collect::<BTreeMap<_, _>>();

        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = AggregateResult::new(entries, latency_ms);
        info!(
            latency_ms,
            failed = result.failures().count(),
            "aggregation finished"
        );
        result
    }

    /// Normalizes `raw` and aggregates. An invalid query fails before any
    /// provider is contacted.
    pub async fn fetch_raw(&self, raw: &RawQuery) -> Result<AggregateResult, InvalidQueryError> {
        self.fetch_raw_with(raw, CacheMode::Use).await
    }

    pub async fn fetch_raw_with(
        &self,
        raw: &RawQuery,
        mode: CacheMode,
    ) -> Result<AggregateResult, InvalidQueryError> {
        let query = normalize(raw)?;
        Ok(self.fetch_all_with(&query, mode).await)
    }

    async fn fetch_one(
        &self,
        provider: &ProviderConfig,
        query: &Query,
        mode: CacheMode,
    ) -> (ProviderId, ProviderOutcome) {
        let key = CacheKey::derive(&provider.name, query);
        let lookup = self
            .cache
            .get_or_compute_with(&key, provider.cache_ttl, mode, || {
                self.fetch_with_retry(provider, query)
            })
            .await;

        let outcome = match lookup {
            Ok(Lookup { value, status }) => ProviderOutcome::Fetched {
                result: value,
                cache: status,
            },
            Err(error) => {
                warn!(provider = %provider.name, kind = error.code(), %error, "provider fetch failed");
                ProviderOutcome::Failed(error)
            }
        };
        (provider.name.clone(), outcome)
    }

    async fn fetch_with_retry(
        &self,
        provider: &ProviderConfig,
        query: &Query,
    ) -> Result<ProviderResult, UpstreamError> {
        let mut attempt = 0;
        loop {
            match self.dispatcher.fetch(provider, query).await {
                Err(error) if self.retry.should_retry(attempt, &error.cause) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(
                        provider = %provider.name,
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        kind = error.code(),
                        "retrying provider fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}
