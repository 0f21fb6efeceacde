//! Single upstream call for one provider and one query.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::domain::{ProviderResult, Query};
use crate::error::{UpstreamCause, UpstreamError};
use crate::http_client::{HttpClient, HttpErrorKind, HttpRequest};
use crate::normalize::to_provider_params;
use crate::provider::{ProviderConfig, ProviderRegistry};
use crate::throttling::ProviderThrottle;
use crate::transform::{Passthrough, PointerTransform, ResponseTransform};
use crate::ProviderId;

/// Guards and response shaping owned by one provider.
#[derive(Debug)]
struct ProviderLane {
    breaker: CircuitBreaker,
    throttle: Option<ProviderThrottle>,
    transform: Arc<dyn ResponseTransform>,
}

impl ProviderLane {
    fn new(provider: &ProviderConfig, breaker: CircuitBreakerConfig) -> Self {
        let transform: Arc<dyn ResponseTransform> = match &provider.response_pointer {
            Some(pointer) => Arc::new(PointerTransform::new(pointer.clone())),
            None => Arc::new(Passthrough),
        };

        Self {
            breaker: CircuitBreaker::new(breaker),
            throttle: provider.rate_limit.and_then(ProviderThrottle::new),
            transform,
        }
    }
}

/// Performs exactly one HTTP GET per call through a shared [`HttpClient`].
///
/// Retry is the caller's concern. Each registered provider gets its own
/// circuit breaker and optional rate limiter.
pub struct FetchDispatcher {
    http: Arc<dyn HttpClient>,
    lanes: HashMap<ProviderId, ProviderLane>,
    breaker_config: CircuitBreakerConfig,
}

impl std::fmt::Debug for FetchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchDispatcher")
            .field("lanes", &self.lanes)
            .field("breaker_config", &self.breaker_config)
            .finish_non_exhaustive()
    }
}

impl FetchDispatcher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        registry: &ProviderRegistry,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let lanes = registry
            .list_providers()
            .iter()
            .map(|provider| {
                (
                    provider.name.clone(),
                    ProviderLane::new(provider, breaker_config),
                )
            })
            .collect();

        Self {
            http,
            lanes,
            breaker_config,
        }
    }

    /// Replaces the response transform used for `provider`.
    pub fn with_transform(
        mut self,
        provider: &ProviderId,
        transform: Arc<dyn ResponseTransform>,
    ) -> Self {
        if let Some(lane) = self.lanes.get_mut(provider) {
            lane.transform = transform;
        }
        self
    }

    /// Builds the GET request for `query` against `provider`.
    pub fn build_request(provider: &ProviderConfig, query: &Query) -> HttpRequest {
        let params = to_provider_params(query, provider);
        HttpRequest::get(provider.base_uri.as_str())
            .with_query(params.into_pairs())
            .with_header("accept", "application/json")
            .with_timeout(provider.timeout)
    }

    pub async fn fetch(
        &self,
        provider: &ProviderConfig,
        query: &Query,
    ) -> Result<ProviderResult, UpstreamError> {
        let fail = |cause| UpstreamError::new(provider.name.clone(), cause);
        let fallback;
        let lane = match self.lanes.get(&provider.name) {
            Some(lane) => lane,
            None => {
                fallback = ProviderLane::new(provider, self.breaker_config);
                &fallback
            }
        };

        if !lane.breaker.allow_request() {
            return Err(fail(UpstreamCause::CircuitOpen));
        }
        if let Some(throttle) = &lane.throttle {
            throttle
                .try_acquire()
                .map_err(|retry_after| fail(UpstreamCause::RateLimited { retry_after }))?;
        }

        let request = Self::build_request(provider, query);
        debug!(provider = %provider.name, url = %provider.base_uri, "dispatching upstream request");

        let response = match tokio::time::timeout(provider.timeout, self.http.execute(request)).await
        {
            Err(_) => Err(UpstreamCause::Timeout),
            Ok(Err(error)) => Err(match error.kind() {
                HttpErrorKind::Timeout => UpstreamCause::Timeout,
                HttpErrorKind::Connect => UpstreamCause::Connect(error.message().to_owned()),
                HttpErrorKind::Other => UpstreamCause::Transport(error.message().to_owned()),
            }),
            Ok(Ok(response)) if !response.is_success() => {
                Err(UpstreamCause::Status(response.status))
            }
            Ok(Ok(response)) => serde_json::from_str::<serde_json::Value>(&response.body)
                .map_err(|error| UpstreamCause::Decode(error.to_string())),
        };

        let body = match response {
            Ok(body) => {
                lane.breaker.record_success();
                body
            }
            Err(cause) => {
                lane.breaker.record_failure();
                return Err(fail(cause));
            }
        };

        let payload = lane
            .transform
            .transform(body)
            .map_err(|reason| fail(UpstreamCause::Transform(reason)))?;

        Ok(ProviderResult::new(provider.name.clone(), payload))
    }
}
