//! # Newsagg Core
//!
//! Multi-provider news search: one query fanned out to several article APIs,
//! each provider's response cached independently.
//!
//! ## Overview
//!
//! - **Provider registry** describing each upstream API's parameter shape
//! - **Query normalization** into a canonical, provider-agnostic form
//! - **TTL cache** with per-key request coalescing
//! - **Fetch dispatcher** doing one bounded HTTP GET per provider call
//! - **Aggregator** collecting exactly one outcome per provider
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`aggregator`] | Concurrent fan-out and result collection |
//! | [`cache`] | Cache keys and the shared TTL store |
//! | [`circuit_breaker`] | Per-provider circuit breaker |
//! | [`config`] | TOML configuration and API key lookup |
//! | [`dispatcher`] | Single upstream call per provider |
//! | [`domain`] | Queries, results and timestamps |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`normalize`] | Query normalization and parameter encoding |
//! | [`preferences`] | Reader preferences applied as default filters |
//! | [`provider`] | Provider configs and the registry |
//! | [`retry`] | Optional retry with backoff |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Per-provider rate limiting |
//! | [`transform`] | Response shaping strategies |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use newsagg_core::{Aggregator, AppConfig, RawQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::resolve(None, |name| std::env::var(name).ok())?;
//!     let registry = config.registry(|name| std::env::var(name).ok())?;
//!     let aggregator = Aggregator::builder(registry)
//!         .cache(config.cache_store())
//!         .build();
//!
//!     let result = aggregator.fetch_raw(&RawQuery::keyword("election")).await?;
//!     println!("{}", result.to_json());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │ RawQuery
//!          ▼
//! ┌─────────────────┐
//! │   Normalizer    │
//! └────────┬────────┘
//!          │ Query
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Aggregator    │────▶│   Cache Store    │
//! └────────┬────────┘     └──────────────────┘
//!          │ one per provider, on miss
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Fetch Dispatcher│────▶│ Circuit Breaker  │
//! │                 │────▶│ Rate Limiter     │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  HTTP Client    │
//! │ (reqwest/stub)  │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! An invalid query fails the whole request before any upstream call. A
//! failing provider never does; its slot carries the error instead:
//!
//! ```rust
//! use newsagg_core::{AggregateResult, ProviderOutcome};
//!
//! fn report(result: &AggregateResult) {
//!     for (provider, outcome) in result.entries() {
//!         match outcome {
//!             ProviderOutcome::Fetched { cache, .. } => {
//!                 println!("{provider}: ok ({})", cache.as_str());
//!             }
//!             ProviderOutcome::Failed(error) => {
//!                 println!("{provider}: {}", error.code());
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - API keys come from the environment or config and are never logged
//! - `ProviderConfig`'s `Debug` output redacts the key
//! - All HTTP requests use TLS via rustls

pub mod aggregator;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod normalize;
pub mod preferences;
pub mod provider;
pub mod retry;
pub mod source;
pub mod throttling;
pub mod transform;

// Aggregation
pub use aggregator::{Aggregator, AggregatorBuilder};

// Caching
pub use cache::{CacheKey, CacheMode, CacheStats, CacheStore, Lookup};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::AppConfig;

// Dispatch
pub use dispatcher::FetchDispatcher;

// Domain models
pub use domain::{
    AggregateResult, CacheStatus, Filter, ProviderOutcome, ProviderResult, Query, RawQuery,
    UtcDateTime,
};

// Error types
pub use error::{
    CacheStoreError, ConfigError, ErrorDescriptor, InvalidQueryError, UpstreamCause,
    UpstreamError, ValidationError,
};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
    StubHttpClient,
};

// Normalization
pub use normalize::{normalize, to_provider_params, ProviderParams};

// Preferences
pub use preferences::Preferences;

// Providers
pub use provider::{builtin_providers, ProviderConfig, ProviderRegistry, RateLimit};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::ProviderThrottle;

// Response transforms
pub use transform::{Passthrough, PointerTransform, ResponseTransform};
