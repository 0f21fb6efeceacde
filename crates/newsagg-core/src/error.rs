use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::ProviderId;

/// Validation and contract errors exposed by `newsagg-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("provider name cannot be empty")]
    EmptyProviderName,
    #[error("provider name {value:?} must not contain control characters")]
    InvalidProviderName { value: String },
    #[error("provider '{provider}' base_uri must be an absolute http(s) url: '{value}'")]
    InvalidBaseUri { provider: String, value: String },
    #[error("provider '{provider}' field '{field}' cannot be empty")]
    EmptyProviderField {
        provider: String,
        field: &'static str,
    },
    #[error("provider '{provider}' field '{field}' must be greater than zero")]
    ZeroDuration {
        provider: String,
        field: &'static str,
    },
    #[error("provider '{name}' is registered more than once")]
    DuplicateProvider { name: String },
    #[error("provider registry must contain at least one provider")]
    EmptyRegistry,

    #[error("unknown filter '{value}', expected one of date, category, source")]
    InvalidFilter { value: String },
}

/// Rejected user query. Raised before any upstream call is attempted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidQueryError {
    #[error("query keyword is missing")]
    MissingKeyword,
    #[error("query keyword must contain at least one non-blank term")]
    EmptyKeyword,
}

/// Failure modes of the shared cache store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheStoreError {
    #[error("cache store is full ({max_entries} live entries)")]
    CapacityExhausted { max_entries: usize },
}

/// Why a single provider fetch failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpstreamCause {
    #[error("timeout")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("response is not valid json: {0}")]
    Decode(String),
    #[error("response transform failed: {0}")]
    Transform(String),
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error("rate limit exhausted; retry in {:.2}s", .retry_after.as_secs_f64())]
    RateLimited { retry_after: Duration },
}

impl UpstreamCause {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Timeout => "upstream.timeout",
            Self::Connect(_) => "upstream.connect",
            Self::Transport(_) => "upstream.transport",
            Self::Status(_) => "upstream.status",
            Self::Decode(_) => "upstream.decode",
            Self::Transform(_) => "upstream.transform",
            Self::CircuitOpen => "upstream.circuit_open",
            Self::RateLimited { .. } => "upstream.rate_limited",
        }
    }

    /// Transient failures that a later attempt may not hit.
    pub const fn retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Transport(_) => true,
            Self::Status(status) => *status == 408 || *status == 429 || *status >= 500,
            Self::Decode(_) | Self::Transform(_) | Self::CircuitOpen | Self::RateLimited { .. } => {
                false
            }
        }
    }
}

/// One provider's fetch failed. Recorded in that provider's result slot and
/// never propagated past the aggregator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("provider '{provider}' failed: {cause}")]
pub struct UpstreamError {
    pub provider: ProviderId,
    #[source]
    pub cause: UpstreamCause,
}

impl UpstreamError {
    pub fn new(provider: ProviderId, cause: UpstreamCause) -> Self {
        Self { provider, cause }
    }

    pub fn timeout(provider: ProviderId) -> Self {
        Self::new(provider, UpstreamCause::Timeout)
    }

    pub const fn code(&self) -> &'static str {
        self.cause.code()
    }

    pub const fn retryable(&self) -> bool {
        self.cause.retryable()
    }

    /// Error descriptor used in aggregate output.
    pub fn descriptor(&self) -> ErrorDescriptor {
        ErrorDescriptor {
            provider: self.provider.clone(),
            kind: self.code(),
            message: self.cause.to_string(),
        }
    }
}

/// Serializable `{provider, kind, message}` marker for a failed provider slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDescriptor {
    pub provider: ProviderId,
    pub kind: &'static str,
    pub message: String,
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config path {} does not exist", .path.display())]
    NotFound { path: PathBuf },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("provider '{provider}' has no api key; set {env} or api_key")]
    MissingApiKey { provider: String, env: String },

    #[error("no provider api key found in the environment; set one of {}", .env.join(", "))]
    NoProviderKeys { env: Vec<String> },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
