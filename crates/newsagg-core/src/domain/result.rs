use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::UpstreamError;
use crate::{ProviderId, UtcDateTime};

/// Decoded response of one provider for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResult {
    pub provider: ProviderId,
    pub payload: Value,
    pub fetched_at: UtcDateTime,
}

impl ProviderResult {
    pub fn new(provider: ProviderId, payload: Value) -> Self {
        Self {
            provider,
            payload,
            fetched_at: UtcDateTime::now(),
        }
    }
}

/// How the cache layer produced a provider value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Served from a live entry; no upstream call.
    Hit,
    /// Fetched upstream and stored.
    Miss,
    /// Read skipped by request; fetched upstream and stored.
    Refreshed,
    /// Cache neither read nor written by request.
    Bypassed,
    /// Fetched upstream but the store rejected the write.
    Degraded,
}

impl CacheStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Refreshed => "refreshed",
            Self::Bypassed => "bypassed",
            Self::Degraded => "degraded",
        }
    }
}

/// Result slot for a single provider in an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Fetched {
        result: ProviderResult,
        cache: CacheStatus,
    },
    Failed(UpstreamError),
}

impl ProviderOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Fetched { result, .. } => Some(&result.payload),
            Self::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&UpstreamError> {
        match self {
            Self::Fetched { .. } => None,
            Self::Failed(error) => Some(error),
        }
    }

    pub fn cache_status(&self) -> Option<CacheStatus> {
        match self {
            Self::Fetched { cache, .. } => Some(*cache),
            Self::Failed(_) => None,
        }
    }

    /// Slot value in aggregate output: the raw payload, or an error marker.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Fetched { result, .. } => result.payload.clone(),
            Self::Failed(error) => json!({ "error": error.descriptor() }),
        }
    }
}

/// Per-request mapping from provider to its outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    entries: BTreeMap<ProviderId, ProviderOutcome>,
    latency_ms: u64,
}

impl AggregateResult {
    pub fn new(entries: BTreeMap<ProviderId, ProviderOutcome>, latency_ms: u64) -> Self {
        Self {
            entries,
            latency_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, provider: &ProviderId) -> Option<&ProviderOutcome> {
        self.entries.get(provider)
    }

    pub fn entries(&self) -> &BTreeMap<ProviderId, ProviderOutcome> {
        &self.entries
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn successes(&self) -> impl Iterator<Item = (&ProviderId, &ProviderResult)> {
        self.entries.iter().filter_map(|(id, outcome)| match outcome {
            ProviderOutcome::Fetched { result, .. } => Some((id, result)),
            ProviderOutcome::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &UpstreamError> {
        self.entries.values().filter_map(ProviderOutcome::error)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// `{provider: payload | {"error": {...}}}`
    pub fn to_json(&self) -> Value {
        let map = self
            .entries
            .iter()
            .map(|(id, outcome)| (id.as_str().to_owned(), outcome.to_json()))
            .collect::<Map<_, _>>();
        Value::Object(map)
    }

    /// Per-provider cache/fetch metadata alongside the total latency.
    pub fn meta_json(&self) -> Value {
        let providers = self
            .entries
            .iter()
            .map(|(id, outcome)| {
                let meta = match outcome {
                    ProviderOutcome::Fetched { result, cache } => json!({
                        "status": "ok",
                        "cache": cache.as_str(),
                        "fetched_at": result.fetched_at,
                    }),
                    ProviderOutcome::Failed(error) => json!({
                        "status": "error",
                        "kind": error.code(),
                    }),
                };
                (id.as_str().to_owned(), meta)
            })
            .collect::<Map<_, _>>();

        json!({
            "latency_ms": self.latency_ms,
            "providers": providers,
        })
    }
}
