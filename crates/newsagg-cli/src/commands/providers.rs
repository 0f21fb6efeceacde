use std::collections::BTreeMap;

use newsagg_core::{Filter, ProviderConfig, ProviderId, ProviderRegistry};
use serde::Serialize;

use crate::error::CliError;

use super::CommandOutput;

#[derive(Debug, Serialize)]
struct ProviderSummary<'a> {
    name: &'a ProviderId,
    base_uri: &'a str,
    api_key_param: &'a str,
    keyword_param: &'a str,
    filter_params: BTreeMap<&'static str, &'a str>,
    cache_ttl_secs: u64,
    timeout_ms: u64,
    rate_limited: bool,
}

impl<'a> From<&'a ProviderConfig> for ProviderSummary<'a> {
    fn from(provider: &'a ProviderConfig) -> Self {
        Self {
            name: &provider.name,
            base_uri: &provider.base_uri,
            api_key_param: &provider.api_key_param,
            keyword_param: &provider.keyword_param,
            filter_params: Filter::ALL
                .into_iter()
                .map(|filter| (filter.as_str(), provider.filter_param(filter)))
                .collect(),
            cache_ttl_secs: provider.cache_ttl.as_secs(),
            timeout_ms: u64::try_from(provider.timeout.as_millis()).unwrap_or(u64::MAX),
            rate_limited: provider.rate_limit.is_some(),
        }
    }
}

pub fn run(registry: &ProviderRegistry) -> Result<CommandOutput, CliError> {
    let summaries = registry
        .list_providers()
        .iter()
        .map(|provider| ProviderSummary::from(provider.as_ref()))
        .collect::<Vec<_>>();

    Ok(CommandOutput::ok(serde_json::to_value(summaries)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_never_contains_api_keys() {
        let registry = ProviderRegistry::builtin(|_| Some(String::from("super-secret")))
            .expect("builtin registry");

        let output = run(&registry).expect("listing");
        let rendered = output.data.to_string();

        assert!(!rendered.contains("super-secret"));
        assert_eq!(output.data.as_array().map(Vec::len), Some(3));
        assert_eq!(output.data[1]["filter_params"]["category"], "section");
    }
}
