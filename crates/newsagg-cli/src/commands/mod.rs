mod batch;
mod fetch;
mod providers;

use newsagg_core::{AggregateResult, Aggregator, AppConfig, ProviderRegistry};
use serde_json::{json, Value};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Rendered data plus the counters that decide the exit code.
#[derive(Debug)]
pub struct CommandOutput {
    pub data: Value,
    pub failed_providers: usize,
    pub invalid_queries: usize,
}

impl CommandOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            failed_providers: 0,
            invalid_queries: 0,
        }
    }

    pub fn with_failed_providers(mut self, count: usize) -> Self {
        self.failed_providers = count;
        self
    }

    pub fn with_invalid_queries(mut self, count: usize) -> Self {
        self.invalid_queries = count;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    let env = |name: &str| std::env::var(name).ok();
    let config = AppConfig::resolve(cli.config.as_deref(), env)?;
    let registry = config.registry(env)?;

    match &cli.command {
        Command::Providers => providers::run(&registry),
        Command::Fetch(args) => {
            let aggregator = build_aggregator(&config, registry);
            fetch::run(args, &aggregator, cli.cache_mode.into(), cli.meta).await
        }
        Command::Batch(args) => {
            let aggregator = build_aggregator(&config, registry);
            batch::run(args, &aggregator, cli.cache_mode.into(), cli.meta).await
        }
    }
}

fn build_aggregator(config: &AppConfig, registry: ProviderRegistry) -> Aggregator {
    Aggregator::builder(registry)
        .cache(config.cache_store())
        .retry(config.retry_config())
        .circuit_breaker(config.circuit_breaker_config())
        .build()
}

/// Provider map, optionally wrapped as `{data, meta}`.
fn result_document(result: &AggregateResult, meta: bool) -> Value {
    if meta {
        json!({
            "data": result.to_json(),
            "meta": result.meta_json(),
        })
    } else {
        result.to_json()
    }
}
