use std::io;
use std::path::Path;

use futures::stream::{self, StreamExt};
use newsagg_core::{
    AggregateResult, Aggregator, CacheMode, Filter, InvalidQueryError, Preferences, RawQuery,
};
use serde_json::{json, Value};

use crate::cli::BatchArgs;
use crate::error::CliError;

use super::{result_document, CommandOutput};

pub async fn run(
    args: &BatchArgs,
    aggregator: &Aggregator,
    mode: CacheMode,
    meta: bool,
) -> Result<CommandOutput, CliError> {
    let input = read_input(args.input.as_deref())?;
    let preferences = args
        .preferences
        .as_deref()
        .map(Preferences::load)
        .transpose()?;
    let preferences = preferences.as_ref();

    let lines = query_lines(&input);
    let outcomes = fetch_lines(
        &lines,
        preferences,
        aggregator,
        mode,
        usize::from(args.concurrency),
    )
    .await;

    let mut failed = 0;
    let mut invalid = 0;
    let documents = lines
        .iter()
        .zip(outcomes)
        .map(|(line, outcome)| match outcome {
            Ok(result) => {
                failed += result.failures().count();
                json!({ "query": line, "result": result_document(&result, meta) })
            }
            Err(error) => {
                invalid += 1;
                json!({
                    "query": line,
                    "error": { "kind": "invalid_query", "message": error.to_string() },
                })
            }
        })
        .collect::<Vec<_>>();

    Ok(CommandOutput::ok(Value::Array(documents))
        .with_failed_providers(failed)
        .with_invalid_queries(invalid))
}

/// Runs every line with at most `concurrency` in flight. Outcomes keep
/// input order.
async fn fetch_lines(
    lines: &[&str],
    preferences: Option<&Preferences>,
    aggregator: &Aggregator,
    mode: CacheMode,
    concurrency: usize,
) -> Vec<Result<AggregateResult, InvalidQueryError>> {
    let runs = lines.iter().map(|line| async move {
        let mut raw = parse_line(line);
        if let Some(preferences) = preferences {
            raw = preferences.apply(raw);
        }
        aggregator.fetch_raw_with(&raw, mode).await
    });

    stream::iter(runs)
        .buffered(concurrency.max(1))
        .collect()
        .await
}

fn read_input(path: Option<&Path>) -> Result<String, CliError> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(io::read_to_string(io::stdin())?),
    }
}

fn query_lines(input: &str) -> Vec<&str> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// `terms... [date=..] [category=..] [source=..]`; other `a=b` tokens are terms.
fn parse_line(line: &str) -> RawQuery {
    let mut terms = Vec::new();
    let mut raw = RawQuery::default();

    for token in line.split_whitespace() {
        let filter = token
            .split_once('=')
            .and_then(|(name, value)| name.parse::<Filter>().ok().map(|filter| (filter, value)));
        match filter {
            Some((filter, value)) => raw = raw.with_filter(filter, value),
            None => terms.push(token),
        }
    }

    if !terms.is_empty() {
        raw.keyword = Some(terms.join(" "));
    }
    raw
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use newsagg_core::{HttpResponse, ProviderConfig, ProviderId, ProviderRegistry, StubHttpClient};

    use super::*;

    fn slow_aggregator(delay: Duration) -> (Arc<StubHttpClient>, Aggregator) {
        let stub = Arc::new(StubHttpClient::new().respond_after(
            "https://slow.test",
            delay,
            HttpResponse::ok_json("{}"),
        ));
        let provider = ProviderConfig::new(
            ProviderId::parse("slow").expect("valid provider"),
            "https://slow.test/search",
            "api-key",
            "secret",
        );
        let registry = ProviderRegistry::new(vec![provider]).expect("valid registry");
        let aggregator = Aggregator::builder(registry)
            .http_client(stub.clone())
            .build();
        (stub, aggregator)
    }

    #[tokio::test]
    async fn concurrency_limit_serializes_lines_and_keeps_order() {
        let (stub, aggregator) = slow_aggregator(Duration::from_millis(60));
        let lines = ["alpha", "", "gamma", "delta"];

        let started = Instant::now();
        let outcomes = fetch_lines(&lines, None, &aggregator, CacheMode::Use, 1).await;

        assert!(started.elapsed() >= Duration::from_millis(180));
        assert_eq!(stub.call_count(), 3);
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[1], Err(InvalidQueryError::MissingKeyword));
        assert!(outcomes[2].is_ok() && outcomes[3].is_ok());
    }

    #[tokio::test]
    async fn lines_within_the_limit_run_together() {
        let (_stub, aggregator) = slow_aggregator(Duration::from_millis(200));
        let lines = ["alpha", "beta", "gamma"];

        let started = Instant::now();
        let outcomes = fetch_lines(&lines, None, &aggregator, CacheMode::Use, 8).await;

        assert!(started.elapsed() < Duration::from_millis(550));
        assert!(outcomes.iter().all(Result::is_ok));
    }

    #[test]
    fn line_tokens_split_into_terms_and_filters() {
        let raw = parse_line("us election date=2024-11-05 category=politics a=b");

        assert_eq!(raw.keyword.as_deref(), Some("us election a=b"));
        assert_eq!(raw.date.as_deref(), Some("2024-11-05"));
        assert_eq!(raw.category.as_deref(), Some("politics"));
        assert_eq!(raw.source, None);
    }

    #[test]
    fn filter_only_line_has_no_keyword() {
        assert_eq!(parse_line("source=bbc").keyword, None);
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let input = "# nightly\nrust\n\n  climate  \n";
        assert_eq!(query_lines(input), vec!["rust", "climate"]);
    }

    #[test]
    fn reads_queries_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "rust").expect("write");

        let input = read_input(Some(file.path())).expect("read");
        assert_eq!(input, "rust\n");
    }
}
