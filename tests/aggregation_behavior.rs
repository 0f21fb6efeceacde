//! Behavior-driven tests for query fan-out and per-provider caching.
//!
//! These tests drive the aggregator through a scripted transport, so every
//! upstream call is observable and no network is involved.

use std::sync::Arc;
use std::time::Duration;

use newsagg_core::{
    normalize, Aggregator, CacheMode, CacheStatus, CacheStore, CircuitBreakerConfig, Filter,
    HttpError, HttpResponse, InvalidQueryError, ProviderConfig, ProviderId, ProviderOutcome,
    ProviderRegistry, Query, RawQuery, StubHttpClient, UpstreamCause, UpstreamError,
};
use serde_json::json;

fn id(name: &str) -> ProviderId {
    ProviderId::parse(name).expect("valid provider id")
}

fn provider(name: &str) -> ProviderConfig {
    ProviderConfig::new(
        id(name),
        format!("https://{name}.test/search"),
        "api-key",
        format!("{name}-secret"),
    )
    .with_timeout(Duration::from_millis(150))
}

fn query(keyword: &str) -> Query {
    normalize(&RawQuery::keyword(keyword)).expect("valid query")
}

fn aggregator(stub: &Arc<StubHttpClient>, providers: Vec<ProviderConfig>) -> Aggregator {
    let registry = ProviderRegistry::new(providers).expect("valid registry");
    Aggregator::builder(registry)
        .http_client(stub.clone())
        .circuit_breaker(CircuitBreakerConfig {
            failure_threshold: 100,
            open_timeout: Duration::from_secs(60),
        })
        .build()
}

// =============================================================================
// Aggregation: cardinality and partial failure
// =============================================================================

#[tokio::test]
async fn when_all_providers_answer_every_provider_gets_exactly_one_entry() {
    // Given: Three healthy providers
    let stub = Arc::new(
        StubHttpClient::new()
            .respond("https://a.test", HttpResponse::ok_json(r#"{"n":1}"#))
            .respond("https://b.test", HttpResponse::ok_json(r#"{"n":2}"#))
            .respond("https://c.test", HttpResponse::ok_json(r#"{"n":3}"#)),
    );
    let aggregator = aggregator(&stub, vec![provider("a"), provider("b"), provider("c")]);

    // When: One query is aggregated
    let result = aggregator.fetch_all(&query("election")).await;

    // Then: The result has one value per provider and one upstream call each
    assert_eq!(result.len(), 3);
    assert!(!result.has_failures());
    assert_eq!(result.get(&id("b")).and_then(ProviderOutcome::payload), Some(&json!({"n": 2})));
    assert_eq!(stub.call_count(), 3);
}

#[tokio::test]
async fn when_one_of_three_providers_fails_the_others_still_return_values() {
    // Given: Two healthy providers and one returning a server error
    let stub = Arc::new(
        StubHttpClient::new()
            .respond("https://a.test", HttpResponse::ok_json("{}"))
            .respond("https://b.test", HttpResponse::with_status(500, "oops"))
            .respond("https://c.test", HttpResponse::ok_json("[]")),
    );
    let aggregator = aggregator(&stub, vec![provider("a"), provider("b"), provider("c")]);

    // When: The query is aggregated
    let result = aggregator.fetch_all(&query("markets")).await;

    // Then: Three entries, two values, one error marker
    assert_eq!(result.len(), 3);
    assert_eq!(result.successes().count(), 2);
    let failures = result.failures().collect::<Vec<_>>();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].provider, id("b"));
    assert_eq!(failures[0].cause, UpstreamCause::Status(500));
}

#[tokio::test]
async fn when_provider_b_times_out_only_its_slot_carries_the_timeout() {
    // Given: Provider A answers immediately and provider B never answers in time
    let stub = Arc::new(
        StubHttpClient::new()
            .respond("https://A.test", HttpResponse::ok_json(r#"{"status":"ok"}"#))
            .respond_after(
                "https://B.test",
                Duration::from_secs(10),
                HttpResponse::ok_json("{}"),
            ),
    );
    let aggregator = aggregator(&stub, vec![provider("A"), provider("B")]);

    // When: Query{["election"], {}} is aggregated
    let result = aggregator.fetch_all(&query("election")).await;

    // Then: A holds its payload and B holds a timeout error
    assert_eq!(
        result.get(&id("A")).and_then(ProviderOutcome::payload),
        Some(&json!({"status": "ok"}))
    );
    assert_eq!(
        result.get(&id("B")).and_then(ProviderOutcome::error),
        Some(&UpstreamError::timeout(id("B")))
    );
    assert_eq!(
        result.to_json(),
        json!({
            "A": {"status": "ok"},
            "B": {"error": {"provider": "B", "kind": "upstream.timeout", "message": "timeout"}},
        })
    );
}

#[tokio::test]
async fn when_a_transport_error_occurs_the_slot_reports_a_connect_failure() {
    // Given: A provider whose host refuses connections
    let stub = Arc::new(
        StubHttpClient::new().fail("https://a.test", HttpError::connect("connection refused")),
    );
    let aggregator = aggregator(&stub, vec![provider("a")]);

    // When: The query is aggregated
    let result = aggregator.fetch_all(&query("rust")).await;

    // Then: The error is recorded, not raised
    let error = result
        .get(&id("a"))
        .and_then(ProviderOutcome::error)
        .expect("slot a failed");
    assert_eq!(error.code(), "upstream.connect");
}

// =============================================================================
// Caching: idempotence, expiration and failures
// =============================================================================

#[tokio::test]
async fn when_the_same_query_repeats_within_ttl_no_second_upstream_call_is_made() {
    // Given: A provider with a long TTL
    let stub = Arc::new(
        StubHttpClient::new().respond("https://a.test", HttpResponse::ok_json(r#"{"v":1}"#)),
    );
    let aggregator = aggregator(&stub, vec![provider("a")]);

    // When: The same query runs twice
    let first = aggregator.fetch_all(&query("election")).await;
    let second = aggregator.fetch_all(&query("election")).await;

    // Then: One upstream call, identical payloads, second served from cache
    assert_eq!(stub.call_count(), 1);
    let a = id("a");
    assert_eq!(
        first.get(&a).and_then(ProviderOutcome::payload),
        second.get(&a).and_then(ProviderOutcome::payload)
    );
    assert_eq!(first.get(&a).and_then(ProviderOutcome::cache_status), Some(CacheStatus::Miss));
    assert_eq!(second.get(&a).and_then(ProviderOutcome::cache_status), Some(CacheStatus::Hit));
}

#[tokio::test]
async fn when_filters_differ_each_combination_is_fetched_separately() {
    // Given: One provider
    let stub = Arc::new(StubHttpClient::new().respond("https://a.test", HttpResponse::ok_json("{}")));
    let aggregator = aggregator(&stub, vec![provider("a")]);

    // When: The same keyword is sent with different filters
    let plain = normalize(&RawQuery::keyword("election")).expect("valid");
    let dated = normalize(&RawQuery::keyword("election").with_filter(Filter::Date, "2024-11-05"))
        .expect("valid");
    let sourced = normalize(&RawQuery::keyword("election").with_filter(Filter::Source, "2024-11-05"))
        .expect("valid");
    aggregator.fetch_all(&plain).await;
    aggregator.fetch_all(&dated).await;
    aggregator.fetch_all(&sourced).await;

    // Then: None of them shares a cache entry
    assert_eq!(stub.call_count(), 3);
    assert_eq!(aggregator.cache().len().await, 3);
}

#[tokio::test]
async fn when_the_ttl_elapses_the_provider_is_fetched_again() {
    // Given: A provider with a very short TTL
    let stub = Arc::new(StubHttpClient::new().respond("https://a.test", HttpResponse::ok_json("{}")));
    let short = provider("a").with_cache_ttl(Duration::from_millis(50));
    let aggregator = aggregator(&stub, vec![short]);

    // When: The query repeats after the TTL
    aggregator.fetch_all(&query("election")).await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    let again = aggregator.fetch_all(&query("election")).await;

    // Then: The expired entry was not used
    assert_eq!(stub.call_count(), 2);
    assert_eq!(
        again.get(&id("a")).and_then(ProviderOutcome::cache_status),
        Some(CacheStatus::Miss)
    );
}

#[tokio::test]
async fn when_a_provider_fails_the_failure_is_not_cached() {
    // Given: A provider that always fails
    let stub = Arc::new(
        StubHttpClient::new().respond("https://a.test", HttpResponse::with_status(503, "")),
    );
    let aggregator = aggregator(&stub, vec![provider("a")]);

    // When: The query runs twice
    aggregator.fetch_all(&query("election")).await;
    aggregator.fetch_all(&query("election")).await;

    // Then: Both runs reached upstream and nothing was stored
    assert_eq!(stub.call_count(), 2);
    assert!(aggregator.cache().is_empty().await);
}

#[tokio::test]
async fn when_cache_mode_is_refresh_or_bypass_upstream_is_always_called() {
    // Given: A warm cache
    let stub = Arc::new(StubHttpClient::new().respond("https://a.test", HttpResponse::ok_json("{}")));
    let aggregator = aggregator(&stub, vec![provider("a")]);
    let q = query("election");
    aggregator.fetch_all(&q).await;

    // When: The query runs with refresh and then bypass
    let refreshed = aggregator.fetch_all_with(&q, CacheMode::Refresh).await;
    let bypassed = aggregator.fetch_all_with(&q, CacheMode::Bypass).await;

    // Then: Both reach upstream and report their mode
    assert_eq!(stub.call_count(), 3);
    let a = id("a");
    assert_eq!(
        refreshed.get(&a).and_then(ProviderOutcome::cache_status),
        Some(CacheStatus::Refreshed)
    );
    assert_eq!(
        bypassed.get(&a).and_then(ProviderOutcome::cache_status),
        Some(CacheStatus::Bypassed)
    );
}

#[tokio::test]
async fn when_the_cache_is_full_values_are_served_uncached_as_degraded() {
    // Given: A cache that can hold a single entry, already occupied
    let stub = Arc::new(StubHttpClient::new().respond("https://a.test", HttpResponse::ok_json("{}")));
    let registry = ProviderRegistry::new(vec![provider("a")]).expect("valid registry");
    let aggregator = Aggregator::builder(registry)
        .http_client(stub.clone())
        .cache(CacheStore::bounded(1))
        .build();
    aggregator.fetch_all(&query("first")).await;

    // When: A different query arrives
    let result = aggregator.fetch_all(&query("second")).await;

    // Then: The value is still returned, marked degraded
    let outcome = result.get(&id("a")).expect("slot a");
    assert!(outcome.is_fetched());
    assert_eq!(outcome.cache_status(), Some(CacheStatus::Degraded));
}

#[tokio::test]
async fn when_identical_aggregations_overlap_each_provider_is_fetched_once() {
    // Given: A slow provider
    let stub = Arc::new(StubHttpClient::new().respond_after(
        "https://a.test",
        Duration::from_millis(50),
        HttpResponse::ok_json("{}"),
    ));
    let aggregator = aggregator(&stub, vec![provider("a")]);
    let q = query("election");

    // When: Four identical aggregations run at the same time
    let runs = (0..4).map(|_| aggregator.fetch_all(&q));
    let results = futures::future::join_all(runs).await;

    // Then: One upstream call served all of them
    assert_eq!(stub.call_count(), 1);
    assert!(results.iter().all(|result| !result.has_failures()));
}

// =============================================================================
// Query validation
// =============================================================================

#[tokio::test]
async fn when_the_keyword_is_missing_no_provider_is_contacted() {
    // Given: An aggregator with a provider
    let stub = Arc::new(StubHttpClient::new().respond("https://a.test", HttpResponse::ok_json("{}")));
    let aggregator = aggregator(&stub, vec![provider("a")]);

    // When: A raw query without keyword or with a blank keyword arrives
    let missing = aggregator
        .fetch_raw(&RawQuery::default().with_filter(Filter::Category, "news"))
        .await;
    let blank = aggregator.fetch_raw(&RawQuery::keyword("   ")).await;

    // Then: Both fail before any upstream call
    assert_eq!(missing, Err(InvalidQueryError::MissingKeyword));
    assert_eq!(blank, Err(InvalidQueryError::EmptyKeyword));
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn when_the_upstream_request_is_built_the_api_key_goes_last() {
    // Given: A provider with a filter rename and static extras
    let stub = Arc::new(StubHttpClient::new().respond("https://a.test", HttpResponse::ok_json("{}")));
    let configured = provider("a")
        .with_filter_param(Filter::Category, "section")
        .with_extra_param("page-size", "50");
    let aggregator = aggregator(&stub, vec![configured]);

    // When: A filtered query is aggregated
    aggregator
        .fetch_raw(&RawQuery::keyword("climate").with_filter(Filter::Category, "science"))
        .await
        .expect("valid query");

    // Then: The request carries keyword, extras, renamed filter, then the key
    let calls = stub.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].url_with_query(),
        "https://a.test/search?q=climate&page-size=50&section=science&api-key=a-secret"
    );
}
