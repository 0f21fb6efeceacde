use newsagg_core::{
    builtin_providers, normalize, to_provider_params, CacheKey, Filter, FetchDispatcher,
    ProviderConfig, ProviderId, ProviderRegistry, RawQuery,
};

fn keyed_registry() -> ProviderRegistry {
    ProviderRegistry::builtin(|id| Some(format!("{}-key", id.as_str())))
        .expect("builtin providers are valid")
}

fn full_query() -> RawQuery {
    RawQuery::keyword("us election")
        .with_filter(Filter::Date, "2024-11-05")
        .with_filter(Filter::Category, "politics")
        .with_filter(Filter::Source, "reuters")
}

fn provider<'a>(registry: &'a ProviderRegistry, name: &str) -> &'a ProviderConfig {
    registry
        .get(&ProviderId::parse(name).expect("valid provider id"))
        .unwrap_or_else(|| panic!("provider '{name}' registered"))
}

#[test]
fn builtin_set_is_newsapi_guardian_and_nytimes_in_order() {
    let ids = builtin_providers()
        .expect("builtin providers")
        .into_iter()
        .map(|provider| provider.name.as_str().to_owned())
        .collect::<Vec<_>>();

    assert_eq!(ids, vec!["newsapi", "theguardian", "nytimes"]);
}

#[test]
fn every_builtin_provider_puts_keyword_first_and_key_last() {
    let registry = keyed_registry();
    let query = normalize(&full_query()).expect("valid query");

    for provider in registry.list_providers() {
        let params = to_provider_params(&query, provider);
        let names = params.names().collect::<Vec<_>>();

        assert_eq!(names.first(), Some(&"q"), "provider '{}'", provider.name);
        assert_eq!(
            names.last(),
            Some(&provider.api_key_param.as_str()),
            "provider '{}'",
            provider.name
        );
        assert_eq!(params.get("q"), Some("us election"));
        assert_eq!(
            params.get(&provider.api_key_param),
            Some(format!("{}-key", provider.name).as_str())
        );
    }
}

#[test]
fn key_param_names_follow_each_provider() {
    let registry = keyed_registry();

    assert_eq!(provider(&registry, "newsapi").api_key_param, "apiKey");
    assert_eq!(provider(&registry, "theguardian").api_key_param, "api-key");
    assert_eq!(provider(&registry, "nytimes").api_key_param, "api-key");
}

#[test]
fn filters_are_renamed_per_provider() {
    let registry = keyed_registry();
    let query = normalize(&full_query()).expect("valid query");

    let newsapi = to_provider_params(&query, provider(&registry, "newsapi"));
    assert_eq!(newsapi.get("from"), Some("2024-11-05"));
    assert_eq!(newsapi.get("sources"), Some("reuters"));
    assert_eq!(newsapi.get("category"), Some("politics"));

    let guardian = to_provider_params(&query, provider(&registry, "theguardian"));
    assert_eq!(guardian.get("from-date"), Some("2024-11-05"));
    assert_eq!(guardian.get("section"), Some("politics"));

    let nytimes = to_provider_params(&query, provider(&registry, "nytimes"));
    assert_eq!(nytimes.get("begin_date"), Some("2024-11-05"));
}

#[test]
fn request_url_is_https_and_cache_key_never_contains_the_api_key() {
    let registry = keyed_registry();
    let query = normalize(&full_query()).expect("valid query");

    for provider in registry.list_providers() {
        let request = FetchDispatcher::build_request(provider, &query);
        assert!(request.url_with_query().starts_with("https://"));
        assert_eq!(request.timeout, provider.timeout);

        let key = CacheKey::derive(&provider.name, &query);
        assert!(
            !key.as_str().contains(&provider.api_key),
            "provider '{}' key leaks api key",
            provider.name
        );
    }
}
