use httpmock::prelude::*;
use mobility_middleware::{
    ApiKind, HttpDirectoryClient, MiddlewareConfig, Mode, Provider, ProviderRegistrator,
    RegistrationOutcome,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::watch;

fn config_file(directory_url: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let content = format!(
        r#"
[directory]
url = "{}"

[registration]
enabled = true
retry_delay_seconds = 0
served_apis = ["OPTIONS_API", "BOOKING_API"]

[provider]
id = "demo"
providerName = "Demo Mobility"
serviceUrl = "http://demo.example.com/api"
apis = ["OPTIONS_API", "PLACES_API"]
modes = ["CAR"]
"#,
        directory_url
    );
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// 目錄服務先失敗，恢復後註冊成功，且只公告實際提供的 API
#[tokio::test]
async fn test_registration_retries_until_directory_accepts() {
    let directory = MockServer::start_async().await;

    let mut failing = directory
        .mock_async(|when, then| {
            when.method(POST).path("/services");
            then.status(503);
        })
        .await;

    let file = config_file(&directory.base_url());
    let config = MiddlewareConfig::from_file(file.path()).unwrap();
    let mut settings = config.registration_settings();
    settings.retry_delay = Duration::from_millis(20);

    let client = Arc::new(HttpDirectoryClient::new(directory.base_url()));
    let registrator = ProviderRegistrator::new(client, config.provider.clone(), settings);

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = registrator.spawn(shutdown_rx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(failing.hits_async().await >= 2);
    failing.delete_async().await;

    let accepted = directory
        .mock_async(|when, then| {
            when.method(POST)
                .path("/services")
                .json_body_partial(r#"{"id": "demo", "apis": ["OPTIONS_API"], "modes": ["CAR"]}"#);
            then.status(201);
        })
        .await;

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(outcome, RegistrationOutcome::Registered { attempts } if attempts >= 3));
    accepted.assert_async().await;
}

#[tokio::test]
async fn test_registered_provider_is_found_by_search() {
    let directory = MockServer::start_async().await;

    let search = directory
        .mock_async(|when, then| {
            when.method(GET)
                .path("/search")
                .query_param("active", "true")
                .query_param("modes", "BIKE,CAR")
                .query_param("apis", "OPTIONS_API");
            then.status(200).json_body(json!([
                { "id": "demo", "serviceUrl": "http://demo.example.com/api", "apis": ["OPTIONS_API"], "modes": ["CAR"] }
            ]));
        })
        .await;

    let client = HttpDirectoryClient::new(directory.base_url());
    let found = client
        .search(
            &BTreeSet::from([Mode::Car, Mode::Bike]),
            &BTreeSet::from([ApiKind::Options]),
            &BTreeSet::new(),
        )
        .await
        .unwrap()
        .unwrap();

    search.assert_async().await;
    assert_eq!(found.len(), 1);
    let provider: Provider = found.into_iter().next().unwrap().sanitize();
    assert_eq!(provider.id, "demo");
    assert!(provider.supports_api(ApiKind::Options));
    assert!(provider.mobility_types.is_empty());
}
