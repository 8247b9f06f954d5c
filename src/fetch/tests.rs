//! Tests for the fetch module

use super::*;
use crate::error::Error;
use crate::http::{HttpClient, HttpClientConfig, RetryPolicy};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(server: &MockServer) -> ApiFetcher {
    let config = HttpClientConfig::builder()
        .retry(RetryPolicy::fixed(10, Duration::from_millis(5)))
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config).unwrap();
    ApiFetcher::new(client, &format!("{}/api/proMatches", server.uri())).unwrap()
}

#[test]
fn test_invalid_endpoint() {
    let client = HttpClient::with_config(HttpClientConfig::builder().no_rate_limit().build()).unwrap();
    let err = ApiFetcher::new(client, "not a url").unwrap_err();
    assert!(matches!(err, Error::InvalidUrl(_)));
}

#[test]
fn test_debug_hides_api_key() {
    let client = HttpClient::with_config(HttpClientConfig::builder().no_rate_limit().build()).unwrap();
    let fetcher = ApiFetcher::new(client, DEFAULT_ENDPOINT)
        .unwrap()
        .with_api_key(Some("super-secret".to_string()));

    let debug = format!("{fetcher:?}");
    assert!(!debug.contains("super-secret"));
    assert!(debug.contains("has_api_key: true"));
}

#[tokio::test]
async fn test_fetch_latest_page_without_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/proMatches"))
        .and(query_param_is_missing("less_than_match_id"))
        .and(query_param("api_key", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"match_id": 20, "start_time": 200},
            {"match_id": 19, "start_time": 190}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let page = fetcher(&server)
        .with_api_key(Some("k".to_string()))
        .fetch(None, 3)
        .await
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["match_id"], 20);
}

#[tokio::test]
async fn test_fetch_appends_cursor_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/proMatches"))
        .and(query_param("less_than_match_id", "19"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"match_id": 18, "start_time": 180}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let page = fetcher(&server).fetch(Some(19), 3).await.unwrap();
    assert_eq!(page[0]["match_id"], 18);
}

#[tokio::test]
async fn test_custom_cursor_param() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("before", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let page = fetcher(&server)
        .with_cursor_param("before")
        .fetch(Some(5), 1)
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_fetch_exhaustion_carries_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = fetcher(&server).fetch(Some(42), 4).await.unwrap_err();

    assert!(matches!(
        err,
        Error::RetryExhausted {
            cursor: Some(42),
            attempts: 4
        }
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_fetch_succeeds_after_transient_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"match_id": 1, "start_time": 10}
        ])))
        .mount(&server)
        .await;

    let page = fetcher(&server).fetch(None, 3).await.unwrap();

    assert_eq!(page.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_fetch_rejects_object_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "bad key"})))
        .mount(&server)
        .await;

    let err = fetcher(&server).fetch(None, 3).await.unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
}
