//! Safe API call, retry and redirect capture tests.

use cloudnet::base::neterror::NetError;
use cloudnet::http::apicall::{launch_redirecting_api, safe_api_call_with_retries, ApiResult};
use cloudnet::http::{HttpResponse, RetryConfig};
use http::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

fn url() -> Url {
    Url::parse("https://api.example.com/v1/items").unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_retries_with_exponential_backoff() {
    let calls = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let counter = calls.clone();
    let result: ApiResult<serde_json::Value> =
        safe_api_call_with_retries(&RetryConfig::default(), || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(NetError::ConnectionReset) }
        })
        .await;

    let elapsed = start.elapsed();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // 100 + 200 + 400, nothing after the last attempt.
    assert!(elapsed >= Duration::from_millis(700), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(800), "elapsed {:?}", elapsed);

    let err = result.error().unwrap();
    assert_eq!(err.code, -1);
    assert_eq!(err.cause, Some(NetError::ConnectionReset));
}

#[tokio::test(start_paused = true)]
async fn test_first_success_short_circuits() {
    let calls = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let counter = calls.clone();
    let result: ApiResult<serde_json::Value> =
        safe_api_call_with_retries(&RetryConfig::default(), || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Ok(HttpResponse::new(StatusCode::BAD_GATEWAY, url()))
                } else {
                    Ok(HttpResponse::new(StatusCode::OK, url()).with_body(r#"{"ok":true}"#))
                }
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(200));
    assert_eq!(result.data().unwrap()["ok"], true);
}

#[tokio::test(start_paused = true)]
async fn test_no_retry_config_calls_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let result: ApiResult<()> = safe_api_call_with_retries(&RetryConfig::no_retry(), || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, url())) }
    })
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.error().unwrap().code, 500);
}

#[tokio::test]
async fn test_redirect_capture_for_each_status() {
    for status in [301u16, 302, 303, 307, 308] {
        let result: ApiResult<()> = launch_redirecting_api(|| async move {
            Ok(HttpResponse::new(StatusCode::from_u16(status).unwrap(), url())
                .with_header("location", "https://sso.example.com/start"))
        })
        .await;
        assert_eq!(result.redirection(), Some("https://sso.example.com/start"), "{}", status);
        assert_eq!(result.meta().unwrap().status.as_u16(), status);
    }
}

#[tokio::test]
async fn test_redirect_capture_failures() {
    let transport: ApiResult<()> =
        launch_redirecting_api(|| async { Err(NetError::NameNotResolved) }).await;
    let err = transport.error().unwrap();
    assert_eq!(err.code, -1);
    assert!(!err.is_loggable());

    let not_redirect: ApiResult<()> = launch_redirecting_api(|| async {
        Ok(HttpResponse::new(StatusCode::OK, url()).with_header("location", "/ignored"))
    })
    .await;
    assert_eq!(not_redirect.error().unwrap().message.as_deref(), Some("No redirecting URL"));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_call_during_backoff_stops_attempts() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let config = RetryConfig::default();
    let call = safe_api_call_with_retries::<serde_json::Value, _, _>(&config, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Err(NetError::ConnectionReset) }
    });

    // Second attempt runs at 100ms, the next one would start at 300ms.
    let outcome = tokio::time::timeout(Duration::from_millis(150), call).await;
    assert!(outcome.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
