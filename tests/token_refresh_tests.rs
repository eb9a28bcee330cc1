//! Integration tests for single-flight token refresh.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{create_test_config, envelope, harness, CountingTokenSource};
use futures::future::join_all;
use partner_sync::clients::{AuthFlags, HttpMethod, PartnerRequest};
use partner_sync::{Credentials, CredentialsHandle, TokenError, TokenRefresher, TokenSource};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn refresher_over(source: &Arc<CountingTokenSource>) -> TokenRefresher {
    let config = create_test_config("https://partner.example.com");
    TokenRefresher::new(
        Arc::clone(source) as Arc<dyn TokenSource>,
        Arc::new(CredentialsHandle::new(Credentials::from_config(&config))),
    )
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_demands_share_one_fetch() {
    let source = Arc::new(CountingTokenSource {
        delay: Some(Duration::from_millis(200)),
        ..CountingTokenSource::default()
    });
    let refresher = refresher_over(&source);

    let results = join_all((0..25).map(|_| refresher.refresh_once())).await;

    assert_eq!(source.fetch_count(), 1);
    for result in results {
        let token = assert_ok!(result);
        assert_eq!(token.as_ref(), "token-1");
    }
    assert!(!refresher.is_refreshing());
    let snapshot = refresher.credentials().snapshot();
    assert_eq!(
        snapshot.access_token.as_ref().map(AsRef::as_ref),
        Some("token-1")
    );
}

#[tokio::test(start_paused = true)]
async fn test_failure_reaches_every_waiter() {
    let source = Arc::new(CountingTokenSource {
        delay: Some(Duration::from_millis(50)),
        fail: true,
        ..CountingTokenSource::default()
    });
    let refresher = refresher_over(&source);

    let results = join_all((0..8).map(|_| refresher.refresh_once())).await;

    assert_eq!(source.fetch_count(), 1);
    for result in results {
        let error = assert_err!(result);
        assert!(matches!(error, TokenError::NotFound { .. }));
    }
    // The failed refresh is not cached.
    assert!(!refresher.is_refreshing());
    assert!(refresher.credentials().snapshot().access_token.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_after_completion_fetches_again() {
    let source = Arc::new(CountingTokenSource::default());
    let refresher = refresher_over(&source);

    assert_ok!(refresher.refresh_once().await);
    let second = assert_ok!(refresher.refresh_once().await);

    assert_eq!(second.as_ref(), "token-2");
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_concurrent_engine_calls_coalesce_on_missing_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/shop/get_shop_info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({}))))
        .expect(6)
        .mount(&server)
        .await;
    let source = CountingTokenSource {
        delay: Some(Duration::from_millis(100)),
        ..CountingTokenSource::default()
    };
    let h = harness(&server.uri(), source);

    let request = PartnerRequest::builder(HttpMethod::Get, "/api/v2/shop/get_shop_info")
        .auth(AuthFlags::shop())
        .build()
        .unwrap();
    let outcomes = join_all((0..6).map(|_| h.engine.send(&request))).await;

    assert!(outcomes.iter().all(|o| o.envelope().is_some()));
    assert_eq!(h.source.fetch_count(), 1);
    assert!(!h.refresher.is_refreshing());
}
