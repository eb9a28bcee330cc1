//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use partner_sync::{
    AccessToken, ApiHost, Clock, Credentials, CredentialsHandle, PartnerConfig, PartnerId,
    PartnerSecret, RequestEngine, ShopId, TokenError, TokenRefresher, TokenSource,
};
use wiremock::{Request, Respond, ResponseTemplate};

pub const PARTNER_ID: &str = "2001887";
pub const PARTNER_SECRET: &str = "test-partner-secret";
pub const SHOP_ID: &str = "600001";
pub const FIXED_TIMESTAMP: i64 = 1_700_000_000;

/// Creates a configuration pointing at `host` (a mock server URI).
pub fn create_test_config(host: &str) -> PartnerConfig {
    PartnerConfig::builder()
        .partner_id(PartnerId::new(PARTNER_ID).unwrap())
        .partner_secret(PartnerSecret::new(PARTNER_SECRET).unwrap())
        .host(ApiHost::new(host).unwrap())
        .shop_id(ShopId::new(SHOP_ID).unwrap())
        .request_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Hands out `token-1`, `token-2`, ... and counts fetches.
#[derive(Default)]
pub struct CountingTokenSource {
    pub fetches: AtomicUsize,
    pub delay: Option<Duration>,
    pub fail: bool,
}

impl CountingTokenSource {
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for CountingTokenSource {
    async fn fetch_token(&self, shop_id: ShopId) -> Result<AccessToken, TokenError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(TokenError::NotFound { shop_id });
        }
        Ok(AccessToken::new(format!("token-{n}")))
    }
}

/// Fixed timestamp; records sleeps without spending them.
#[derive(Default)]
pub struct RecordingClock {
    pub sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps.lock().unwrap().len()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    fn unix_timestamp(&self) -> i64 {
        FIXED_TIMESTAMP
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Replies with a scripted status sequence, then repeats the final entry.
pub struct Sequence {
    responses: Vec<ResponseTemplate>,
    calls: AtomicUsize,
}

impl Sequence {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(!responses.is_empty());
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }

    /// `statuses` in order, each with an empty JSON body, then `success`.
    pub fn statuses_then(statuses: &[u16], success: serde_json::Value) -> Self {
        let mut responses: Vec<_> = statuses
            .iter()
            .map(|&status| ResponseTemplate::new(status).set_body_json(serde_json::json!({})))
            .collect();
        responses.push(ResponseTemplate::new(200).set_body_json(success));
        Self::new(responses)
    }
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses[n.min(self.responses.len() - 1)].clone()
    }
}

/// An engine wired to `source` with a recording clock.
pub struct Harness {
    pub engine: Arc<RequestEngine>,
    pub source: Arc<CountingTokenSource>,
    pub clock: Arc<RecordingClock>,
    pub refresher: Arc<TokenRefresher>,
}

pub fn harness(host: &str, source: CountingTokenSource) -> Harness {
    build_harness(host, source, None)
}

/// Like [`harness`], but starts with `token` already published.
pub fn harness_with_token(host: &str, source: CountingTokenSource, token: &str) -> Harness {
    build_harness(host, source, Some(token))
}

fn build_harness(host: &str, source: CountingTokenSource, token: Option<&str>) -> Harness {
    let config = create_test_config(host);
    let source = Arc::new(source);
    let mut initial = Credentials::from_config(&config);
    if let Some(token) = token {
        initial = initial.with_token(AccessToken::new(token));
    }
    let credentials = Arc::new(CredentialsHandle::new(initial));
    let refresher = Arc::new(TokenRefresher::new(
        Arc::clone(&source) as Arc<dyn TokenSource>,
        credentials,
    ));
    let clock = Arc::new(RecordingClock::default());
    let engine = RequestEngine::new(&config, Arc::clone(&refresher))
        .unwrap()
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
    Harness {
        engine: Arc::new(engine),
        source,
        clock,
        refresher,
    }
}

/// A successful envelope around `response`.
pub fn envelope(response: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "error": "",
        "message": "",
        "request_id": "req-1",
        "response": response
    })
}

/// Returns the value of query parameter `name` on `request`.
pub fn query_param(request: &Request, name: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
