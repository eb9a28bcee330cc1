//! The resilient signed-request engine.
//!
//! [`RequestEngine::send`] issues one authenticated partner API call and
//! drives it through an explicit state machine:
//!
//! ```text
//!              +------------------------------+
//!              |   refresh token / wait       |
//!              v                              |
//!   start -> Attempting --2xx envelope--> Success
//!              |   \--401/403/429 (within budget)--^
//!              \--anything else, budget spent--> Fatal
//! ```
//!
//! Every attempt signs afresh with a new timestamp and the credential
//! snapshot current at that moment. The retry counters live in a
//! [`RetryState`] owned by the call; see [`crate::clients::retry`] for the
//! exact rules. Business errors inside a 2xx envelope are returned as-is.

use std::sync::Arc;

use serde_json::Value;

use crate::auth::{Credentials, CredentialsHandle, TokenRefresher};
use crate::clients::clock::{Clock, SystemClock};
use crate::clients::envelope::{CallOutcome, Envelope, TransportError, TransportErrorKind};
use crate::clients::request::{HttpMethod, PartnerRequest, SignedRequestSpec};
use crate::clients::retry::{RetryDecision, RetryState};
use crate::config::PartnerConfig;

/// SDK version from Cargo.toml.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The engine's explicit states.
#[derive(Debug)]
enum EngineState {
    Attempting,
    Success(Envelope),
    Fatal(TransportError),
}

/// A response as received, before classification.
#[derive(Debug)]
struct RawResponse {
    status: u16,
    retry_after: Option<f64>,
    body: Value,
}

/// Issues signed partner API calls with auth-refresh and rate-limit retry.
///
/// # Thread Safety
///
/// `RequestEngine` is `Send + Sync`; share it behind an `Arc` across tasks.
/// Calls do not share retry state with each other.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use partner_sync::clients::{AuthFlags, HttpMethod, PartnerRequest, RequestEngine};
///
/// let engine = RequestEngine::new(&config, refresher)?;
/// let request = PartnerRequest::builder(HttpMethod::Get, "/api/v2/shop/get_shop_info")
///     .auth(AuthFlags::shop())
///     .build()?;
///
/// match engine.send(&request).await {
///     CallOutcome::Success(envelope) => println!("{}", envelope.response),
///     CallOutcome::Transport(error) => eprintln!("{error}"),
/// }
/// ```
pub struct RequestEngine {
    client: reqwest::Client,
    credentials: Arc<CredentialsHandle>,
    refresher: Arc<TokenRefresher>,
    clock: Arc<dyn Clock>,
    user_agent: String,
}

// Verify RequestEngine is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RequestEngine>();
};

impl std::fmt::Debug for RequestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEngine")
            .field("credentials", &self.credentials)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl RequestEngine {
    /// Creates an engine that signs with the credentials `refresher` publishes into.
    ///
    /// # Errors
    ///
    /// Returns the underlying `reqwest` error if the HTTP client cannot be
    /// created (e.g., TLS initialization failure).
    pub fn new(
        config: &PartnerConfig,
        refresher: Arc<TokenRefresher>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.request_timeout())
            .build()?;

        let user_agent_prefix = config
            .user_agent_prefix()
            .map_or(String::new(), |prefix| format!("{prefix} | "));
        let user_agent = format!("{user_agent_prefix}Partner Catalog Sync v{SDK_VERSION}");

        Ok(Self {
            client,
            credentials: Arc::clone(refresher.credentials()),
            refresher,
            clock: Arc::new(SystemClock),
            user_agent,
        })
    }

    /// Replaces the time source (used by tests to record backoff waits).
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the credential handle the engine reads from.
    #[must_use]
    pub const fn credentials(&self) -> &Arc<CredentialsHandle> {
        &self.credentials
    }

    /// Returns the `User-Agent` sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Sends one partner API call, retrying per the auth and rate-limit rules.
    ///
    /// Always resolves to exactly one of an [`Envelope`] or a
    /// [`TransportError`]; a business error inside the envelope is returned
    /// unmodified for the caller to validate.
    pub async fn send(&self, request: &PartnerRequest) -> CallOutcome {
        let mut retry = RetryState::new();
        let mut state = EngineState::Attempting;

        loop {
            state = match state {
                EngineState::Attempting => self.attempt(request, &mut retry).await,
                EngineState::Success(envelope) => return CallOutcome::Success(envelope),
                EngineState::Fatal(error) => {
                    tracing::warn!(
                        path = request.path(),
                        kind = %error.kind,
                        status = ?error.status,
                        message = %error.message,
                        "partner API call failed"
                    );
                    return CallOutcome::Transport(error);
                }
            };
        }
    }

    async fn attempt(&self, request: &PartnerRequest, retry: &mut RetryState) -> EngineState {
        let mut credentials = self.credentials.snapshot();
        if request.auth().access_token && credentials.access_token.is_none() {
            if let Err(error) = self.refresher.refresh_once().await {
                return EngineState::Fatal(TransportError::new(
                    TransportErrorKind::TokenRefreshFailed,
                    None,
                    error.to_string(),
                    Value::Null,
                ));
            }
            credentials = self.credentials.snapshot();
        }

        let spec = SignedRequestSpec::new(request, self.clock.unix_timestamp());
        tracing::debug!(
            method = %spec.method,
            path = spec.path,
            timestamp = spec.timestamp,
            "sending partner API request"
        );

        let response = match self.dispatch(request, &spec, &credentials).await {
            Ok(response) => response,
            Err(error) => {
                return EngineState::Fatal(TransportError::new(
                    TransportErrorKind::NetworkError,
                    error.status().map(|s| s.as_u16()),
                    format!("Network error: {error}"),
                    Value::Null,
                ));
            }
        };

        match response.status {
            200..=299 => {
                retry.on_other_status();
                Self::parse_envelope(response)
            }
            401 | 403 => {
                let decision = retry.on_auth_failure();
                tracing::warn!(
                    status = response.status,
                    consecutive = retry.consecutive_auth_failures(),
                    "partner API rejected credentials"
                );
                self.follow(decision, response).await
            }
            429 => {
                let decision = retry.on_rate_limited(response.retry_after);
                tracing::warn!(
                    retries = retry.rate_limit_retries(),
                    waited_secs = retry.rate_limit_waited().as_secs(),
                    retry_after = ?response.retry_after,
                    "partner API rate limited"
                );
                self.follow(decision, response).await
            }
            status => {
                retry.on_other_status();
                EngineState::Fatal(TransportError::new(
                    TransportErrorKind::HttpError,
                    Some(status),
                    Self::error_message(&response.body, status),
                    response.body,
                ))
            }
        }
    }

    async fn follow(&self, decision: RetryDecision, response: RawResponse) -> EngineState {
        match decision {
            RetryDecision::RefreshToken => match self.refresher.refresh_once().await {
                Ok(_) => EngineState::Attempting,
                Err(error) => EngineState::Fatal(TransportError::new(
                    TransportErrorKind::TokenRefreshFailed,
                    Some(response.status),
                    error.to_string(),
                    response.body,
                )),
            },
            RetryDecision::Wait(wait) => {
                self.clock.sleep(wait).await;
                EngineState::Attempting
            }
            RetryDecision::Fatal(kind) => {
                let message = match kind {
                    TransportErrorKind::AuthError => {
                        "authentication still failing after token refreshes".to_string()
                    }
                    TransportErrorKind::TooManyRequests => {
                        "rate limit wait budget exhausted".to_string()
                    }
                    _ => Self::error_message(&response.body, response.status),
                };
                EngineState::Fatal(TransportError::new(
                    kind,
                    Some(response.status),
                    message,
                    response.body,
                ))
            }
        }
    }

    async fn dispatch(
        &self,
        request: &PartnerRequest,
        spec: &SignedRequestSpec<'_>,
        credentials: &Credentials,
    ) -> Result<RawResponse, reqwest::Error> {
        let url = credentials.host.join(spec.path);

        let mut builder = match spec.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        }
        .header("User-Agent", &self.user_agent)
        .header("Accept", "application/json")
        .query(&spec.auth_query(credentials));

        builder = match spec.method {
            HttpMethod::Get => builder.query(&request.query_params()),
            HttpMethod::Post => builder.json(spec.params),
        };

        let res = builder.send().await?;
        let status = res.status().as_u16();
        let retry_after = res
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<f64>().ok());
        let text = res.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }

    fn parse_envelope(response: RawResponse) -> EngineState {
        if !response.body.is_object() {
            return EngineState::Fatal(TransportError::new(
                TransportErrorKind::InvalidResponse,
                Some(response.status),
                "response body is not a JSON envelope",
                response.body,
            ));
        }
        match serde_json::from_value::<Envelope>(response.body.clone()) {
            Ok(envelope) => EngineState::Success(envelope),
            Err(error) => EngineState::Fatal(TransportError::new(
                TransportErrorKind::InvalidResponse,
                Some(response.status),
                format!("malformed envelope: {error}"),
                response.body,
            )),
        }
    }

    fn error_message(body: &Value, status: u16) -> String {
        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        match (field("error"), field("message")) {
            (Some(error), Some(message)) => format!("{error}: {message}"),
            (Some(text), None) | (None, Some(text)) => text,
            (None, None) => body
                .as_str()
                .map_or_else(|| format!("HTTP {status}"), str::to_string),
        }
    }
}
