//! The signed-request layer for partner API communication.
//!
//! # Overview
//!
//! - [`RequestEngine`]: signs, sends and retries one call at a time
//! - [`PartnerRequest`]: a validated call (method, bare path, auth flags, parameters)
//! - [`SignedRequestSpec`]: a request pinned to one attempt's timestamp
//! - [`Envelope`] / [`TransportError`] / [`CallOutcome`]: the two result shapes
//! - [`RetryState`]: call-local retry counters
//! - [`Clock`]: injectable time source
//!
//! # Retry Behavior
//!
//! - **401/403**: refresh the bearer token (single-flighted) and retry; the
//!   fourth consecutive auth failure is fatal (`AUTH_ERROR`)
//! - **429**: wait `max(Retry-After, n)` seconds for the n-th rate-limit retry;
//!   once total waiting would pass 600 seconds the call fails
//!   (`TOO_MANY_REQUESTS`)
//! - **Other non-2xx / network errors**: fail immediately
//! - **2xx with a business error**: returned unchanged, never retried
//!
//! # Wire Format
//!
//! Every request carries `partner_id`, `timestamp` and `sign`, plus
//! `access_token` and `shop_id` when requested, in the query string. GET
//! parameters follow in the query string (arrays comma-joined); POST
//! parameters travel as a JSON body.

mod clock;
mod engine;
mod envelope;
mod request;
pub mod retry;

pub use clock::{Clock, SystemClock};
pub use engine::{RequestEngine, SDK_VERSION};
pub use envelope::{BusinessError, CallOutcome, Envelope, TransportError, TransportErrorKind};
pub use request::{
    encode_query_value, AuthFlags, HttpMethod, InvalidRequestError, PartnerRequest,
    PartnerRequestBuilder, SignedRequestSpec,
};
pub use retry::{RetryDecision, RetryState};
