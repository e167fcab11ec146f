//! Axum middleware enforcing one policy per route.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::DateTime;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::config::FailureMode;
use crate::error::FloodgateError;
use crate::ratelimit::{Decision, Policy, RateLimiter};

use super::client_key::client_key;

/// State for one guarded route group: the limiter handle, the policy to
/// apply, and what to do when the store is down.
pub struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
    policy: Policy,
    failure_mode: FailureMode,
}

impl RateLimitGuard {
    pub fn new(
        limiter: Arc<RateLimiter>,
        policy: Policy,
        failure_mode: FailureMode,
    ) -> Arc<Self> {
        Arc::new(Self {
            limiter,
            policy,
            failure_mode,
        })
    }
}

/// Middleware entry point for `axum::middleware::from_fn_with_state`.
///
/// Denied requests become `429` with `X-RateLimit-*` headers drawn from
/// the decision. Store failures follow the guard's [`FailureMode`]:
/// `Open` lets the request through with a warning, `Closed` answers `503`.
pub async fn enforce(
    State(guard): State<Arc<RateLimitGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(request.headers());

    match guard.limiter.check(&key, &guard.policy).await {
        Ok(decision) if decision.allowed => next.run(request).await,
        Ok(decision) => {
            debug!(
                client = %key,
                policy = %guard.policy.name,
                "Request rate limited"
            );
            too_many_requests(&decision)
        }
        Err(FloodgateError::StoreUnavailable(reason)) => match guard.failure_mode {
            FailureMode::Open => {
                warn!(
                    client = %key,
                    policy = %guard.policy.name,
                    reason = %reason,
                    "Store unavailable, failing open"
                );
                next.run(request).await
            }
            FailureMode::Closed => {
                warn!(
                    client = %key,
                    policy = %guard.policy.name,
                    reason = %reason,
                    "Store unavailable, failing closed"
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "Rate limiter unavailable" })),
                )
                    .into_response()
            }
        },
        Err(err) => {
            error!(policy = %guard.policy.name, error = %err, "Rate limit check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

/// `X-RateLimit-*` headers for a decision.
pub fn rate_limit_headers(decision: &Decision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, "x-ratelimit-limit", decision.limit.to_string());
    insert_header(
        &mut headers,
        "x-ratelimit-remaining",
        decision.remaining.to_string(),
    );
    if let Some(reset) = DateTime::from_timestamp_millis(decision.reset_at_ms) {
        insert_header(&mut headers, "x-ratelimit-reset", reset.to_rfc3339());
    }
    headers
}

fn too_many_requests(decision: &Decision) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        rate_limit_headers(decision),
        Json(json!({ "error": "Too many requests. Please try again later." })),
    )
        .into_response()
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}
