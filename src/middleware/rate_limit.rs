use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::{
    dev::ServiceRequest,
    http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER, X_FORWARDED_FOR},
    http::StatusCode,
    HttpMessage, HttpRequest, ResponseError,
};
use async_trait::async_trait;
use tracing::warn;

use crate::auth::rate_limit::{RateLimitDecision, RateLimiter};
use crate::error::AppError;
use crate::middleware::pipeline::{Flow, Interceptor};

pub const RATELIMIT_LIMIT: &str = "ratelimit-limit";
pub const RATELIMIT_REMAINING: &str = "ratelimit-remaining";
pub const RATELIMIT_RESET: &str = "ratelimit-reset";

/// Hits recorded for the current request, per limiter.
#[derive(Default)]
struct RateLimitLedger(HashMap<&'static str, (String, RateLimitDecision)>);

/// Interceptor enforcing one [`RateLimiter`] keyed by client IP.
pub struct RateLimit {
    name: &'static str,
    limiter: Arc<RateLimiter>,
    trust_proxy: bool,
}

impl RateLimit {
    pub fn new(name: &'static str, limiter: Arc<RateLimiter>, trust_proxy: bool) -> Self {
        Self {
            name,
            limiter,
            trust_proxy,
        }
    }
}

#[async_trait(?Send)]
impl Interceptor for RateLimit {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn before(&self, req: &ServiceRequest) -> Flow {
        let key = client_ip(req.request(), self.trust_proxy);
        let decision = self.limiter.check(&key).await;

        if !decision.allowed {
            warn!("Rate limit '{}' exceeded for {}", self.name, key);
            let mut response =
                AppError::RateLimited(self.limiter.config().message.clone()).error_response();
            let headers = response.headers_mut();
            apply_headers(headers, &decision);
            headers.insert(RETRY_AFTER, HeaderValue::from(decision.reset_after_secs));
            return Flow::Respond(response);
        }

        let mut extensions = req.extensions_mut();
        match extensions.get_mut::<RateLimitLedger>() {
            Some(ledger) => {
                ledger.0.insert(self.name, (key, decision));
            }
            None => {
                let mut ledger = RateLimitLedger::default();
                ledger.0.insert(self.name, (key, decision));
                extensions.insert(ledger);
            }
        }

        Flow::Continue
    }

    async fn after(&self, req: &HttpRequest, status: StatusCode, headers: &mut HeaderMap) {
        let entry = req
            .extensions_mut()
            .get_mut::<RateLimitLedger>()
            .and_then(|ledger| ledger.0.remove(self.name));
        let Some((key, mut decision)) = entry else {
            return;
        };

        if self.limiter.config().skip_successful_requests && status.as_u16() < 400 {
            if let Some(recorded_at) = decision.recorded_at {
                if self.limiter.release(&key, recorded_at).await {
                    decision.remaining = (decision.remaining + 1).min(decision.limit);
                }
            }
        }

        // The innermost limiter reports; outer ones leave its numbers alone.
        if !headers.contains_key(RATELIMIT_LIMIT) {
            apply_headers(headers, &decision);
        }
    }
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(
        HeaderName::from_static(RATELIMIT_LIMIT),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static(RATELIMIT_REMAINING),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static(RATELIMIT_RESET),
        HeaderValue::from(decision.reset_after_secs),
    );
}

/// Rate-limit key for a request: the peer IP, or, behind a trusted proxy,
/// the last `X-Forwarded-For` hop. Earlier hops are client-supplied.
pub fn client_ip(req: &HttpRequest, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = req
            .headers()
            .get_all(X_FORWARDED_FOR)
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .last();
        if let Some(addr) = forwarded {
            return strip_port(addr);
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn strip_port(addr: &str) -> String {
    addr.parse::<SocketAddr>()
        .map(|socket| socket.ip().to_string())
        .unwrap_or_else(|_| addr.to_string())
}
