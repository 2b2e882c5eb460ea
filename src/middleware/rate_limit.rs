//! Fixed-window throttling for public reads and password sign-in.
//!
//! A request is charged to its client address and, when the access gate
//! resolved a session, to the signed-in user as well. It is admitted only if
//! every one of those callers still has room in its current window.

use crate::config::RateLimitConfig;
use crate::middleware::RequestId;
use crate::middleware::access_gate::resolved_user_id;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Bucket {
    /// Public pages and the live-status endpoints.
    Read,
    SignIn,
}

impl Bucket {
    fn limit(self, config: &RateLimitConfig) -> u32 {
        match self {
            Bucket::Read => config.read_limit,
            Bucket::SignIn => config.auth_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Caller {
    Address(IpAddr),
    User(String),
    /// Requests without a peer address and without a session share one slot.
    Unidentified,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    hits: u32,
}

impl Window {
    fn current(&mut self, now: Instant, span: Duration) -> &mut Self {
        if now.duration_since(self.opened) >= span {
            self.opened = now;
            self.hits = 0;
        }
        self
    }

    fn closes_in(&self, now: Instant, span: Duration) -> Duration {
        span.saturating_sub(now.duration_since(self.opened))
    }
}

#[derive(Debug)]
pub(crate) struct RateLimiter {
    config: RateLimitConfig,
    span: Duration,
    windows: Mutex<HashMap<(Caller, Bucket), Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            span: Duration::from_secs(config.window_seconds.max(1)),
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn spawn_cleanup_task(self: Arc<Self>) {
        let every = Duration::from_secs(self.config.cleanup_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let dropped = self.evict_expired(Instant::now()).await;
                if dropped > 0 {
                    debug!(dropped, "evicted idle rate limit windows");
                }
            }
        });
    }

    async fn evict_expired(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, window| now.duration_since(window.opened) < self.span);
        before - windows.len()
    }

    /// Charges one hit to every caller, or to none of them when any caller is
    /// out of room. A refusal carries the wait until the last blocking window closes.
    async fn admit(&self, callers: &[Caller], bucket: Bucket, now: Instant) -> Result<(), Duration> {
        let limit = bucket.limit(&self.config);
        let span = self.span;
        let mut windows = self.windows.lock().await;

        let blocked_for = callers
            .iter()
            .filter_map(|caller| {
                let window = windows
                    .entry((caller.clone(), bucket))
                    .or_insert(Window { opened: now, hits: 0 })
                    .current(now, span);
                (window.hits >= limit).then(|| window.closes_in(now, span))
            })
            .max();

        if let Some(wait) = blocked_for {
            return Err(wait);
        }

        for caller in callers {
            if let Some(window) = windows.get_mut(&(caller.clone(), bucket)) {
                window.hits += 1;
            }
        }
        Ok(())
    }
}

/// Guard for public read endpoints.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RateLimit;

/// Guard for the sign-in endpoint.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AuthRateLimit;

/// Seconds until the caller may retry; read by the 429 catcher.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RateLimitRetryAfter(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Throttled {
    Exceeded,
    NoClientAddress,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RateLimit {
    type Error = Throttled;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        throttle(request, Bucket::Read).await.map(|()| RateLimit)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthRateLimit {
    type Error = Throttled;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        throttle(request, Bucket::SignIn).await.map(|()| AuthRateLimit)
    }
}

impl<'a> OpenApiFromRequest<'a> for RateLimit {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();
        responses.responses.insert(
            "429".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Too Many Requests".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}

fn callers_of(request: &Request<'_>) -> Vec<Caller> {
    request
        .client_ip()
        .map(Caller::Address)
        .into_iter()
        .chain(resolved_user_id(request).map(Caller::User))
        .collect()
}

async fn throttle(request: &Request<'_>, bucket: Bucket) -> Outcome<(), Throttled> {
    let Some(limiter) = request.rocket().state::<Arc<RateLimiter>>() else {
        return Outcome::Success(());
    };
    let request_id = RequestId::of(request);

    let mut callers = callers_of(request);
    if callers.is_empty() {
        if limiter.config.require_client_ip {
            warn!(request_id = %request_id, uri = %request.uri(), "rejecting request without a client address");
            return Outcome::Error((Status::BadRequest, Throttled::NoClientAddress));
        }
        debug!(request_id = %request_id, "client address unavailable; using the shared slot");
        callers.push(Caller::Unidentified);
    }

    match limiter.admit(&callers, bucket, Instant::now()).await {
        Ok(()) => Outcome::Success(()),
        Err(wait) => {
            let retry_after = wait.as_secs().max(1);
            request.local_cache(|| Some(RateLimitRetryAfter(retry_after)));
            warn!(
                request_id = %request_id,
                method = %request.method(),
                uri = %request.uri(),
                bucket = ?bucket,
                retry_after,
                "rate limit exceeded"
            );
            Outcome::Error((Status::TooManyRequests, Throttled::Exceeded))
        }
    }
}
