use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use moodscape_core::{RateLimitConfig, SecurityEvent, SecurityLogger};
use std::{
    net::SocketAddr,
    num::NonZeroU32,
    time::{Duration, Instant},
};
use tracing::debug;

use crate::{ApiError, ApiResult, AppState};

pub const LOGIN_MAX_FAILURES: u32 = 5;
pub const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const AI_REQUESTS_PER_MINUTE: u32 = 20;
pub const JOURNALS_PER_DAY: u32 = 10;

const GENERAL_MESSAGE: &str = "Too many requests from this IP, please try again later.";
const LOGIN_MESSAGE: &str = "Too many login attempts, please try again after 15 minutes.";
const AI_MESSAGE: &str = "Too many AI requests, please wait a moment.";
const JOURNAL_MESSAGE: &str = "You have reached your daily journal entry limit.";

/// Quota admitting `limit` requests per `window`, refilled evenly (GCRA).
fn window_quota(limit: u32, window: Duration) -> Quota {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
    let period = (window / burst.get()).max(Duration::from_millis(1));
    Quota::with_period(period)
        .map(|quota| quota.allow_burst(burst))
        .unwrap_or_else(|| Quota::per_second(burst))
}

/// A named, per-key GCRA limiter.
pub struct KeyedLimit {
    name: &'static str,
    limit: u32,
    message: &'static str,
    limiter: DefaultKeyedRateLimiter<String>,
}

impl KeyedLimit {
    pub fn new(name: &'static str, limit: u32, window: Duration, message: &'static str) -> Self {
        Self {
            name,
            limit,
            message,
            limiter: RateLimiter::keyed(window_quota(limit, window)),
        }
    }

    /// Spend one cell for `key`.
    pub fn check(&self, key: &str) -> ApiResult<()> {
        match self.limiter.check_key(&key.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                SecurityLogger::log_event(SecurityEvent::RateLimited {
                    limiter: self.name.to_string(),
                    key: key.to_string(),
                });
                Err(self.rejection(wait))
            }
        }
    }

    fn rejection(&self, wait: Duration) -> ApiError {
        ApiError::RateLimited {
            message: self.message.to_string(),
            retry_after_secs: wait.as_secs().max(1),
            limit: self.limit,
        }
    }

    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

/// Login limiter. Only failed attempts are counted; the failure that
/// exhausts the quota locks the IP out for the whole window.
pub struct LoginGuard {
    failures: KeyedLimit,
    lockouts: DashMap<String, Instant>,
}

impl LoginGuard {
    pub fn new() -> Self {
        Self {
            failures: KeyedLimit::new(
                "login",
                LOGIN_MAX_FAILURES - 1,
                LOGIN_WINDOW,
                LOGIN_MESSAGE,
            ),
            lockouts: DashMap::new(),
        }
    }

    pub fn check(&self, ip: &str) -> ApiResult<()> {
        let Some(until) = self.lockouts.get(ip).map(|entry| *entry) else {
            return Ok(());
        };

        let remaining = until.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            self.lockouts.remove(ip);
            return Ok(());
        }

        SecurityLogger::log_event(SecurityEvent::RateLimited {
            limiter: "login".to_string(),
            key: ip.to_string(),
        });
        Err(ApiError::RateLimited {
            message: LOGIN_MESSAGE.to_string(),
            retry_after_secs: remaining.as_secs().max(1),
            limit: LOGIN_MAX_FAILURES,
        })
    }

    pub fn record_failure(&self, ip: &str) {
        if self.failures.check(ip).is_err() {
            self.lockouts
                .insert(ip.to_string(), Instant::now() + LOGIN_WINDOW);
        }
    }

    pub fn prune(&self) {
        let now = Instant::now();
        self.lockouts.retain(|_, until| *until > now);
        self.failures.prune();
    }
}

impl Default for LoginGuard {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RateLimiters {
    pub general: KeyedLimit,
    pub login: LoginGuard,
    pub ai: KeyedLimit,
    pub journal: KeyedLimit,
    pub trusted_proxy_hops: usize,
}

impl RateLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            general: KeyedLimit::new(
                "general",
                config.max_requests,
                Duration::from_millis(config.window_ms),
                GENERAL_MESSAGE,
            ),
            login: LoginGuard::new(),
            ai: KeyedLimit::new(
                "ai",
                AI_REQUESTS_PER_MINUTE,
                Duration::from_secs(60),
                AI_MESSAGE,
            ),
            journal: KeyedLimit::new(
                "journal",
                JOURNALS_PER_DAY,
                Duration::from_secs(24 * 60 * 60),
                JOURNAL_MESSAGE,
            ),
            trusted_proxy_hops: config.trusted_proxy_hops,
        }
    }

    /// Drop state for keys that have fully recovered.
    pub fn prune(&self) {
        self.general.prune();
        self.login.prune();
        self.ai.prune();
        self.journal.prune();
        debug!(
            general = self.general.tracked_keys(),
            ai = self.ai.tracked_keys(),
            journal = self.journal.tracked_keys(),
            "Pruned rate limiter state"
        );
    }
}

/// Client address as seen by the outermost trusted proxy.
///
/// Each of the `trusted_hops` proxies appends the address it received the
/// request from, so the entry `trusted_hops` from the right of
/// `X-Forwarded-For` is the first one a client cannot forge. With fewer
/// entries than hops the leftmost one is used. `X-Real-IP` and then the
/// socket peer are the fallbacks.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: usize) -> String {
    let peer_ip = peer.map(|addr| addr.ip().to_string());
    if trusted_hops == 0 {
        return peer_ip.unwrap_or_else(|| "unknown".to_string());
    }

    let forwarded: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    let from_forwarded = forwarded
        .iter()
        .rev()
        .nth(trusted_hops - 1)
        .or_else(|| forwarded.first())
        .copied();

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    from_forwarded
        .or(real_ip)
        .map(str::to_string)
        .or(peer_ip)
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn request_ip(req: &Request, trusted_hops: usize) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip(req.headers(), peer, trusted_hops)
}

/// Resolved client address, attached by [`general_rate_limit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Per-IP limiter applied to every route.
pub async fn general_rate_limit(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let ip = request_ip(&req, state.limiters.trusted_proxy_hops);
    state.limiters.general.check(&ip)?;
    req.extensions_mut().insert(ClientIp(ip));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn keyed_limit_isolates_keys() {
        let limit = KeyedLimit::new("test", 2, Duration::from_secs(60), "stop");
        assert!(limit.check("a").is_ok());
        assert!(limit.check("a").is_ok());
        let err = limit.check("a").unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { limit: 2, .. }));
        assert!(limit.check("b").is_ok());
    }

    #[test]
    fn login_locks_out_after_repeated_failures() {
        let guard = LoginGuard::new();
        for _ in 0..LOGIN_MAX_FAILURES {
            assert!(guard.check("1.2.3.4").is_ok());
            guard.record_failure("1.2.3.4");
        }
        assert!(guard.check("1.2.3.4").is_err());
        assert!(guard.check("5.6.7.8").is_ok());
    }

    #[test]
    fn client_ip_uses_trusted_hop_from_the_right() {
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer), 1), "10.0.0.1");
        assert_eq!(client_ip(&headers, None, 1), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.9"));
        assert_eq!(client_ip(&headers, Some(peer), 1), "192.168.1.9");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("6.6.6.6, 203.0.113.7, 10.0.0.2"),
        );
        assert_eq!(client_ip(&headers, Some(peer), 1), "10.0.0.2");
        assert_eq!(client_ip(&headers, Some(peer), 2), "203.0.113.7");
        assert_eq!(client_ip(&headers, Some(peer), 5), "6.6.6.6");
        assert_eq!(client_ip(&headers, Some(peer), 0), "10.0.0.1");
    }

    #[test]
    fn forged_leading_entries_do_not_change_the_key() {
        let mut first = HeaderMap::new();
        first.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.1.1.1, 127.0.0.1"),
        );
        let mut second = HeaderMap::new();
        second.insert(
            "x-forwarded-for",
            HeaderValue::from_static("2.2.2.2, 127.0.0.1"),
        );
        assert_eq!(client_ip(&first, None, 1), client_ip(&second, None, 1));
    }
}
