use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

use crate::config;
use crate::error::ApiError;
use crate::security::{RateLimitDecision, RateLimitPolicy};
use crate::state::AppState;

/// Client identity for rate limiting. The socket peer, unless the peer is a trusted proxy,
/// in which case the nearest X-Forwarded-For hop that is not itself a trusted proxy.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_proxies: &[IpAddr]) -> String {
    let Some(peer_ip) = peer.map(|addr| addr.ip()) else {
        return "unknown".to_string();
    };
    if !trusted_proxies.contains(&peer_ip) {
        return peer_ip.to_string();
    }

    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|hop| hop.parse::<IpAddr>())
        .take_while(Result::is_ok)
        .filter_map(Result::ok)
        .find(|ip| !trusted_proxies.contains(ip))
        .unwrap_or(peer_ip)
        .to_string()
}

fn set_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
}

async fn enforce(state: &AppState, policy: RateLimitPolicy, request: Request, next: Next) -> Result<Response, ApiError> {
    if !policy.enabled {
        return Ok(next.run(request).await);
    }

    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|ci| ci.0);
    let key = client_key(request.headers(), peer, &config::config().security.trusted_proxies);
    let decision = state.rate_limiter.check(&policy, &key);

    if !decision.allowed {
        tracing::warn!("Rate limit '{}' hit by {}", policy.name, key);
        let mut response = axum::response::IntoResponse::into_response(ApiError::too_many_requests(
            "Too many requests, please try again later",
            decision.retry_after_secs(),
        ));
        set_limit_headers(response.headers_mut(), &decision);
        return Ok(response);
    }

    let mut response = next.run(request).await;
    set_limit_headers(response.headers_mut(), &decision);
    Ok(response)
}

pub async fn auth_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    enforce(&state, RateLimitPolicy::auth(&config::config().api), request, next).await
}

pub async fn api_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    enforce(&state, RateLimitPolicy::api(&config::config().api), request, next).await
}

pub async fn webhook_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    enforce(&state, RateLimitPolicy::webhook(&config::config().api), request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn peer_is_used_without_trusted_proxies() {
        let peer: SocketAddr = "198.51.100.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, Some(peer), &[]), "198.51.100.9");
        assert_eq!(client_key(&headers, None, &[]), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_key(&headers, Some(peer), &[]), "198.51.100.9");
    }

    #[test]
    fn rotating_forwarded_for_does_not_reset_auth_budget() {
        let limiter = crate::security::RateLimiter::default();
        let policy = RateLimitPolicy {
            name: "auth",
            limit: 1,
            window: std::time::Duration::from_secs(60),
            enabled: true,
        };
        let peer: SocketAddr = "198.51.100.9:5000".parse().unwrap();

        let allowed = (0..50)
            .filter(|i| {
                let mut headers = HeaderMap::new();
                let spoofed = format!("203.0.113.{}", i);
                headers.insert("x-forwarded-for", HeaderValue::from_str(&spoofed).unwrap());
                limiter.check(&policy, &client_key(&headers, Some(peer), &[])).allowed
            })
            .count();
        assert_eq!(allowed, 1);
    }

    #[test]
    fn trusted_proxy_forwards_nearest_untrusted_hop() {
        let proxies = [ip("10.0.0.1"), ip("10.0.0.2")];
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let mut headers = HeaderMap::new();

        // Leftmost entries are client supplied; only the hop our proxies appended counts
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 203.0.113.7, 10.0.0.2"));
        assert_eq!(client_key(&headers, Some(peer), &proxies), "203.0.113.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage, 10.0.0.2"));
        assert_eq!(client_key(&headers, Some(peer), &proxies), "10.0.0.1");

        headers.remove("x-forwarded-for");
        assert_eq!(client_key(&headers, Some(peer), &proxies), "10.0.0.1");
    }
}
