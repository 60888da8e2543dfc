//! Client IP extraction
//!
//! Resolves the caller's address from `X-Forwarded-For` (honouring the number
//! of trusted proxies), then `X-Real-IP`, then the peer socket address.

use crate::state::AppState;
use axum::extract::{ConnectInfo, FromRequestParts, Request};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Resolved client address, stored in request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Client IP of a request, using the peer address recorded by `ConnectInfo` as fallback.
pub fn client_ip_of(request: &Request, trusted_proxy_count: usize) -> String {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    extract_client_ip(request.headers(), socket_addr.as_ref(), trusted_proxy_count)
}

/// Caller address and user agent, recorded on the sessions a login creates.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl FromRequestParts<Arc<AppState>> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let socket_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        let ip = extract_client_ip(
            &parts.headers,
            socket_addr.as_ref(),
            state.config.trusted_proxy_count(),
        );
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.chars().take(512).collect());
        Ok(RequestMeta { ip, user_agent })
    }
}

/// Returns the validated client IP, or `"unknown"`.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(header_value) = forwarded_for.to_str() {
            if let Some(ip) = extract_from_forwarded_for(header_value, trusted_proxy_count) {
                return ip;
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(header_value) = real_ip.to_str() {
            let trimmed = header_value.trim();
            if is_valid_ip(trimmed) {
                return trimmed.to_string();
            }
        }
    }

    if let Some(addr) = socket_addr {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// `client, proxy1, proxy2`: with N trusted proxies the client sits N+1 from the end.
/// With no trusted proxies only the closest hop is believed.
fn extract_from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> Option<String> {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let candidate = if trusted_proxy_count == 0 || ips.len() <= trusted_proxy_count {
        ips.last()?
    } else {
        ips.get(ips.len() - trusted_proxy_count - 1)?
    };

    is_valid_ip(candidate).then(|| candidate.to_string())
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_forwarded_for_single_ip() {
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1", 0).as_deref(),
            Some("192.168.1.1")
        );
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1", 1).as_deref(),
            Some("192.168.1.1")
        );
    }

    #[test]
    fn test_forwarded_for_skips_trusted_proxies() {
        assert_eq!(
            extract_from_forwarded_for("192.168.1.1, 10.0.0.1, 10.0.0.2", 2).as_deref(),
            Some("192.168.1.1")
        );
    }

    #[test]
    fn test_forwarded_for_without_trust_uses_closest_hop() {
        assert_eq!(
            extract_from_forwarded_for("6.6.6.6, 10.0.0.1", 0).as_deref(),
            Some("10.0.0.1")
        );
    }

    #[test]
    fn test_forwarded_for_rejects_garbage() {
        assert_eq!(extract_from_forwarded_for("not.an.ip.address", 0), None);
        assert_eq!(extract_from_forwarded_for(" , ", 0), None);
    }

    #[test]
    fn test_real_ip_then_socket_then_unknown() {
        let socket = SocketAddr::from(([127, 0, 0, 1], 8080));

        let headers = headers_with("x-real-ip", "203.0.113.9");
        assert_eq!(extract_client_ip(&headers, Some(&socket), 0), "203.0.113.9");

        let headers = headers_with("x-forwarded-for", "garbage");
        assert_eq!(extract_client_ip(&headers, Some(&socket), 0), "127.0.0.1");

        assert_eq!(extract_client_ip(&HeaderMap::new(), None, 0), "unknown");
    }
}
