//! Client IP resolution
//!
//! Order: `X-Forwarded-For` (honouring the number of trusted proxies), then
//! `X-Real-IP`, then the peer socket address. Every candidate must parse as an
//! IP address; otherwise the next source is tried.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::AppState;

pub const UNKNOWN_IP: &str = "unknown";

/// Resolve the client IP from headers and the peer address.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|chain| from_forwarded_for(chain, trusted_proxy_count))
        .or_else(|| {
            header("x-real-ip")
                .map(str::trim)
                .filter(|ip| is_valid_ip(ip))
                .map(String::from)
        })
        .or_else(|| socket_addr.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

/// Resolve the client IP of an in-flight request.
pub fn request_client_ip(request: &Request, trusted_proxy_count: usize) -> String {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    extract_client_ip(request.headers(), socket_addr.as_ref(), trusted_proxy_count)
}

/// Pick the client entry of an `X-Forwarded-For` chain (`client, proxy1, proxy2`).
///
/// With N trusted proxies the client sits just before the last N entries. With no
/// trusted proxies only the entry closest to us is used, since everything before it
/// is client-controlled.
fn from_forwarded_for(chain: &str, trusted_proxy_count: usize) -> Option<String> {
    let ips: Vec<&str> = chain
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let candidate = if trusted_proxy_count == 0 || ips.len() <= trusted_proxy_count {
        ips.last()?
    } else {
        ips.get(ips.len() - trusted_proxy_count - 1)?
    };

    is_valid_ip(candidate).then(|| candidate.to_string())
}

fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok()
}

/// Extractor for the resolved client IP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let socket_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(extract_client_ip(
            &parts.headers,
            socket_addr.as_ref(),
            state.config.trusted_proxy_count(),
        )))
    }
}
