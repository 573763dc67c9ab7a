//! Custom extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::AppState;

/// Best-effort client address.
///
/// With `trust_proxy_headers` set: first `X-Forwarded-For` hop, then
/// `X-Real-IP`. Otherwise, and as the fallback, the socket peer, else
/// `"unknown"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(resolve(parts, state.config.trust_proxy_headers))
    }
}

fn resolve(parts: &Parts, trust_proxy_headers: bool) -> ClientIp {
    if trust_proxy_headers && let Some(ip) = from_headers(&parts.headers) {
        return ClientIp(ip);
    }
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    ClientIp(peer.unwrap_or_else(|| "unknown".into()))
}

fn from_headers(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let forwarded = header("x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty());
    forwarded.or_else(|| header("x-real-ip").map(|v| v.trim().to_string()).filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn extract(request: Request<()>, trust_proxy_headers: bool) -> String {
        let (parts, _) = request.into_parts();
        resolve(&parts, trust_proxy_headers).0
    }

    fn with_peer(mut request: Request<()>) -> Request<()> {
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4242))));
        request
    }

    #[test]
    fn forwarded_for_first_hop_wins_behind_trusted_proxy() {
        let req = Request::builder()
            .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
            .header("x-real-ip", "10.0.0.2")
            .body(())
            .unwrap();
        assert_eq!(extract(req, true), "198.51.100.4");
    }

    #[test]
    fn real_ip_then_peer_then_unknown() {
        let req = Request::builder()
            .header("x-real-ip", "198.51.100.9")
            .body(())
            .unwrap();
        assert_eq!(extract(req, true), "198.51.100.9");

        let req = with_peer(Request::builder().body(()).unwrap());
        assert_eq!(extract(req, true), "192.0.2.1");

        assert_eq!(extract(Request::builder().body(()).unwrap(), true), "unknown");
    }

    #[test]
    fn untrusted_headers_are_ignored() {
        let req = with_peer(
            Request::builder()
                .header("x-forwarded-for", "203.0.113.66")
                .header("x-real-ip", "203.0.113.67")
                .body(())
                .unwrap(),
        );
        assert_eq!(extract(req, false), "192.0.2.1");
    }
}
