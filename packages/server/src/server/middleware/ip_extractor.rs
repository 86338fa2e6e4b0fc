use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

/// Extension carrying the client address used for rate-limit keys and OTP
/// dispatch audit logs.
#[derive(Clone, Debug)]
pub struct ClientIp(pub IpAddr);

/// Resolve the client address from proxy headers.
///
/// X-Forwarded-For wins (first hop in the list), then X-Real-IP. Values
/// that do not parse as an address are ignored rather than trusted.
fn ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        return forwarded
            .to_str()
            .ok()
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse().ok());
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Middleware storing the resolved client IP in request extensions.
/// Falls back to the socket peer address when no proxy header is present.
pub async fn extract_client_ip(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let ip = ip_from_headers(request.headers()).unwrap_or_else(|| addr.ip());
    request.extensions_mut().insert(ClientIp(ip));
    next.run(request).await
}
