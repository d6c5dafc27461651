use axum::http::HeaderMap;
use std::net::IpAddr;

const LOOPBACK: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

/// Client IP for rate limiting. Forwarding headers are only consulted when
/// the deployment sits behind a trusted proxy; otherwise the socket decides.
pub fn client_ip(headers: &HeaderMap, socket: Option<IpAddr>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        extract_ip_from_headers(headers, socket)
    } else {
        socket.unwrap_or(LOOPBACK)
    }
}

/// Client IP for rate limiting: first `x-forwarded-for` hop, then
/// `x-real-ip`, then the socket address, then loopback.
pub fn extract_ip_from_headers(headers: &HeaderMap, fallback: Option<IpAddr>) -> IpAddr {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(first) = h.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }
    if let Some(h) = headers.get("x-real-ip").and_then(|hv| hv.to_str().ok()) {
        if let Ok(ip) = h.trim().parse::<IpAddr>() {
            return ip;
        }
    }
    fallback.unwrap_or(LOOPBACK)
}
