/// Client address resolution
///
/// Behind a reverse proxy the socket peer is the proxy, so with
/// `TRUST_PROXY=true` the first address in `X-Forwarded-For` (or
/// `X-Real-IP`) is used instead. Without a trusted proxy only the socket
/// address counts; forwarded headers can be forged by any client.
///
/// The resolved address is stored as a [`ClientIp`] request extension and
/// used for login audit logging.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

use crate::app::AppState;

/// Resolved client address; `None` when it cannot be determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientIp(pub Option<IpAddr>);

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse().ok())
    {
        return Some(ip);
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}

/// Picks the client address for a request
pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy: bool,
) -> ClientIp {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(headers) {
            return ClientIp(Some(ip));
        }
    }

    ClientIp(peer.map(|addr| addr.ip()))
}

/// Middleware that records [`ClientIp`] on every request
pub async fn client_ip_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let client_ip = resolve_client_ip(req.headers(), peer, state.config.api.trust_proxy);
    req.extensions_mut().insert(client_ip);

    next.run(req).await
}
