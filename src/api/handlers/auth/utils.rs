//! Request helpers shared by the auth handlers.

use axum::{
    extract::ConnectInfo,
    http::{header::USER_AGENT, HeaderMap},
};
use std::net::SocketAddr;

use crate::session::ClientMeta;

const MAX_USER_AGENT_LEN: usize = 512;

/// Extract a client IP from common proxy headers.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Advisory metadata for a new session; proxy headers win over the peer address.
pub(crate) fn client_meta(
    headers: &HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> ClientMeta {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.chars().take(MAX_USER_AGENT_LEN).collect());
    let client_ip = extract_client_ip(headers)
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()));
    ClientMeta {
        user_agent,
        client_ip,
    }
}
