//! Requester address resolution middleware.
//!
//! Sessions are bound to the requester's network address, which the server
//! derives itself. The client never gets to name it. For every request
//! this middleware:
//! 1. Reads the first `X-Forwarded-For` entry, then `X-Real-IP`
//!    (only when forwarded headers are trusted)
//! 2. Falls back to the TCP peer address
//! 3. Injects the result as a [`Requester`] extension
//! 4. Rejects the request with HTTP 400 if no address can be found

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Resolved requester, extracted by handlers with `Extension<Requester>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub address: IpAddr,
}

/// Where the requester address may come from.
#[derive(Debug, Clone, Copy)]
pub struct AddressPolicy {
    /// Honour `X-Forwarded-For` / `X-Real-IP` set by a reverse proxy
    pub trust_forwarded_headers: bool,
}

pub async fn resolve_requester(
    State(policy): State<AddressPolicy>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let address = requester_address(request.headers(), peer, policy)
        .ok_or(AppError::UnknownRequester)?;

    request.extensions_mut().insert(Requester { address });

    Ok(next.run(request).await)
}

/// Pick the address a session should be bound to.
pub fn requester_address(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    policy: AddressPolicy,
) -> Option<IpAddr> {
    if policy.trust_forwarded_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|list| list.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());

        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.trim().parse::<IpAddr>().ok());

        if real_ip.is_some() {
            return real_ip;
        }
    }

    peer
}

/// Short, stable stand-in for an address in log output.
pub fn address_fingerprint(address: &IpAddr) -> String {
    let mut hasher = Sha256::new();
    hasher.update(address.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}
