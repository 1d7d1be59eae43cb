use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::types::Actor;

const USER_ID_HEADER: &str = "x-user-id";
const USERNAME_HEADER: &str = "x-username";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Identity of the caller. Authentication happens in front of the panel;
/// the authenticating proxy passes the user along in headers.
#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(&parts.headers, USER_ID_HEADER).unwrap_or_else(|| "anonymous".into());
        let username = header(&parts.headers, USERNAME_HEADER).unwrap_or_else(|| user_id.clone());

        let forwarded = header(&parts.headers, FORWARDED_FOR_HEADER)
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()));
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(Actor {
            user_id,
            username,
            ip: forwarded.or(peer).unwrap_or_else(|| "unknown".into()),
        })
    }
}
