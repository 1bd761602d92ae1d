use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use crate::state::AppState;

/// Address of the calling client, used to bucket anonymous requests for
/// rate limiting.
///
/// The socket peer address is used unless `server.trust_forwarded_headers`
/// is set, in which case the first hop of `X-Forwarded-For`, then
/// `X-Real-IP`, take precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl ClientAddr {
    /// Rate-limit bucket for this request.
    pub fn bucket(&self, user_id: Option<i32>) -> String {
        match user_id {
            Some(id) => format!("user:{id}"),
            None => format!("ip:{}", self.0),
        }
    }

    pub fn resolve(parts: &Parts, trust_forwarded: bool) -> Self {
        let forwarded = trust_forwarded
            .then(|| {
                header_value(parts, "X-Forwarded-For").or_else(|| header_value(parts, "X-Real-IP"))
            })
            .flatten();
        let addr = forwarded
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());
        ClientAddr(addr)
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl FromRequestParts<AppState> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::resolve(
            parts,
            state.config.server.trust_forwarded_headers,
        ))
    }
}
