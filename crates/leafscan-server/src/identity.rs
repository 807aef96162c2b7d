//! Caller identity resolution
//!
//! Credentials are checked by an authenticator in front of this service.
//! The server only needs a stable, opaque id to scope detection history.

use crate::routes::AppError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Header set by the upstream authenticator
pub const USER_ID_HEADER: &str = "x-user-id";

const TOKEN_ID_PREFIX: &str = "usr_";
const TOKEN_ID_HEX_LEN: usize = 16;

/// Opaque id of the caller making a request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve from request headers
    ///
    /// Priority:
    /// 1. `x-user-id` header
    /// 2. Bearer token, reduced to a digest
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        if let Some(value) = headers.get(USER_ID_HEADER) {
            if let Ok(id) = value.to_str() {
                let id = id.trim();
                if !id.is_empty() {
                    debug!("Resolved caller from header");
                    return Some(Self::new(id));
                }
            }
        }

        if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
            if let Ok(auth_str) = auth.to_str() {
                if let Some(token) = extract_bearer_token(auth_str) {
                    debug!("Resolved caller from bearer token");
                    return Some(Self::from_token(token));
                }
            }
        }

        None
    }

    /// Derive a stable id from a token without keeping the token
    pub fn from_token(token: &str) -> Self {
        let digest = format!("{:x}", Sha256::digest(token.as_bytes()));
        Self(format!("{}{}", TOKEN_ID_PREFIX, &digest[..TOKEN_ID_HEX_LEN]))
    }
}

impl std::fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers).ok_or(AppError::Unauthorized)
    }
}

/// Extract the token from an `Authorization: Bearer ...` value
fn extract_bearer_token(auth: &str) -> Option<&str> {
    let token = auth.trim().strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
