//! Bearer-token authentication
//!
//! Session issuance belongs to the marketplace's auth stack; this registry
//! is the seam the chat service authenticates against. The same token is
//! presented in REST `Authorization` headers and at the WebSocket
//! handshake.

use actix_web::HttpRequest;
use dashmap::DashMap;
use uuid::Uuid;

use bloxtrade_core::UserId;

use crate::error::ApiError;

/// Token-to-user registry
#[derive(Default)]
pub struct TokenRegistry {
    tokens: DashMap<String, UserId>,
}

impl TokenRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh bearer token for a user
    pub fn issue(&self, user_id: UserId) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), user_id);
        token
    }

    /// Resolve a bearer token to its user
    pub fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token).map(|u| u.clone())
    }

    /// Invalidate a token (logout)
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }
}

/// Authenticate a request from its `Authorization: Bearer` header, falling
/// back to a `token` query parameter (WebSocket handshake).
pub fn authenticate(req: &HttpRequest, registry: &TokenRegistry) -> Result<UserId, ApiError> {
    let token = bearer_token(req)
        .or_else(|| query_token(req))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
    registry
        .resolve(&token)
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".to_string()))
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn query_token(req: &HttpRequest) -> Option<String> {
    req.query_string().split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then(|| value.to_string())
    })
}
