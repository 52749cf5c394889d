use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use inkpost_types::claims::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Verified identity for the current request.
///
/// Built only from verified claims, so `user_id()` and `claims().id` agree.
#[derive(Debug, Clone)]
pub struct RequestContext {
    user_id: u64,
    claims: Claims,
}

impl RequestContext {
    pub fn new(claims: Claims) -> Self {
        Self {
            user_id: claims.id,
            claims,
        }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("missing token".into()))
    }
}

/// Extract and validate the bearer token from the Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(raw) = req.headers().get(header::AUTHORIZATION) else {
        warn!(path = %req.uri().path(), "request without token");
        return Err(ApiError::Unauthorized("missing token".into()));
    };

    let value = raw
        .to_str()
        .map_err(|_| ApiError::Unauthorized("invalid or expired token".into()))?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();

    let claims = state.tokens.verify(token)?;
    debug!(user_id = claims.id, "authenticated");

    req.extensions_mut().insert(RequestContext::new(claims));
    Ok(next.run(req).await)
}
