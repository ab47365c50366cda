use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use moyu_types::models::User;

use crate::error::ApiError;
use crate::services::{ServiceError, run_blocking, users};
use crate::state::AppState;

/// The authenticated actor of a request, inserted by [`require_auth`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CurrentUser>().cloned().ok_or_else(|| {
            warn!("{} {} reached a handler without an authenticated user", parts.method, parts.uri.path());
            ApiError::Unauthenticated
        })
    }
}

/// Token part of an `Authorization` header.
///
/// `None` when the header does not use the Bearer scheme. A header that does
/// not split into exactly two space-separated parts yields an empty token,
/// which the validator then rejects.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    if !header_value.starts_with("Bearer") {
        return None;
    }
    let parts: Vec<&str> = header_value.split(' ').collect();
    Some(if parts.len() == 2 { parts[1] } else { "" })
}

/// Resolve the bearer token to a user, or answer 401.
///
/// Every failure produces the same response; the cause is only logged.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let Some(token) = bearer_token(header_value) else {
        debug!("{} {}: no bearer credentials", req.method(), req.uri().path());
        return Err(ApiError::Unauthenticated);
    };

    let claims = state.tokens.validate(token).map_err(|e| {
        warn!("{} {}: {}", req.method(), req.uri().path(), e);
        ApiError::Unauthenticated
    })?;

    let user_id = claims.user_id;
    let user = run_blocking(&state, move |db| users::get_by_id(db, user_id))
        .await
        .map_err(|e| {
            match e {
                ServiceError::NotFound(_) => warn!("Token for unknown user {}", user_id),
                other => warn!("User lookup for {} failed: {}", user_id, other),
            }
            ApiError::Unauthenticated
        })?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
