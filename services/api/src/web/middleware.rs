//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use invoice_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::web::state::AppState;

/// Middleware that verifies the request credential and resolves the caller's user record.
///
/// If valid, inserts the `User` into request extensions for handlers to use.
/// A missing or rejected credential yields 401; a verified identity without a
/// user record yields 404.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the credential from the Authorization header or the session cookie
    let credential = extract_credential(req.headers()).ok_or(ApiError::Unauthenticated)?;

    // 2. Ask the identity provider who this is
    let external_id = state
        .identity
        .current_identity(&credential)
        .await
        .map_err(|e| match e {
            PortError::Unexpected(reason) => {
                warn!("Identity provider failed: {}", reason);
                ApiError::Dependency(reason)
            }
            _ => ApiError::Unauthenticated,
        })?;

    // 3. Resolve the user record for that identity
    let user = state.users.find_user_by_external_id(&external_id).await?;
    debug!(user_id = %user.id, "Request authenticated");

    // 4. Insert the user into request extensions
    req.extensions_mut().insert(user);

    // 5. Continue to the handler
    Ok(next.run(req).await)
}

/// Reads a bearer token, falling back to the `session` cookie.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
