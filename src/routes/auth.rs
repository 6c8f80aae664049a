//! Bearer-token authentication for REST routes and the websocket upgrade.

use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use tracing::warn;

use crate::services::auth::{AuthError, Identity};
use crate::state::AppState;

/// Verify `token` with the configured verifier.
///
/// Maps failures to the status the caller should answer with.
pub(crate) async fn authenticate(state: &AppState, token: &str) -> Result<Identity, StatusCode> {
    let Some(verifier) = &state.verifier else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };
    match verifier.verify(token).await {
        Ok(identity) => Ok(identity),
        Err(AuthError::MissingToken) => Err(StatusCode::UNAUTHORIZED),
        Err(AuthError::InvalidToken) => Err(StatusCode::FORBIDDEN),
        Err(e @ AuthError::Unavailable(_)) => {
            warn!(error = %e, "token verification failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from `Authorization: Bearer <token>`.
/// Use as a handler parameter to require authentication.
pub struct AuthUser(pub Identity);

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .unwrap_or_default();
        if token.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let app_state = AppState::from_ref(state);
        authenticate(&app_state, token).await.map(Self)
    }
}
