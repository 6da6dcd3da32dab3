use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::auth::{self, provision};
use crate::db::models::UserProfile;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub external_id: String,
}

impl From<UserProfile> for CurrentUser {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            username: profile.username,
            external_id: profile.external_id,
        }
    }
}

/// Resolves the caller from the request credentials, provisioning a profile
/// on first sight. Any failure along the way is logged and yields `None`.
pub async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Option<CurrentUser> {
    let verifier = state.verifier.as_ref()?;
    let token = auth::access_token(headers, &state.config.auth.cookie_name)?;

    let identity = match verifier.verify(token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!("Rejected access token: {}", e);
            return None;
        }
    };

    let provisioned = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| provision::ensure_profile(&conn, &identity));

    match provisioned {
        Ok(profile) => Some(profile.into()),
        Err(e) => {
            tracing::warn!(
                "Could not resolve profile for {}, continuing anonymously: {}",
                identity.subject,
                e
            );
            None
        }
    }
}

/// Extractor that requires authentication.
/// Returns 503 in demo mode and 401 if no valid token is presented.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state.mode.require_live()?;
        resolve_user(state, &parts.headers)
            .await
            .ok_or(AppError::Unauthorized)
    }
}

/// Optional user extractor: returns None instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_user(state, &parts.headers).await))
    }
}
