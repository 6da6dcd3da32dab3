use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use crate::db::models::UserProfile;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::social::users;
use crate::state::AppState;

#[derive(Serialize)]
pub struct EnsureProfileResponse {
    pub success: bool,
    pub user: UserProfile,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth/ensure-profile", post(ensure_profile))
}

/// Resolving `CurrentUser` already provisions the profile; this returns it.
async fn ensure_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<EnsureProfileResponse>> {
    let conn = state.db.get()?;
    let user = users::by_id(&conn, Some(user.id.as_str()), &user.id)?
        .ok_or_else(|| AppError::NotFound("User".into()))?;
    Ok(Json(EnsureProfileResponse {
        success: true,
        user,
    }))
}
