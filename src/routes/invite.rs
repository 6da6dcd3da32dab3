use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::InviteView;
use crate::db::pagination::PageRequest;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::social::invites::{self, InviteCheck};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 20;

// -- Request types --

#[derive(Deserialize)]
pub struct UseInviteRequest {
    pub code: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct ValidateQuery {
    pub code: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct GeneratedInvite {
    pub code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteList {
    pub invites: Vec<InviteView>,
    pub next_cursor: Option<String>,
}

#[derive(Serialize)]
pub struct UseInviteResponse {
    pub success: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/invite/generate", post(generate))
        .route("/api/invite/list", get(list))
        .route("/api/invite/use", post(use_invite))
        .route("/api/invite/validate", get(validate))
}

fn required_code(code: Option<String>) -> AppResult<String> {
    code.filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("code is required".into()))
}

async fn generate(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<GeneratedInvite>> {
    let conn = state.db.get()?;
    let code = invites::create(&conn, &user.id)?;
    Ok(Json(GeneratedInvite { code }))
}

async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<InviteList>> {
    let page = PageRequest::new(query.cursor, query.limit.unwrap_or(DEFAULT_LIST_LIMIT))?;
    let conn = state.db.get()?;
    let found = invites::list(&conn, &user.id, &page)?;
    Ok(Json(InviteList {
        invites: found.items,
        next_cursor: found.next_cursor,
    }))
}

async fn use_invite(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UseInviteRequest>,
) -> AppResult<Json<UseInviteResponse>> {
    let code = required_code(req.code)?;
    let conn = state.db.get()?;
    invites::redeem(&conn, &user.id, &code)?;
    Ok(Json(UseInviteResponse { success: true }))
}

/// Public check used by the sign-up screen before an account exists.
async fn validate(
    State(state): State<AppState>,
    Query(query): Query<ValidateQuery>,
) -> AppResult<Json<InviteCheck>> {
    state.mode.require_live()?;
    let code = required_code(query.code)?;
    let conn = state.db.get()?;
    Ok(Json(invites::validate(&conn, &code)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_code_is_required() {
        assert!(matches!(required_code(None), Err(AppError::BadRequest(_))));
        assert!(matches!(
            required_code(Some("   ".into())),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(required_code(Some("ABCD2345".into())).unwrap(), "ABCD2345");
    }
}
