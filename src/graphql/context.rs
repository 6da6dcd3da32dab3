use std::sync::Arc;

use async_graphql::{Context, ErrorExtensions, Result};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

use crate::db::pagination::PageRequest;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::source::FeedSource;
use crate::state::{DbPool, Mode};

/// Per-request data every resolver can see.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub mode: Mode,
    pub viewer: Option<CurrentUser>,
}

impl RequestContext {
    pub fn viewer_id(&self) -> Option<&str> {
        self.viewer.as_ref().map(|v| v.id.as_str())
    }
}

/// Converts domain errors into GraphQL errors carrying `extensions.code`.
pub(crate) trait ResultExt<T> {
    fn gql(self) -> Result<T>;
}

impl<T> ResultExt<T> for AppResult<T> {
    fn gql(self) -> Result<T> {
        self.map_err(|e| e.extend())
    }
}

pub(crate) fn request<'a>(ctx: &Context<'a>) -> Result<&'a RequestContext> {
    ctx.data::<RequestContext>()
}

pub(crate) fn viewer_id<'a>(ctx: &Context<'a>) -> Result<Option<&'a str>> {
    Ok(request(ctx)?.viewer_id())
}

/// The caller, or UNAUTHORIZED. In demo mode nobody is signed in and the
/// answer is SERVICE_UNAVAILABLE instead.
pub(crate) fn require_user<'a>(ctx: &Context<'a>) -> Result<&'a CurrentUser> {
    let request = request(ctx)?;
    request.mode.require_live().gql()?;
    request.viewer.as_ref().ok_or(AppError::Unauthorized).gql()
}

/// Database pool for procedures that only exist against a live backend.
pub(crate) fn live_db<'a>(ctx: &Context<'a>) -> Result<&'a DbPool> {
    request(ctx)?.mode.require_live().gql()?;
    ctx.data::<DbPool>()
}

pub(crate) fn live_conn(ctx: &Context<'_>) -> Result<PooledConnection<SqliteConnectionManager>> {
    live_db(ctx)?.get().map_err(AppError::from).gql()
}

pub(crate) fn feed_source<'a>(ctx: &Context<'a>) -> Result<&'a Arc<dyn FeedSource>> {
    ctx.data::<Arc<dyn FeedSource>>()
}

pub(crate) fn page(cursor: Option<String>, limit: i32) -> Result<PageRequest> {
    PageRequest::new(cursor, i64::from(limit)).gql()
}
