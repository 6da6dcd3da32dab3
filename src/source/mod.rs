//! Read side of the public feed, selected once at startup: the database in
//! normal operation, built-in fixtures in demo mode.

pub mod fixtures;

use async_trait::async_trait;

use crate::db::models::{PostDetail, PostType, PostView, UserProfile};
use crate::db::pagination::{Page, PageRequest};
use crate::error::AppResult;
use crate::social::{posts, users};
use crate::state::DbPool;

pub use fixtures::FixtureFeedSource;

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn feed(
        &self,
        viewer: Option<&str>,
        post_type: Option<PostType>,
        page: &PageRequest,
    ) -> AppResult<Page<PostView>>;

    async fn post_by_id(&self, viewer: Option<&str>, id: &str) -> AppResult<Option<PostDetail>>;

    async fn posts_by_user(
        &self,
        viewer: Option<&str>,
        user_id: &str,
        page: &PageRequest,
    ) -> AppResult<Page<PostView>>;

    async fn trending(&self, viewer: Option<&str>, limit: u32) -> AppResult<Vec<PostView>>;

    async fn user_by_id(&self, viewer: Option<&str>, id: &str) -> AppResult<Option<UserProfile>>;

    async fn user_by_username(
        &self,
        viewer: Option<&str>,
        username: &str,
    ) -> AppResult<Option<UserProfile>>;

    async fn search_users(
        &self,
        viewer: Option<&str>,
        query: &str,
        limit: u32,
    ) -> AppResult<Vec<UserProfile>>;
}

pub struct SqliteFeedSource {
    pool: DbPool,
}

impl SqliteFeedSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedSource for SqliteFeedSource {
    async fn feed(
        &self,
        viewer: Option<&str>,
        post_type: Option<PostType>,
        page: &PageRequest,
    ) -> AppResult<Page<PostView>> {
        let conn = self.pool.get()?;
        posts::feed(&conn, viewer, post_type, page)
    }

    async fn post_by_id(&self, viewer: Option<&str>, id: &str) -> AppResult<Option<PostDetail>> {
        let conn = self.pool.get()?;
        posts::by_id(&conn, viewer, id)
    }

    async fn posts_by_user(
        &self,
        viewer: Option<&str>,
        user_id: &str,
        page: &PageRequest,
    ) -> AppResult<Page<PostView>> {
        let conn = self.pool.get()?;
        posts::by_user(&conn, viewer, user_id, page)
    }

    async fn trending(&self, viewer: Option<&str>, limit: u32) -> AppResult<Vec<PostView>> {
        let conn = self.pool.get()?;
        posts::trending(&conn, viewer, limit)
    }

    async fn user_by_id(&self, viewer: Option<&str>, id: &str) -> AppResult<Option<UserProfile>> {
        let conn = self.pool.get()?;
        users::by_id(&conn, viewer, id)
    }

    async fn user_by_username(
        &self,
        viewer: Option<&str>,
        username: &str,
    ) -> AppResult<Option<UserProfile>> {
        let conn = self.pool.get()?;
        users::by_username(&conn, viewer, username)
    }

    async fn search_users(
        &self,
        viewer: Option<&str>,
        query: &str,
        limit: u32,
    ) -> AppResult<Vec<UserProfile>> {
        let conn = self.pool.get()?;
        users::search(&conn, viewer, query, limit)
    }
}
