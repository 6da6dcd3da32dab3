use async_graphql::*;

use crate::db::models::{LikeView, PostDetail, PostType, PostView, UserProfile};
use crate::error::AppError;
use crate::graphql::context::{feed_source, live_conn, page, require_user, viewer_id, ResultExt};
use crate::graphql::types::{
    CommentPage, FollowStatus, FollowersPage, FollowingPage, NotificationPage, PostPage,
    UnreadCount,
};
use crate::social::{comments, notifications, relations, users};

/// GraphQL Query root. Each field is a procedure namespace.
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn post(&self) -> PostQuery {
        PostQuery
    }

    async fn user(&self) -> UserQuery {
        UserQuery
    }

    async fn like(&self) -> LikeQuery {
        LikeQuery
    }

    async fn save(&self) -> SaveQuery {
        SaveQuery
    }

    async fn follow(&self) -> FollowQuery {
        FollowQuery
    }

    async fn comment(&self) -> CommentQuery {
        CommentQuery
    }

    async fn notification(&self) -> NotificationQuery {
        NotificationQuery
    }
}

pub struct PostQuery;

#[Object]
impl PostQuery {
    /// Global feed, newest first
    async fn feed(
        &self,
        ctx: &Context<'_>,
        cursor: Option<String>,
        #[graphql(default = 10, validator(minimum = 1, maximum = 50))] limit: i32,
        #[graphql(name = "type")] post_type: Option<PostType>,
    ) -> Result<PostPage> {
        let page = page(cursor, limit)?;
        let viewer = viewer_id(ctx)?;
        let posts = feed_source(ctx)?
            .feed(viewer, post_type, &page)
            .await
            .gql()?;
        Ok(posts.into())
    }

    /// A post with its likes and its comments in conversation order
    async fn by_id(&self, ctx: &Context<'_>, id: String) -> Result<Option<PostDetail>> {
        let viewer = viewer_id(ctx)?;
        feed_source(ctx)?.post_by_id(viewer, &id).await.gql()
    }

    async fn by_user(
        &self,
        ctx: &Context<'_>,
        user_id: String,
        cursor: Option<String>,
        #[graphql(default = 10, validator(minimum = 1, maximum = 50))] limit: i32,
    ) -> Result<PostPage> {
        let page = page(cursor, limit)?;
        let viewer = viewer_id(ctx)?;
        let posts = feed_source(ctx)?
            .posts_by_user(viewer, &user_id, &page)
            .await
            .gql()?;
        Ok(posts.into())
    }

    /// Most liked posts of the last seven days
    async fn trending(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = 10, validator(minimum = 1, maximum = 50))] limit: i32,
    ) -> Result<Vec<PostView>> {
        let viewer = viewer_id(ctx)?;
        feed_source(ctx)?
            .trending(viewer, limit as u32)
            .await
            .gql()
    }
}

pub struct UserQuery;

#[Object]
impl UserQuery {
    async fn by_id(&self, ctx: &Context<'_>, id: String) -> Result<Option<UserProfile>> {
        let viewer = viewer_id(ctx)?;
        feed_source(ctx)?.user_by_id(viewer, &id).await.gql()
    }

    async fn by_username(
        &self,
        ctx: &Context<'_>,
        username: String,
    ) -> Result<Option<UserProfile>> {
        let viewer = viewer_id(ctx)?;
        feed_source(ctx)?
            .user_by_username(viewer, &username)
            .await
            .gql()
    }

    async fn by_external_id(
        &self,
        ctx: &Context<'_>,
        external_id: String,
    ) -> Result<Option<UserProfile>> {
        let viewer = viewer_id(ctx)?;
        let conn = live_conn(ctx)?;
        users::by_external_id(&conn, viewer, &external_id).gql()
    }

    /// Case-insensitive username search, alphabetical
    async fn search(
        &self,
        ctx: &Context<'_>,
        #[graphql(validator(min_length = 1, max_length = 100))] query: String,
        #[graphql(default = 10, validator(minimum = 1, maximum = 50))] limit: i32,
    ) -> Result<Vec<UserProfile>> {
        let viewer = viewer_id(ctx)?;
        feed_source(ctx)?
            .search_users(viewer, &query, limit as u32)
            .await
            .gql()
    }

    /// The caller's own profile
    async fn me(&self, ctx: &Context<'_>) -> Result<UserProfile> {
        let user = require_user(ctx)?;
        let conn = live_conn(ctx)?;
        users::by_id(&conn, Some(user.id.as_str()), &user.id)
            .and_then(|profile| profile.ok_or_else(|| AppError::NotFound("User".into())))
            .gql()
    }
}

pub struct LikeQuery;

#[Object]
impl LikeQuery {
    /// Likes on a post, newest first
    async fn by_post(&self, ctx: &Context<'_>, post_id: String) -> Result<Vec<LikeView>> {
        let conn = live_conn(ctx)?;
        relations::likes_by_post(&conn, &post_id).gql()
    }
}

pub struct SaveQuery;

#[Object]
impl SaveQuery {
    /// Posts a user saved, most recently saved first
    async fn by_user(&self, ctx: &Context<'_>, user_id: String) -> Result<Vec<PostView>> {
        let user = require_user(ctx)?;
        let conn = live_conn(ctx)?;
        relations::saves_by_user(&conn, Some(user.id.as_str()), &user_id).gql()
    }
}

pub struct FollowQuery;

#[Object]
impl FollowQuery {
    async fn followers(
        &self,
        ctx: &Context<'_>,
        user_id: String,
        cursor: Option<String>,
        #[graphql(default = 20, validator(minimum = 1, maximum = 50))] limit: i32,
    ) -> Result<FollowersPage> {
        let page = page(cursor, limit)?;
        let viewer = viewer_id(ctx)?;
        let conn = live_conn(ctx)?;
        let found = relations::followers(&conn, viewer, &user_id, &page).gql()?;
        Ok(FollowersPage {
            followers: found.items,
            next_cursor: found.next_cursor,
        })
    }

    async fn following(
        &self,
        ctx: &Context<'_>,
        user_id: String,
        cursor: Option<String>,
        #[graphql(default = 20, validator(minimum = 1, maximum = 50))] limit: i32,
    ) -> Result<FollowingPage> {
        let page = page(cursor, limit)?;
        let viewer = viewer_id(ctx)?;
        let conn = live_conn(ctx)?;
        let found = relations::following(&conn, viewer, &user_id, &page).gql()?;
        Ok(FollowingPage {
            following: found.items,
            next_cursor: found.next_cursor,
        })
    }

    async fn is_following(
        &self,
        ctx: &Context<'_>,
        follower_id: String,
        following_id: String,
    ) -> Result<FollowStatus> {
        let conn = live_conn(ctx)?;
        let is_following = relations::is_following(&conn, &follower_id, &following_id).gql()?;
        Ok(FollowStatus { is_following })
    }
}

pub struct CommentQuery;

#[Object]
impl CommentQuery {
    /// Comments on a post, oldest first
    async fn by_post(
        &self,
        ctx: &Context<'_>,
        post_id: String,
        cursor: Option<String>,
        #[graphql(default = 20, validator(minimum = 1, maximum = 50))] limit: i32,
    ) -> Result<CommentPage> {
        let page = page(cursor, limit)?;
        let conn = live_conn(ctx)?;
        let found = comments::by_post(&conn, &post_id, &page).gql()?;
        Ok(found.into())
    }
}

pub struct NotificationQuery;

#[Object]
impl NotificationQuery {
    /// The caller's notifications, newest first
    async fn list(
        &self,
        ctx: &Context<'_>,
        cursor: Option<String>,
        #[graphql(default = 20, validator(minimum = 1, maximum = 50))] limit: i32,
    ) -> Result<NotificationPage> {
        let user = require_user(ctx)?;
        let page = page(cursor, limit)?;
        let conn = live_conn(ctx)?;
        let found = notifications::list(&conn, &user.id, &page).gql()?;
        Ok(found.into())
    }

    async fn unread_count(&self, ctx: &Context<'_>) -> Result<UnreadCount> {
        let user = require_user(ctx)?;
        let conn = live_conn(ctx)?;
        let count = notifications::unread_count(&conn, &user.id).gql()?;
        Ok(UnreadCount { count })
    }
}
