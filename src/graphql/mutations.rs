use async_graphql::*;

use crate::db::models::{CommentView, NotificationView, PostView, UserProfile};
use crate::graphql::context::{live_conn, require_user, ResultExt};
use crate::graphql::types::{
    CreatePostInput, CreateUserInput, FollowToggle, LikeToggle, SaveToggle, SuccessResult,
    UpdateUserInput,
};
use crate::social::relations::{self, Relation};
use crate::social::{comments, notifications, posts, users};

/// GraphQL Mutation root. Every mutation requires a signed-in caller.
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn post(&self) -> PostMutation {
        PostMutation
    }

    async fn user(&self) -> UserMutation {
        UserMutation
    }

    async fn like(&self) -> LikeMutation {
        LikeMutation
    }

    async fn save(&self) -> SaveMutation {
        SaveMutation
    }

    async fn follow(&self) -> FollowMutation {
        FollowMutation
    }

    async fn comment(&self) -> CommentMutation {
        CommentMutation
    }

    async fn notification(&self) -> NotificationMutation {
        NotificationMutation
    }
}

pub struct PostMutation;

#[Object]
impl PostMutation {
    /// Publish a post as the caller
    async fn create(&self, ctx: &Context<'_>, input: CreatePostInput) -> Result<PostView> {
        let user = require_user(ctx)?;
        let conn = live_conn(ctx)?;
        let post = posts::create(&conn, &user.id, input.into()).gql()?;
        tracing::info!("{} published post {}", user.username, post.id);
        Ok(post)
    }

    /// Delete one of the caller's posts
    async fn delete(&self, ctx: &Context<'_>, id: String) -> Result<SuccessResult> {
        let user = require_user(ctx)?;
        let conn = live_conn(ctx)?;
        posts::delete(&conn, &user.id, &id).gql()?;
        Ok(SuccessResult::ok())
    }
}

pub struct UserMutation;

#[Object]
impl UserMutation {
    async fn create(&self, ctx: &Context<'_>, input: CreateUserInput) -> Result<UserProfile> {
        require_user(ctx)?;
        let conn = live_conn(ctx)?;
        users::create(&conn, input.into()).gql()
    }

    /// Update the caller's own profile
    async fn update(&self, ctx: &Context<'_>, input: UpdateUserInput) -> Result<UserProfile> {
        let user = require_user(ctx)?;
        let conn = live_conn(ctx)?;
        users::update(&conn, &user.id, input.into()).gql()
    }
}

pub struct LikeMutation;

#[Object]
impl LikeMutation {
    async fn toggle(&self, ctx: &Context<'_>, post_id: String) -> Result<LikeToggle> {
        let user = require_user(ctx)?;
        let mut conn = live_conn(ctx)?;
        let liked = relations::toggle(&mut conn, Relation::Like, &user.id, &post_id).gql()?;
        Ok(LikeToggle { liked })
    }
}

pub struct SaveMutation;

#[Object]
impl SaveMutation {
    async fn toggle(&self, ctx: &Context<'_>, post_id: String) -> Result<SaveToggle> {
        let user = require_user(ctx)?;
        let mut conn = live_conn(ctx)?;
        let saved = relations::toggle(&mut conn, Relation::Save, &user.id, &post_id).gql()?;
        Ok(SaveToggle { saved })
    }
}

pub struct FollowMutation;

#[Object]
impl FollowMutation {
    async fn toggle(&self, ctx: &Context<'_>, target_user_id: String) -> Result<FollowToggle> {
        let user = require_user(ctx)?;
        let mut conn = live_conn(ctx)?;
        let following =
            relations::toggle(&mut conn, Relation::Follow, &user.id, &target_user_id).gql()?;
        Ok(FollowToggle { following })
    }
}

pub struct CommentMutation;

#[Object]
impl CommentMutation {
    async fn create(
        &self,
        ctx: &Context<'_>,
        post_id: String,
        #[graphql(validator(min_length = 1, max_length = 1000))] content: String,
    ) -> Result<CommentView> {
        let user = require_user(ctx)?;
        let mut conn = live_conn(ctx)?;
        comments::create(&mut conn, &user.id, &post_id, &content).gql()
    }

    async fn delete(&self, ctx: &Context<'_>, id: String) -> Result<SuccessResult> {
        let user = require_user(ctx)?;
        let conn = live_conn(ctx)?;
        comments::delete(&conn, &user.id, &id).gql()?;
        Ok(SuccessResult::ok())
    }
}

pub struct NotificationMutation;

#[Object]
impl NotificationMutation {
    async fn mark_read(&self, ctx: &Context<'_>, id: String) -> Result<NotificationView> {
        let user = require_user(ctx)?;
        let conn = live_conn(ctx)?;
        notifications::mark_read(&conn, &user.id, &id).gql()
    }

    async fn mark_all_read(&self, ctx: &Context<'_>) -> Result<SuccessResult> {
        let user = require_user(ctx)?;
        let conn = live_conn(ctx)?;
        let updated = notifications::mark_all_read(&conn, &user.id).gql()?;
        tracing::debug!("Marked {} notifications read for {}", updated, user.username);
        Ok(SuccessResult::ok())
    }
}
