use async_graphql::*;

use crate::db::models::{CommentView, NotificationView, PostType, PostView, UserProfile};
use crate::db::pagination::Page;
use crate::social::posts::NewPost;
use crate::social::users::{NewUser, ProfileUpdate};

/// One page of posts
#[derive(Clone, Debug, SimpleObject)]
pub struct PostPage {
    pub posts: Vec<PostView>,
    /// Pass back as `cursor` to fetch the next page; absent on the last page
    pub next_cursor: Option<String>,
}

impl From<Page<PostView>> for PostPage {
    fn from(page: Page<PostView>) -> Self {
        Self {
            posts: page.items,
            next_cursor: page.next_cursor,
        }
    }
}

/// One page of comments, oldest first
#[derive(Clone, Debug, SimpleObject)]
pub struct CommentPage {
    pub comments: Vec<CommentView>,
    pub next_cursor: Option<String>,
}

impl From<Page<CommentView>> for CommentPage {
    fn from(page: Page<CommentView>) -> Self {
        Self {
            comments: page.items,
            next_cursor: page.next_cursor,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct FollowersPage {
    pub followers: Vec<UserProfile>,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct FollowingPage {
    pub following: Vec<UserProfile>,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct NotificationPage {
    pub notifications: Vec<NotificationView>,
    pub next_cursor: Option<String>,
}

impl From<Page<NotificationView>> for NotificationPage {
    fn from(page: Page<NotificationView>) -> Self {
        Self {
            notifications: page.items,
            next_cursor: page.next_cursor,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct LikeToggle {
    /// Whether the caller likes the post after the toggle
    pub liked: bool,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct SaveToggle {
    pub saved: bool,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct FollowToggle {
    pub following: bool,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct FollowStatus {
    pub is_following: bool,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct SuccessResult {
    pub success: bool,
}

impl SuccessResult {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct UnreadCount {
    pub count: i64,
}

/// Input for publishing a post
#[derive(InputObject)]
pub struct CreatePostInput {
    #[graphql(name = "type")]
    pub post_type: PostType,

    #[graphql(validator(min_length = 1, max_length = 2000))]
    pub caption: String,

    #[graphql(validator(url))]
    pub image_url: Option<String>,

    /// Typed payload; its shape must match `type`
    pub metadata: Option<Json<serde_json::Value>>,
}

impl From<CreatePostInput> for NewPost {
    fn from(input: CreatePostInput) -> Self {
        Self {
            post_type: input.post_type,
            caption: input.caption,
            image_url: input.image_url,
            metadata: input.metadata.map(|Json(value)| value),
        }
    }
}

/// Input for creating a profile explicitly
#[derive(InputObject)]
pub struct CreateUserInput {
    /// Identity provider subject
    #[graphql(validator(min_length = 1))]
    pub external_id: String,

    #[graphql(validator(min_length = 3, max_length = 30, regex = "^[a-zA-Z0-9_]+$"))]
    pub username: String,

    #[graphql(validator(max_length = 500))]
    pub bio: Option<String>,

    #[graphql(validator(url))]
    pub avatar_url: Option<String>,
}

impl From<CreateUserInput> for NewUser {
    fn from(input: CreateUserInput) -> Self {
        Self {
            external_id: input.external_id,
            username: input.username,
            bio: input.bio,
            avatar_url: input.avatar_url,
        }
    }
}

/// Partial profile update; omitted fields keep their value
#[derive(InputObject, Default)]
pub struct UpdateUserInput {
    #[graphql(validator(min_length = 3, max_length = 30, regex = "^[a-zA-Z0-9_]+$"))]
    pub username: Option<String>,

    #[graphql(validator(max_length = 500))]
    pub bio: Option<String>,

    #[graphql(validator(url))]
    pub avatar_url: Option<String>,
}

impl From<UpdateUserInput> for ProfileUpdate {
    fn from(input: UpdateUserInput) -> Self {
        Self {
            username: input.username,
            bio: input.bio,
            avatar_url: input.avatar_url,
        }
    }
}
