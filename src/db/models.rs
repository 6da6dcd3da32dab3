use std::fmt;
use std::str::FromStr;

use async_graphql::{Enum, Json, SimpleObject};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::social::metadata::PostMetadata;

/// Discriminates what a post is about; selects the metadata variant.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Enum, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
#[graphql(rename_items = "lowercase")]
pub enum PostType {
    Workout,
    Meal,
    Quote,
    Story,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Workout => "workout",
            PostType::Meal => "meal",
            PostType::Quote => "quote",
            PostType::Story => "story",
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workout" => Ok(PostType::Workout),
            "meal" => Ok(PostType::Meal),
            "quote" => Ok(PostType::Quote),
            "story" => Ok(PostType::Story),
            other => Err(format!("unknown post type '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Enum, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
#[graphql(rename_items = "lowercase")]
pub enum NotificationType {
    Follow,
    Like,
    Comment,
    Mention,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Follow => "follow",
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
            NotificationType::Mention => "mention",
        }
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow" => Ok(NotificationType::Follow),
            "like" => Ok(NotificationType::Like),
            "comment" => Ok(NotificationType::Comment),
            "mention" => Ok(NotificationType::Mention),
            other => Err(format!("unknown notification type '{}'", other)),
        }
    }
}

macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum_sql!(PostType);
text_enum_sql!(NotificationType);

/// Minimal author info embedded in comments, likes and notifications.
#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, SimpleObject)]
pub struct UserCounts {
    pub posts: i64,
    pub followers: i64,
    pub following: i64,
}

/// A user profile with derived counts.
#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    /// Subject id issued by the auth provider
    pub external_id: String,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub counts: UserCounts,
    /// Whether the calling user follows this profile
    pub is_following: bool,
}

impl UserProfile {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, SimpleObject)]
pub struct PostCounts {
    pub likes: i64,
    pub comments: i64,
    pub saves: i64,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct PostView {
    pub id: String,
    pub user_id: String,
    #[graphql(name = "type")]
    pub post_type: PostType,
    pub caption: String,
    pub image_url: Option<String>,
    pub metadata: Option<Json<PostMetadata>>,
    pub created_at: DateTime<Utc>,
    pub user: UserSummary,
    pub counts: PostCounts,
    pub is_liked: bool,
    pub is_saved: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user: UserSummary,
}

#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct LikeView {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
    pub user: UserSummary,
}

/// A post together with everyone who liked it and its conversation.
#[derive(Clone, Debug, SimpleObject)]
pub struct PostDetail {
    pub post: PostView,
    pub likes: Vec<LikeView>,
    pub comments: Vec<CommentView>,
}

#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    /// Recipient
    pub user_id: String,
    pub actor: Option<UserSummary>,
    #[graphql(name = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Post id for like/comment/mention, follower id for follow
    pub reference_id: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InviteConsumer {
    pub username: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteView {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by: Option<InviteConsumer>,
}
