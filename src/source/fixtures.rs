use async_graphql::Json;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::db::models::{
    CommentView, LikeView, PostCounts, PostDetail, PostType, PostView, UserCounts, UserProfile,
};
use crate::db::pagination::{Page, PageRequest};
use crate::error::{AppError, AppResult};
use crate::social::metadata::PostMetadata;
use crate::source::FeedSource;

const DEMO_DATA: &str = include_str!("demo.json");

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DemoData {
    users: Vec<DemoUser>,
    posts: Vec<DemoPost>,
    comments: Vec<DemoComment>,
    follows: Vec<(String, String)>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DemoUser {
    id: String,
    username: String,
    bio: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DemoPost {
    id: String,
    user_id: String,
    #[serde(rename = "type")]
    post_type: PostType,
    caption: String,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    liked_by: Vec<String>,
    metadata: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DemoComment {
    id: String,
    user_id: String,
    post_id: String,
    content: String,
    created_at: DateTime<Utc>,
}

/// Static sample data served in demo mode. Views are assembled once with
/// counts derived from the sample relations, exactly as the database would
/// derive them.
pub struct FixtureFeedSource {
    users: Vec<UserProfile>,
    /// Newest first
    posts: Vec<PostDetail>,
}

impl FixtureFeedSource {
    pub fn load() -> AppResult<Self> {
        let data: DemoData = serde_json::from_str(DEMO_DATA)?;
        Self::from_data(data)
    }

    fn from_data(data: DemoData) -> AppResult<Self> {
        let users: Vec<UserProfile> = data
            .users
            .iter()
            .map(|u| UserProfile {
                id: u.id.clone(),
                external_id: format!("demo-{}", u.id),
                username: u.username.clone(),
                bio: u.bio.clone(),
                avatar_url: u.avatar_url.clone(),
                created_at: u.created_at,
                counts: UserCounts {
                    posts: data.posts.iter().filter(|p| p.user_id == u.id).count() as i64,
                    followers: data.follows.iter().filter(|(_, to)| *to == u.id).count() as i64,
                    following: data.follows.iter().filter(|(from, _)| *from == u.id).count() as i64,
                },
                is_following: false,
            })
            .collect();

        let summary = |id: &str| -> AppResult<_> {
            users
                .iter()
                .find(|u| u.id == id)
                .map(UserProfile::summary)
                .ok_or_else(|| AppError::Internal(format!("demo data references unknown user {}", id)))
        };

        let mut posts = Vec::with_capacity(data.posts.len());
        for post in data.posts {
            let metadata = post
                .metadata
                .map(|value| PostMetadata::parse(post.post_type, value))
                .transpose()?;

            let mut comments = Vec::new();
            for c in data.comments.iter().filter(|c| c.post_id == post.id) {
                comments.push(CommentView {
                    id: c.id.clone(),
                    user_id: c.user_id.clone(),
                    post_id: c.post_id.clone(),
                    content: c.content.clone(),
                    created_at: c.created_at,
                    user: summary(&c.user_id)?,
                });
            }
            comments.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

            let mut likes = Vec::new();
            for user_id in &post.liked_by {
                likes.push(LikeView {
                    id: format!("like-{}-{}", post.id, user_id),
                    user_id: user_id.clone(),
                    post_id: post.id.clone(),
                    created_at: post.created_at,
                    user: summary(user_id)?,
                });
            }

            posts.push(PostDetail {
                post: PostView {
                    id: post.id.clone(),
                    user_id: post.user_id.clone(),
                    post_type: post.post_type,
                    caption: post.caption,
                    image_url: post.image_url,
                    metadata: metadata.map(Json),
                    created_at: post.created_at,
                    user: summary(&post.user_id)?,
                    counts: PostCounts {
                        likes: likes.len() as i64,
                        comments: comments.len() as i64,
                        saves: 0,
                    },
                    is_liked: false,
                    is_saved: false,
                },
                likes,
                comments,
            });
        }
        posts.sort_by(|a, b| {
            (b.post.created_at, &b.post.id).cmp(&(a.post.created_at, &a.post.id))
        });

        Ok(Self { users, posts })
    }

    /// Pages `posts` (already newest first) after the cursor position. Any
    /// sample post is a valid cursor, even one the filter excludes.
    fn page_of<'a>(
        &self,
        posts: impl Iterator<Item = &'a PostView>,
        page: &PageRequest,
    ) -> AppResult<Page<PostView>> {
        let after = match &page.cursor {
            None => None,
            Some(cursor) => {
                let at = self
                    .posts
                    .iter()
                    .map(|d| &d.post)
                    .find(|p| &p.id == cursor)
                    .ok_or_else(|| AppError::BadRequest("Invalid cursor".into()))?;
                Some((at.created_at, at.id.as_str()))
            }
        };
        let rows: Vec<PostView> = posts
            .filter(|p| after.map_or(true, |key| (p.created_at, p.id.as_str()) < key))
            .take(page.limit as usize + 1)
            .cloned()
            .collect();
        Ok(Page::from_overfetch(rows, page.limit, |p| p.id.clone()))
    }
}

#[async_trait]
impl FeedSource for FixtureFeedSource {
    async fn feed(
        &self,
        _viewer: Option<&str>,
        post_type: Option<PostType>,
        page: &PageRequest,
    ) -> AppResult<Page<PostView>> {
        let posts = self
            .posts
            .iter()
            .map(|d| &d.post)
            .filter(|p| post_type.map_or(true, |t| p.post_type == t));
        self.page_of(posts, page)
    }

    async fn post_by_id(&self, _viewer: Option<&str>, id: &str) -> AppResult<Option<PostDetail>> {
        Ok(self.posts.iter().find(|d| d.post.id == id).cloned())
    }

    async fn posts_by_user(
        &self,
        _viewer: Option<&str>,
        user_id: &str,
        page: &PageRequest,
    ) -> AppResult<Page<PostView>> {
        let posts = self
            .posts
            .iter()
            .map(|d| &d.post)
            .filter(|p| p.user_id == user_id);
        self.page_of(posts, page)
    }

    /// The sample posts are frozen in time, so the recency window does not
    /// apply here.
    async fn trending(&self, _viewer: Option<&str>, limit: u32) -> AppResult<Vec<PostView>> {
        let mut posts: Vec<PostView> = self.posts.iter().map(|d| d.post.clone()).collect();
        posts.sort_by(|a, b| b.counts.likes.cmp(&a.counts.likes));
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn user_by_id(&self, _viewer: Option<&str>, id: &str) -> AppResult<Option<UserProfile>> {
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_username(
        &self,
        _viewer: Option<&str>,
        username: &str,
    ) -> AppResult<Option<UserProfile>> {
        Ok(self.users.iter().find(|u| u.username == username).cloned())
    }

    async fn search_users(
        &self,
        _viewer: Option<&str>,
        query: &str,
        limit: u32,
    ) -> AppResult<Vec<UserProfile>> {
        let needle = query.to_lowercase();
        let mut found: Vec<UserProfile> = self
            .users
            .iter()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            (a.username.to_lowercase(), &a.username).cmp(&(b.username.to_lowercase(), &b.username))
        });
        found.truncate(limit as usize);
        Ok(found)
    }
}
