use async_graphql::Json;
use chrono::{Duration, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::db::models::{PostCounts, PostDetail, PostType, PostView};
use crate::db::pagination::{paginate, Keyset, Order, Page, PageRequest};
use crate::db::{new_id, now, parse_timestamp, timestamp};
use crate::error::{AppError, AppResult};
use crate::social::metadata::PostMetadata;
use crate::social::{comments, relations, summary_at};

pub const MAX_CAPTION_LEN: usize = 2000;
const TRENDING_WINDOW_DAYS: i64 = 7;

/// Select list for a post with its author, derived counts and the flags
/// relative to `:viewer` (NULL for anonymous callers).
pub(crate) const POST_COLUMNS: &str = "p.id, p.type, p.caption, p.image_url, p.metadata, p.created_at, \
     u.id, u.username, u.avatar_url, \
     (SELECT COUNT(*) FROM likes x WHERE x.post_id = p.id), \
     (SELECT COUNT(*) FROM comments x WHERE x.post_id = p.id), \
     (SELECT COUNT(*) FROM saves x WHERE x.post_id = p.id), \
     EXISTS(SELECT 1 FROM likes x WHERE x.post_id = p.id AND x.user_id = :viewer), \
     EXISTS(SELECT 1 FROM saves x WHERE x.post_id = p.id AND x.user_id = :viewer)";

pub(crate) const POST_JOINS: &str = "JOIN users u ON u.id = p.user_id";

pub(crate) fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    let post_type: PostType = row.get(1)?;
    let metadata: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;
    let user = summary_at(row, 6)?;
    Ok(PostView {
        id: row.get(0)?,
        user_id: user.id.clone(),
        post_type,
        caption: row.get(2)?,
        image_url: row.get(3)?,
        metadata: metadata
            .as_deref()
            .and_then(|raw| PostMetadata::from_stored(post_type, raw))
            .map(Json),
        created_at: parse_timestamp(&created_at)?,
        user,
        counts: PostCounts {
            likes: row.get(9)?,
            comments: row.get(10)?,
            saves: row.get(11)?,
        },
        is_liked: row.get(12)?,
        is_saved: row.get(13)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub post_type: PostType,
    pub caption: String,
    pub image_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Global feed, newest first, optionally restricted to one post type.
pub fn feed(
    conn: &Connection,
    viewer: Option<&str>,
    post_type: Option<PostType>,
    page: &PageRequest,
) -> AppResult<Page<PostView>> {
    let keyset = Keyset {
        table: "posts",
        alias: "p",
        columns: POST_COLUMNS,
        joins: POST_JOINS,
        filter: Some(":post_type IS NULL OR p.type = :post_type"),
        order: Order::NewestFirst,
    };
    paginate(
        conn,
        &keyset,
        named_params! { ":viewer": viewer, ":post_type": post_type },
        page,
        post_from_row,
    )
}

pub fn by_user(
    conn: &Connection,
    viewer: Option<&str>,
    user_id: &str,
    page: &PageRequest,
) -> AppResult<Page<PostView>> {
    let keyset = Keyset {
        table: "posts",
        alias: "p",
        columns: POST_COLUMNS,
        joins: POST_JOINS,
        filter: Some("p.user_id = :user_id"),
        order: Order::NewestFirst,
    };
    paginate(
        conn,
        &keyset,
        named_params! { ":viewer": viewer, ":user_id": user_id },
        page,
        post_from_row,
    )
}

pub fn find(conn: &Connection, viewer: Option<&str>, id: &str) -> AppResult<Option<PostView>> {
    let sql = format!(
        "SELECT {} FROM posts p {} WHERE p.id = :id",
        POST_COLUMNS, POST_JOINS
    );
    let post = conn
        .query_row(
            &sql,
            named_params! { ":viewer": viewer, ":id": id },
            post_from_row,
        )
        .optional()?;
    Ok(post)
}

/// A post with its likes (newest first) and its whole conversation (oldest
/// first). `None` when the post does not exist.
pub fn by_id(conn: &Connection, viewer: Option<&str>, id: &str) -> AppResult<Option<PostDetail>> {
    let Some(post) = find(conn, viewer, id)? else {
        return Ok(None);
    };
    let likes = relations::likes_by_post(conn, id)?;
    let comments = comments::all_for_post(conn, id)?;
    Ok(Some(PostDetail {
        post,
        likes,
        comments,
    }))
}

pub fn create(conn: &Connection, user_id: &str, input: NewPost) -> AppResult<PostView> {
    let caption_len = input.caption.chars().count();
    if input.caption.trim().is_empty() || caption_len > MAX_CAPTION_LEN {
        return Err(AppError::BadRequest(format!(
            "caption must be between 1 and {} characters",
            MAX_CAPTION_LEN
        )));
    }

    let metadata = input
        .metadata
        .map(|value| PostMetadata::parse(input.post_type, value))
        .transpose()?
        .map(|m| serde_json::to_string(&m))
        .transpose()?;

    let id = new_id();
    conn.execute(
        "INSERT INTO posts (id, user_id, type, caption, image_url, metadata, created_at)
         VALUES (:id, :user_id, :type, :caption, :image_url, :metadata, :created_at)",
        named_params! {
            ":id": id,
            ":user_id": user_id,
            ":type": input.post_type,
            ":caption": input.caption,
            ":image_url": input.image_url,
            ":metadata": metadata,
            ":created_at": now(),
        },
    )?;

    tracing::info!("User {} created {} post {}", user_id, input.post_type, id);

    find(conn, Some(user_id), &id)?
        .ok_or_else(|| AppError::Internal(format!("post {} vanished after insert", id)))
}

/// Deletes a post owned by `user_id`. Likes, saves and comments go with it.
pub fn delete(conn: &Connection, user_id: &str, id: &str) -> AppResult<()> {
    let owner: Option<String> = conn
        .query_row(
            "SELECT user_id FROM posts WHERE id = ?1",
            [id],
            |row| row.get(0),
        )
        .optional()?;

    match owner {
        None => Err(AppError::NotFound("Post".into())),
        Some(owner) if owner != user_id => Err(AppError::Forbidden(
            "You can only delete your own posts".into(),
        )),
        Some(_) => {
            conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(())
        }
    }
}

/// Posts from the last seven days, most liked first.
pub fn trending(conn: &Connection, viewer: Option<&str>, limit: u32) -> AppResult<Vec<PostView>> {
    let since = timestamp(Utc::now() - Duration::days(TRENDING_WINDOW_DAYS));
    let sql = format!(
        "SELECT {} FROM posts p {} WHERE p.created_at >= :since \
         ORDER BY 10 DESC, p.created_at DESC, p.id DESC LIMIT :limit",
        POST_COLUMNS, POST_JOINS
    );
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(
            named_params! { ":viewer": viewer, ":since": since, ":limit": limit },
            post_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}
