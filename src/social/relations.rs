//! Pairwise relations between a user and a post or another user.

use rusqlite::{named_params, params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::db::models::{LikeView, NotificationType, PostView, UserProfile};
use crate::db::pagination::{paginate, Keyset, Order, Page, PageRequest};
use crate::db::{new_id, now, parse_timestamp};
use crate::error::{AppError, AppResult};
use crate::social::notifications::notify;
use crate::social::posts::{post_from_row, POST_COLUMNS, POST_JOINS};
use crate::social::users::{profile_from_row, PROFILE_COLUMNS};
use crate::social::summary_at;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Like,
    Save,
    Follow,
}

impl Relation {
    fn table(self) -> &'static str {
        match self {
            Relation::Like => "likes",
            Relation::Save => "saves",
            Relation::Follow => "follows",
        }
    }

    /// (actor column, target column)
    fn columns(self) -> (&'static str, &'static str) {
        match self {
            Relation::Like | Relation::Save => ("user_id", "post_id"),
            Relation::Follow => ("follower_id", "following_id"),
        }
    }

    /// Query yielding the user who owns the target.
    fn owner_sql(self) -> &'static str {
        match self {
            Relation::Like | Relation::Save => "SELECT user_id FROM posts WHERE id = ?1",
            Relation::Follow => "SELECT id FROM users WHERE id = ?1",
        }
    }

    fn target_label(self) -> &'static str {
        match self {
            Relation::Like | Relation::Save => "Post",
            Relation::Follow => "User",
        }
    }
}

/// Flips the relation between `actor` and `target` and returns whether it is
/// now active. Runs in one transaction; activating a like or follow
/// notifies the owner of the target.
pub fn toggle(conn: &mut Connection, relation: Relation, actor: &str, target: &str) -> AppResult<bool> {
    if relation == Relation::Follow && actor == target {
        return Err(AppError::BadRequest("You cannot follow yourself".into()));
    }

    // Take the write lock up front so contending writers wait on busy_timeout
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let owner: String = tx
        .query_row(relation.owner_sql(), [target], |row| row.get(0))
        .optional()?
        .ok_or_else(|| AppError::NotFound(relation.target_label().into()))?;

    let table = relation.table();
    let (actor_col, target_col) = relation.columns();
    let removed = tx.execute(
        &format!(
            "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
            table, actor_col, target_col
        ),
        params![actor, target],
    )?;

    let active = if removed > 0 {
        false
    } else {
        tx.execute(
            &format!(
                "INSERT INTO {} (id, {}, {}, created_at) VALUES (?1, ?2, ?3, ?4)",
                table, actor_col, target_col
            ),
            params![new_id(), actor, target, now()],
        )?;
        match relation {
            Relation::Like => notify(&tx, &owner, Some(actor), NotificationType::Like, target)?,
            Relation::Follow => notify(&tx, target, Some(actor), NotificationType::Follow, actor)?,
            Relation::Save => {}
        }
        true
    };

    tx.commit()?;
    Ok(active)
}

pub fn is_following(conn: &Connection, follower_id: &str, following_id: &str) -> AppResult<bool> {
    let following = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ?1 AND following_id = ?2)",
        params![follower_id, following_id],
        |row| row.get(0),
    )?;
    Ok(following)
}

fn like_from_row(row: &Row<'_>) -> rusqlite::Result<LikeView> {
    let created_at: String = row.get(3)?;
    Ok(LikeView {
        id: row.get(0)?,
        user_id: row.get(1)?,
        post_id: row.get(2)?,
        created_at: parse_timestamp(&created_at)?,
        user: summary_at(row, 4)?,
    })
}

/// Everyone who liked a post, most recent first.
pub fn likes_by_post(conn: &Connection, post_id: &str) -> AppResult<Vec<LikeView>> {
    let mut stmt = conn.prepare(
        "SELECT l.id, l.user_id, l.post_id, l.created_at, u.id, u.username, u.avatar_url
         FROM likes l JOIN users u ON u.id = l.user_id
         WHERE l.post_id = ?1
         ORDER BY l.created_at DESC, l.id DESC",
    )?;
    let likes = stmt
        .query_map([post_id], like_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(likes)
}

/// Posts a user saved, most recently saved first.
pub fn saves_by_user(conn: &Connection, viewer: Option<&str>, user_id: &str) -> AppResult<Vec<PostView>> {
    let sql = format!(
        "SELECT {} FROM saves sv JOIN posts p ON p.id = sv.post_id {} \
         WHERE sv.user_id = :user_id ORDER BY sv.created_at DESC, sv.id DESC",
        POST_COLUMNS, POST_JOINS
    );
    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(
            named_params! { ":viewer": viewer, ":user_id": user_id },
            post_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

fn follow_page(
    conn: &Connection,
    viewer: Option<&str>,
    user_id: &str,
    joins: &str,
    filter: &str,
    page: &PageRequest,
) -> AppResult<Page<UserProfile>> {
    let keyset = Keyset {
        table: "follows",
        alias: "f",
        columns: PROFILE_COLUMNS,
        joins,
        filter: Some(filter),
        order: Order::NewestFirst,
    };
    paginate(
        conn,
        &keyset,
        named_params! { ":viewer": viewer, ":user_id": user_id },
        page,
        profile_from_row,
    )
}

/// Users following `user_id`, most recent follow first. Cursors are follow ids.
pub fn followers(
    conn: &Connection,
    viewer: Option<&str>,
    user_id: &str,
    page: &PageRequest,
) -> AppResult<Page<UserProfile>> {
    follow_page(
        conn,
        viewer,
        user_id,
        "JOIN users u ON u.id = f.follower_id",
        "f.following_id = :user_id",
        page,
    )
}

/// Users `user_id` follows, most recent follow first. Cursors are follow ids.
pub fn following(
    conn: &Connection,
    viewer: Option<&str>,
    user_id: &str,
    page: &PageRequest,
) -> AppResult<Page<UserProfile>> {
    follow_page(
        conn,
        viewer,
        user_id,
        "JOIN users u ON u.id = f.following_id",
        "f.follower_id = :user_id",
        page,
    )
}
