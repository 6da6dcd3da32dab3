use rusqlite::{named_params, params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::db::models::{CommentView, NotificationType};
use crate::db::pagination::{paginate, Keyset, Order, Page, PageRequest};
use crate::db::{new_id, now, parse_timestamp};
use crate::error::{AppError, AppResult};
use crate::social::notifications::notify;
use crate::social::summary_at;
use crate::social::users::{USERNAME_MAX, USERNAME_MIN};

pub const MAX_COMMENT_LEN: usize = 1000;

const COMMENT_COLUMNS: &str =
    "c.id, c.user_id, c.post_id, c.content, c.created_at, u.id, u.username, u.avatar_url";
const COMMENT_JOINS: &str = "JOIN users u ON u.id = c.user_id";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentView> {
    let created_at: String = row.get(4)?;
    Ok(CommentView {
        id: row.get(0)?,
        user_id: row.get(1)?,
        post_id: row.get(2)?,
        content: row.get(3)?,
        created_at: parse_timestamp(&created_at)?,
        user: summary_at(row, 5)?,
    })
}

/// A post's comments in conversation order (oldest first).
pub fn by_post(conn: &Connection, post_id: &str, page: &PageRequest) -> AppResult<Page<CommentView>> {
    let keyset = Keyset {
        table: "comments",
        alias: "c",
        columns: COMMENT_COLUMNS,
        joins: COMMENT_JOINS,
        filter: Some("c.post_id = :post_id"),
        order: Order::OldestFirst,
    };
    paginate(
        conn,
        &keyset,
        named_params! { ":post_id": post_id },
        page,
        comment_from_row,
    )
}

/// Every comment on a post, oldest first.
pub fn all_for_post(conn: &Connection, post_id: &str) -> AppResult<Vec<CommentView>> {
    let sql = format!(
        "SELECT {} FROM comments c {} WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC",
        COMMENT_COLUMNS, COMMENT_JOINS
    );
    let mut stmt = conn.prepare(&sql)?;
    let comments = stmt
        .query_map([post_id], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

/// Distinct `@username` mentions in `content`, in order of appearance.
/// A mention must start the text or follow a non-word character, so email
/// addresses do not count.
pub fn mentions(content: &str) -> Vec<String> {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let chars: Vec<char> = content.chars().collect();
    let mut found: Vec<String> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let starts_mention = chars[i] == '@' && (i == 0 || !is_word(chars[i - 1]));
        if !starts_mention {
            i += 1;
            continue;
        }
        let name: String = chars[i + 1..].iter().take_while(|c| is_word(**c)).collect();
        i += 1 + name.len();
        if (USERNAME_MIN..=USERNAME_MAX).contains(&name.len()) && !found.contains(&name) {
            found.push(name);
        }
    }
    found
}

/// Adds a comment and, in the same transaction, notifies the post owner and
/// every mentioned user.
pub fn create(conn: &mut Connection, user_id: &str, post_id: &str, content: &str) -> AppResult<CommentView> {
    let length = content.chars().count();
    if content.trim().is_empty() || length > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "content must be between 1 and {} characters",
            MAX_COMMENT_LEN
        )));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let owner: String = tx
        .query_row("SELECT user_id FROM posts WHERE id = ?1", [post_id], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or_else(|| AppError::NotFound("Post".into()))?;

    let id = new_id();
    tx.execute(
        "INSERT INTO comments (id, user_id, post_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user_id, post_id, content, now()],
    )?;

    notify(&tx, &owner, Some(user_id), NotificationType::Comment, post_id)?;
    for username in mentions(content) {
        let mentioned: Option<String> = tx
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                [&username],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(mentioned) = mentioned {
            notify(&tx, &mentioned, Some(user_id), NotificationType::Mention, post_id)?;
        }
    }

    let sql = format!(
        "SELECT {} FROM comments c {} WHERE c.id = ?1",
        COMMENT_COLUMNS, COMMENT_JOINS
    );
    let comment = tx.query_row(&sql, [&id], comment_from_row)?;
    tx.commit()?;
    Ok(comment)
}

/// Deletes a comment written by `user_id`.
pub fn delete(conn: &Connection, user_id: &str, id: &str) -> AppResult<()> {
    let author: Option<String> = conn
        .query_row("SELECT user_id FROM comments WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?;

    match author {
        None => Err(AppError::NotFound("Comment".into())),
        Some(author) if author != user_id => Err(AppError::Forbidden(
            "You can only delete your own comments".into(),
        )),
        Some(_) => {
            conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(())
        }
    }
}
