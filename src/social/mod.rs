//! Storage-backed operations of the social graph: posts, profiles,
//! relations, comments, notifications and invites.
//!
//! Every function takes a borrowed connection so callers decide whether it
//! runs on its own or inside a larger transaction.

pub mod comments;
pub mod invites;
pub mod metadata;
pub mod notifications;
pub mod posts;
pub mod relations;
pub mod users;

use crate::db::models::UserSummary;
use rusqlite::Row;

/// Reads an embedded author from three consecutive columns: id, username,
/// avatar url.
pub(crate) fn summary_at(row: &Row<'_>, start: usize) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: row.get(start)?,
        username: row.get(start + 1)?,
        avatar_url: row.get(start + 2)?,
    })
}
