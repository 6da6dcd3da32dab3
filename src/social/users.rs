use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::db::models::{UserCounts, UserProfile};
use crate::db::{conflict_on_constraint, new_id, now, parse_timestamp};
use crate::error::{AppError, AppResult};

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const MAX_BIO_LEN: usize = 500;

/// Select list for a profile with derived counts and whether `:viewer`
/// follows it.
pub(crate) const PROFILE_COLUMNS: &str = "u.id, u.external_id, u.username, u.bio, u.avatar_url, u.created_at, \
     (SELECT COUNT(*) FROM posts x WHERE x.user_id = u.id), \
     (SELECT COUNT(*) FROM follows x WHERE x.following_id = u.id), \
     (SELECT COUNT(*) FROM follows x WHERE x.follower_id = u.id), \
     EXISTS(SELECT 1 FROM follows x WHERE x.follower_id = :viewer AND x.following_id = u.id)";

pub(crate) fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    let created_at: String = row.get(5)?;
    Ok(UserProfile {
        id: row.get(0)?,
        external_id: row.get(1)?,
        username: row.get(2)?,
        bio: row.get(3)?,
        avatar_url: row.get(4)?,
        created_at: parse_timestamp(&created_at)?,
        counts: UserCounts {
            posts: row.get(6)?,
            followers: row.get(7)?,
            following: row.get(8)?,
        },
        is_following: row.get(9)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_id: String,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

pub fn is_valid_username(username: &str) -> bool {
    (USERNAME_MIN..=USERNAME_MAX).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_username(username: &str) -> AppResult<()> {
    if is_valid_username(username) {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Username must be 3-30 characters of letters, numbers, and underscores".into(),
        ))
    }
}

fn check_bio(bio: Option<&str>) -> AppResult<()> {
    match bio {
        Some(bio) if bio.chars().count() > MAX_BIO_LEN => Err(AppError::BadRequest(format!(
            "bio must be at most {} characters",
            MAX_BIO_LEN
        ))),
        _ => Ok(()),
    }
}

fn find_by(
    conn: &Connection,
    column: &str,
    viewer: Option<&str>,
    value: &str,
) -> AppResult<Option<UserProfile>> {
    let sql = format!(
        "SELECT {} FROM users u WHERE u.{} = :value",
        PROFILE_COLUMNS, column
    );
    let profile = conn
        .query_row(
            &sql,
            named_params! { ":viewer": viewer, ":value": value },
            profile_from_row,
        )
        .optional()?;
    Ok(profile)
}

pub fn by_id(conn: &Connection, viewer: Option<&str>, id: &str) -> AppResult<Option<UserProfile>> {
    find_by(conn, "id", viewer, id)
}

pub fn by_username(
    conn: &Connection,
    viewer: Option<&str>,
    username: &str,
) -> AppResult<Option<UserProfile>> {
    find_by(conn, "username", viewer, username)
}

pub fn by_external_id(
    conn: &Connection,
    viewer: Option<&str>,
    external_id: &str,
) -> AppResult<Option<UserProfile>> {
    find_by(conn, "external_id", viewer, external_id)
}

fn require(conn: &Connection, id: &str) -> AppResult<UserProfile> {
    by_id(conn, Some(id), id)?.ok_or_else(|| AppError::NotFound("User".into()))
}

pub fn create(conn: &Connection, input: NewUser) -> AppResult<UserProfile> {
    check_username(&input.username)?;
    check_bio(input.bio.as_deref())?;

    let id = new_id();
    conn.execute(
        "INSERT INTO users (id, external_id, username, bio, avatar_url, created_at)
         VALUES (:id, :external_id, :username, :bio, :avatar_url, :created_at)",
        named_params! {
            ":id": id,
            ":external_id": input.external_id,
            ":username": input.username,
            ":bio": input.bio,
            ":avatar_url": input.avatar_url,
            ":created_at": now(),
        },
    )
    .map_err(|e| conflict_on_constraint(e, "Username or account already exists"))?;

    tracing::info!("Created profile {} ({})", input.username, id);
    require(conn, &id)
}

/// Applies the fields present in `update` to the caller's own profile.
pub fn update(conn: &Connection, user_id: &str, update: ProfileUpdate) -> AppResult<UserProfile> {
    if let Some(username) = &update.username {
        check_username(username)?;
    }
    check_bio(update.bio.as_deref())?;

    let changed = conn
        .execute(
            "UPDATE users SET
                username = COALESCE(:username, username),
                bio = COALESCE(:bio, bio),
                avatar_url = COALESCE(:avatar_url, avatar_url)
             WHERE id = :id",
            named_params! {
                ":username": update.username,
                ":bio": update.bio,
                ":avatar_url": update.avatar_url,
                ":id": user_id,
            },
        )
        .map_err(|e| conflict_on_constraint(e, "Username is already taken"))?;

    if changed == 0 {
        return Err(AppError::NotFound("User".into()));
    }
    require(conn, user_id)
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive substring match on usernames, alphabetical.
pub fn search(
    conn: &Connection,
    viewer: Option<&str>,
    query: &str,
    limit: u32,
) -> AppResult<Vec<UserProfile>> {
    let pattern = format!("%{}%", escape_like(query));
    let sql = format!(
        "SELECT {} FROM users u WHERE u.username LIKE :pattern ESCAPE '\\' \
         ORDER BY u.username COLLATE NOCASE, u.username LIMIT :limit",
        PROFILE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(
            named_params! { ":viewer": viewer, ":pattern": pattern, ":limit": limit },
            profile_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}
