//! Single-use invite codes.

use rand::Rng;
use rusqlite::{named_params, params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::models::{InviteConsumer, InviteView};
use crate::db::pagination::{paginate, Keyset, Order, Page, PageRequest};
use crate::db::{conflict_on_constraint, new_id, now, parse_timestamp};
use crate::error::{AppError, AppResult};

/// Uppercase letters and digits without the look-alikes I, O, 0 and 1.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 8;
const MAX_ATTEMPTS: usize = 5;

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

fn code_exists(conn: &Connection, code: &str) -> AppResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM invites WHERE code = ?1)",
        [code],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Issues a fresh code owned by `user_id`. After the retry budget is spent
/// the last candidate is inserted anyway and a collision surfaces as a
/// conflict from the unique index.
pub fn create(conn: &Connection, user_id: &str) -> AppResult<String> {
    let mut code = generate_code();
    for _ in 0..MAX_ATTEMPTS {
        if !code_exists(conn, &code)? {
            break;
        }
        code = generate_code();
    }

    conn.execute(
        "INSERT INTO invites (id, code, invited_by_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![new_id(), code, user_id, now()],
    )
    .map_err(|e| conflict_on_constraint(e, "Could not allocate an invite code, try again"))?;

    tracing::info!("User {} generated invite {}", user_id, code);
    Ok(code)
}

/// Claims `code` for `user_id`. The conditional update lets exactly one
/// concurrent caller win.
pub fn redeem(conn: &Connection, user_id: &str, code: &str) -> AppResult<()> {
    let code = normalize(code);
    let claimed = conn.execute(
        "UPDATE invites SET used_by_id = ?1, used_at = ?2 WHERE code = ?3 AND used_at IS NULL",
        params![user_id, now(), code],
    )?;
    if claimed == 0 {
        return Err(AppError::BadRequest("Invalid or already-used invite".into()));
    }
    tracing::info!("User {} redeemed invite {}", user_id, code);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InviteCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InviteCheck {
    fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn invalid(reason: &str) -> Self {
        Self {
            valid: false,
            error: Some(reason.to_string()),
        }
    }
}

pub fn validate(conn: &Connection, code: &str) -> AppResult<InviteCheck> {
    let used_at: Option<Option<String>> = conn
        .query_row(
            "SELECT used_at FROM invites WHERE code = ?1",
            [normalize(code)],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match used_at {
        None => InviteCheck::invalid("Invalid invite code."),
        Some(Some(_)) => InviteCheck::invalid("This invite has already been used."),
        Some(None) => InviteCheck::valid(),
    })
}

fn invite_from_row(row: &Row<'_>) -> rusqlite::Result<InviteView> {
    let created_at: String = row.get(1)?;
    let used_at: Option<String> = row.get(2)?;
    let used_by: Option<String> = row.get(3)?;
    Ok(InviteView {
        code: row.get(0)?,
        created_at: parse_timestamp(&created_at)?,
        used_at: used_at.as_deref().map(parse_timestamp).transpose()?,
        used_by: used_by.map(|username| InviteConsumer { username }),
    })
}

/// Codes issued by `user_id`, newest first.
pub fn list(conn: &Connection, user_id: &str, page: &PageRequest) -> AppResult<Page<InviteView>> {
    let keyset = Keyset {
        table: "invites",
        alias: "i",
        columns: "i.code, i.created_at, i.used_at, u.username",
        joins: "LEFT JOIN users u ON u.id = i.used_by_id",
        filter: Some("i.invited_by_id = :user_id"),
        order: Order::NewestFirst,
    };
    paginate(
        conn,
        &keyset,
        named_params! { ":user_id": user_id },
        page,
        invite_from_row,
    )
}
