//! Lazily creates a profile row the first time an authenticated subject
//! shows up.

use rusqlite::{named_params, Connection};

use crate::auth::token::Identity;
use crate::db::models::UserProfile;
use crate::db::{is_constraint_violation, new_id, now};
use crate::error::{AppError, AppResult};
use crate::social::users::{self, USERNAME_MAX, USERNAME_MIN};

/// Keeps `[A-Za-z0-9_]`, trims to the maximum and pads short names with
/// underscores. `None` when nothing usable is left.
fn sanitize(raw: &str) -> Option<String> {
    let mut name: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(USERNAME_MAX)
        .collect();
    if name.is_empty() {
        return None;
    }
    while name.len() < USERNAME_MIN {
        name.push('_');
    }
    Some(name)
}

pub fn fallback_username(subject: &str) -> String {
    let prefix: String = subject.chars().take(8).collect();
    sanitize(&format!("user_{}", prefix)).unwrap_or_else(|| "user_".to_string())
}

/// Username hint, else the local part of the email, else `user_<sub8>`.
pub fn derive_username(identity: &Identity) -> String {
    identity
        .username_hint
        .as_deref()
        .and_then(sanitize)
        .or_else(|| {
            identity
                .email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .and_then(sanitize)
        })
        .unwrap_or_else(|| fallback_username(&identity.subject))
}

/// Returns the profile for `identity`, creating it on first sight.
///
/// The insert ignores a row that already exists for the subject and the
/// profile is re-read afterwards, so two racing first requests converge on
/// one row. If the derived username belongs to someone else the fallback
/// names are tried in turn.
pub fn ensure_profile(conn: &Connection, identity: &Identity) -> AppResult<UserProfile> {
    if let Some(profile) = users::by_external_id(conn, None, &identity.subject)? {
        return Ok(profile);
    }

    let mut candidates = vec![derive_username(identity), fallback_username(&identity.subject)];
    if let Some(full) = sanitize(&format!("user_{}", identity.subject)) {
        candidates.push(full);
    }
    candidates.dedup();

    for username in &candidates {
        let result = conn.execute(
            "INSERT INTO users (id, external_id, username, created_at)
             VALUES (:id, :external_id, :username, :created_at)
             ON CONFLICT(external_id) DO NOTHING",
            named_params! {
                ":id": new_id(),
                ":external_id": identity.subject,
                ":username": username,
                ":created_at": now(),
            },
        );
        match result {
            Ok(inserted) => {
                if inserted > 0 {
                    tracing::info!("Provisioned profile {} for {}", username, identity.subject);
                }
                break;
            }
            Err(e) if is_constraint_violation(&e) => {
                tracing::warn!("Username {} is taken, trying the next candidate", username);
            }
            Err(e) => return Err(e.into()),
        }
    }

    users::by_external_id(conn, None, &identity.subject)?
        .ok_or_else(|| AppError::Conflict("Could not allocate a username".into()))
}
