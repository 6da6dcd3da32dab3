pub mod models;
pub mod pagination;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::error::AppError;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_notifications",
        include_str!("../../migrations/002_notifications.sql"),
    ),
    ("003_invites", include_str!("../../migrations/003_invites.sql")),
];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

/// Single-connection in-memory pool. Every connection of a memory manager is
/// a separate database, so the pool must never grow past one.
pub fn create_memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Fixed-width UTC timestamp. Every row is stamped with this format so that
/// ordering by the text column is ordering by time.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now() -> String {
    timestamp(Utc::now())
}

pub fn parse_timestamp(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// True when the error is a UNIQUE/CHECK/FK violation reported by SQLite.
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Maps a constraint violation to `Conflict`, passing other errors through.
pub fn conflict_on_constraint(err: rusqlite::Error, message: &str) -> AppError {
    if is_constraint_violation(&err) {
        AppError::Conflict(message.to_string())
    } else {
        AppError::Database(err)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = test_support::migrated_pool();
        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        for table in [
            "users",
            "posts",
            "likes",
            "saves",
            "comments",
            "follows",
            "notifications",
            "invites",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = test_support::migrated_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let pool = test_support::migrated_pool();
        let conn = pool.get().unwrap();
        test_support::insert_user(&conn, "alice");

        let result = conn.execute(
            "INSERT INTO users (id, external_id, username, created_at) VALUES (?1, 'other', 'alice', ?2)",
            params![new_id(), now()],
        );
        let err = result.unwrap_err();
        assert!(is_constraint_violation(&err));

        // Stored usernames are compared case-sensitively.
        conn.execute(
            "INSERT INTO users (id, external_id, username, created_at) VALUES (?1, 'third', 'Alice', ?2)",
            params![new_id(), now()],
        )
        .unwrap();
    }

    #[test]
    fn self_follow_is_rejected_by_schema() {
        let pool = test_support::migrated_pool();
        let conn = pool.get().unwrap();
        let alice = test_support::insert_user(&conn, "alice");

        let result = conn.execute(
            "INSERT INTO follows (id, follower_id, following_id, created_at) VALUES (?1, ?2, ?2, ?3)",
            params![new_id(), alice, now()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = test_support::migrated_pool();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO posts (id, user_id, type, caption, created_at) VALUES (?1, ?2, 'quote', 'hi', ?3)",
            params!["post-1", "nonexistent-user", now()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = Utc::now();
        let late = early + chrono::Duration::microseconds(1);
        assert!(timestamp(early) < timestamp(late));
        assert_eq!(timestamp(early).len(), "2025-01-15T12:00:00.000000Z".len());
        assert_eq!(
            parse_timestamp(&timestamp(early)).unwrap().timestamp_micros(),
            early.timestamp_micros()
        );
    }
}
