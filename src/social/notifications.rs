use rusqlite::{named_params, params, Connection, OptionalExtension, Row};

use crate::db::models::{NotificationType, NotificationView, UserSummary};
use crate::db::pagination::{paginate, Keyset, Order, Page, PageRequest};
use crate::db::{new_id, now, parse_timestamp};
use crate::error::{AppError, AppResult};

const NOTIFICATION_COLUMNS: &str = "n.id, n.user_id, n.type, n.reference_id, n.read, n.created_at, \
     a.id, a.username, a.avatar_url";

const NOTIFICATION_JOINS: &str = "LEFT JOIN users a ON a.id = n.actor_id";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationView> {
    let created_at: String = row.get(5)?;
    let actor_id: Option<String> = row.get(6)?;
    let actor = match actor_id {
        Some(id) => Some(UserSummary {
            id,
            username: row.get(7)?,
            avatar_url: row.get(8)?,
        }),
        None => None,
    };
    Ok(NotificationView {
        id: row.get(0)?,
        user_id: row.get(1)?,
        actor,
        kind: row.get(2)?,
        reference_id: row.get(3)?,
        read: row.get(4)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Records a notification for `recipient`. Acting on your own content is
/// not news, so nothing is written when the actor is the recipient.
pub fn notify(
    conn: &Connection,
    recipient: &str,
    actor: Option<&str>,
    kind: NotificationType,
    reference_id: &str,
) -> AppResult<()> {
    if actor == Some(recipient) {
        return Ok(());
    }
    conn.execute(
        "INSERT INTO notifications (id, user_id, actor_id, type, reference_id, read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![new_id(), recipient, actor, kind, reference_id, now()],
    )?;
    Ok(())
}

/// The caller's notifications, newest first.
pub fn list(conn: &Connection, user_id: &str, page: &PageRequest) -> AppResult<Page<NotificationView>> {
    let keyset = Keyset {
        table: "notifications",
        alias: "n",
        columns: NOTIFICATION_COLUMNS,
        joins: NOTIFICATION_JOINS,
        filter: Some("n.user_id = :user_id"),
        order: Order::NewestFirst,
    };
    paginate(
        conn,
        &keyset,
        named_params! { ":user_id": user_id },
        page,
        notification_from_row,
    )
}

/// Marks one of the caller's notifications read. Someone else's
/// notification is reported as missing.
pub fn mark_read(conn: &Connection, user_id: &str, id: &str) -> AppResult<NotificationView> {
    let changed = conn.execute(
        "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound("Notification".into()));
    }

    let sql = format!(
        "SELECT {} FROM notifications n {} WHERE n.id = ?1",
        NOTIFICATION_COLUMNS, NOTIFICATION_JOINS
    );
    conn.query_row(&sql, [id], notification_from_row)
        .optional()?
        .ok_or_else(|| AppError::NotFound("Notification".into()))
}

/// Returns how many notifications changed.
pub fn mark_all_read(conn: &Connection, user_id: &str) -> AppResult<usize> {
    let changed = conn.execute(
        "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
        [user_id],
    )?;
    Ok(changed)
}

pub fn unread_count(conn: &Connection, user_id: &str) -> AppResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_user, migrated_pool};

    #[test]
    fn self_notifications_are_skipped() {
        let pool = migrated_pool();
        let conn = pool.get().unwrap();
        let alice = insert_user(&conn, "alice");

        notify(&conn, &alice, Some(&alice), NotificationType::Like, "p").unwrap();
        assert_eq!(unread_count(&conn, &alice).unwrap(), 0);
    }

    #[test]
    fn list_newest_first_with_actor() {
        let pool = migrated_pool();
        let conn = pool.get().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");

        notify(&conn, &alice, Some(&bob), NotificationType::Follow, &bob).unwrap();
        notify(&conn, &alice, Some(&bob), NotificationType::Like, "post-1").unwrap();

        let page = list(&conn, &alice, &PageRequest::first(20)).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].kind, NotificationType::Like);
        assert_eq!(page.items[1].kind, NotificationType::Follow);
        assert_eq!(page.items[0].actor.as_ref().unwrap().username, "bob");
        assert!(!page.items[0].read);

        assert!(list(&conn, &bob, &PageRequest::first(20)).unwrap().items.is_empty());
    }

    #[test]
    fn mark_read_only_touches_own_notifications() {
        let pool = migrated_pool();
        let conn = pool.get().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        notify(&conn, &alice, Some(&bob), NotificationType::Follow, &bob).unwrap();
        let id = list(&conn, &alice, &PageRequest::first(1)).unwrap().items[0].id.clone();

        assert!(matches!(
            mark_read(&conn, &bob, &id).unwrap_err(),
            AppError::NotFound(_)
        ));

        let read = mark_read(&conn, &alice, &id).unwrap();
        assert!(read.read);
        assert_eq!(unread_count(&conn, &alice).unwrap(), 0);
    }

    #[test]
    fn mark_all_read_clears_unread_count() {
        let pool = migrated_pool();
        let conn = pool.get().unwrap();
        let alice = insert_user(&conn, "alice");
        let bob = insert_user(&conn, "bob");
        for _ in 0..3 {
            notify(&conn, &alice, Some(&bob), NotificationType::Like, "post").unwrap();
        }
        assert_eq!(unread_count(&conn, &alice).unwrap(), 3);
        assert_eq!(mark_all_read(&conn, &alice).unwrap(), 3);
        assert_eq!(unread_count(&conn, &alice).unwrap(), 0);
        assert_eq!(mark_all_read(&conn, &alice).unwrap(), 0);
    }
}
