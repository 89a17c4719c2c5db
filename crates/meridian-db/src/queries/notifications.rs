use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use uuid::Uuid;

use meridian_types::models::{Notification, NotificationKind};

use super::{enum_at, now, time_at, uuid_at};
use crate::models::Guarded;
use crate::Database;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, message, read, created_at";

impl Database {
    pub fn create_notification(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        message: &str,
    ) -> Result<Notification> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), user_id.to_string(), kind.as_str(), message, now()],
            )?;
            query_notification(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("notification {} vanished after insert", id))
        })
    }

    /// Newest first.
    pub fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM notifications
                 WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3",
                NOTIFICATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id.to_string(), unread_only, limit], notification_at)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Only the recipient may mark a notification read. Marking an already
    /// read notification succeeds without changing it.
    pub fn mark_notification_read(&self, actor: Uuid, id: Uuid) -> Result<Guarded<Notification>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(existing) = query_notification(&tx, id)? else {
                return Ok(Guarded::NotFound);
            };
            if existing.user_id != actor {
                return Ok(Guarded::Forbidden);
            }
            tx.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND read = 0",
                [id.to_string()],
            )?;
            let updated = query_notification(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("notification {} vanished after update", id))?;
            tx.commit()?;
            Ok(Guarded::Done(updated))
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                [user_id.to_string()],
            )?;
            Ok(changed)
        })
    }
}

fn query_notification(conn: &Connection, id: Uuid) -> Result<Option<Notification>> {
    let sql = format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS);
    let row = conn
        .query_row(&sql, [id.to_string()], notification_at)
        .optional()?;
    Ok(row)
}

fn notification_at(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        kind: enum_at(row, 2)?,
        message: row.get(3)?,
        read: row.get(4)?,
        created_at: time_at(row, 5)?,
    })
}
