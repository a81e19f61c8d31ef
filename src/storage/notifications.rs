use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::db::{from_db_time, to_db_time};
use super::Database;
use crate::notifications::NotificationKind;

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: i64,
    pub kind: NotificationKind,
    pub message: String,
    /// What the notification points at, e.g. `assignment:4` or a date
    pub reference: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// The assignment this notification is about, if any
    pub fn assignment_id(&self) -> Option<i64> {
        self.reference
            .as_deref()?
            .strip_prefix("assignment:")?
            .parse()
            .ok()
    }
}

pub struct NotificationStore<'a> {
    db: &'a Database,
}

impl<'a> NotificationStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn push(
        &self,
        user_id: i64,
        kind: NotificationKind,
        message: &str,
        reference: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.db
            .conn
            .execute(
                "INSERT INTO notifications (user_id, kind, message, reference, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![user_id, kind.as_str(), message, reference, to_db_time(now)],
            )
            .context("Failed to insert notification")?;

        Ok(self.db.conn.last_insert_rowid())
    }

    /// Push unless the user already has one with the same kind and reference
    pub fn push_unique(
        &self,
        user_id: i64,
        kind: NotificationKind,
        message: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let existing: i64 = self.db.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND kind = ?2 AND reference = ?3",
            params![user_id, kind.as_str(), reference],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Ok(None);
        }

        self.push(user_id, kind, message, Some(reference), now)
            .map(Some)
    }

    /// Unread first, then newest first
    pub fn list(&self, user_id: i64, include_read: bool) -> Result<Vec<Notification>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT id, kind, message, reference, read, created_at
             FROM notifications
             WHERE user_id = ?1 AND (?2 OR read = 0)
             ORDER BY read ASC, created_at DESC, id DESC",
        )?;
        let mut rows = stmt.query(params![user_id, include_read])?;
        let mut notifications = Vec::new();

        while let Some(row) = rows.next()? {
            let kind: String = row.get(1)?;
            let created: String = row.get(5)?;
            notifications.push(Notification {
                id: row.get(0)?,
                kind: kind.parse()?,
                message: row.get(2)?,
                reference: row.get(3)?,
                read: row.get(4)?,
                created_at: from_db_time(&created)?,
            });
        }

        Ok(notifications)
    }

    pub fn mark_read(&self, user_id: i64, id: i64) -> Result<bool> {
        let affected = self.db.conn.execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(affected > 0)
    }

    pub fn mark_all_read(&self, user_id: i64) -> Result<usize> {
        let affected = self.db.conn.execute(
            "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
            params![user_id],
        )?;
        Ok(affected)
    }

    pub fn unread_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = self.db.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_db;
    use crate::storage::UserStore;
    use crate::users::Role;
    use chrono::Duration;

    #[test]
    fn test_unread_first_and_mark_read() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let user = UserStore::new(&db).create("ana", Role::Student, now).unwrap();
        let store = NotificationStore::new(&db);

        let old = store
            .push(user, NotificationKind::AssignmentCreated, "old", None, now)
            .unwrap();
        let new = store
            .push(
                user,
                NotificationKind::AssignmentCreated,
                "new",
                None,
                now + Duration::minutes(5),
            )
            .unwrap();
        assert_eq!(store.unread_count(user).unwrap(), 2);

        assert!(store.mark_read(user, new).unwrap());
        assert!(!store.mark_read(user + 1, old).unwrap());

        let unread = store.list(user, false).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, old);

        let all = store.list(user, true).unwrap();
        assert_eq!(all.iter().map(|n| n.id).collect::<Vec<_>>(), vec![old, new]);

        assert_eq!(store.mark_all_read(user).unwrap(), 1);
        assert_eq!(store.unread_count(user).unwrap(), 0);
    }

    #[test]
    fn test_push_unique_deduplicates() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let user = UserStore::new(&db).create("ana", Role::Student, now).unwrap();
        let store = NotificationStore::new(&db);

        let first = store
            .push_unique(user, NotificationKind::DueSoon, "due", "assignment:1", now)
            .unwrap();
        let again = store
            .push_unique(user, NotificationKind::DueSoon, "due", "assignment:1", now)
            .unwrap();
        let other = store
            .push_unique(user, NotificationKind::DueSoon, "due", "assignment:2", now)
            .unwrap();

        assert!(first.is_some());
        assert!(again.is_none());
        assert!(other.is_some());

        store
            .push(user, NotificationKind::ReviewsDue, "reviews", Some("reviews:2025-03-04"), now)
            .unwrap();
        let listed = store.list(user, false).unwrap();
        let mut assignment_ids: Vec<Option<i64>> =
            listed.iter().map(|n| n.assignment_id()).collect();
        assignment_ids.sort();
        assert_eq!(assignment_ids, vec![None, Some(1), Some(2)]);
    }
}
