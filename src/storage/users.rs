use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::db::{from_db_time, to_db_time};
use super::Database;
use crate::users::{Role, User};

pub struct UserStore<'a> {
    db: &'a Database,
}

impl<'a> UserStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a profile; names are unique
    pub fn create(&self, name: &str, role: Role, now: DateTime<Utc>) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Profile name cannot be empty");
        }
        if self.get_by_name(name)?.is_some() {
            anyhow::bail!("A profile named '{}' already exists", name);
        }

        self.db
            .conn
            .execute(
                "INSERT INTO users (name, role, created_at) VALUES (?1, ?2, ?3)",
                params![name, role.as_str(), to_db_time(now)],
            )
            .context("Failed to insert user")?;

        Ok(self.db.conn.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<User>> {
        let mut stmt = self
            .db
            .conn
            .prepare("SELECT id, name, role, created_at FROM users WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_user(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<User>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT id, name, role, created_at FROM users WHERE name = ?1 COLLATE NOCASE",
        )?;
        let mut rows = stmt.query(params![name.trim()])?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_user(row)?)),
            None => Ok(None),
        }
    }

    pub fn list(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .db
            .conn
            .prepare("SELECT id, name, role, created_at FROM users ORDER BY name ASC")?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();

        while let Some(row) = rows.next()? {
            users.push(Self::row_to_user(row)?);
        }

        Ok(users)
    }

    fn row_to_user(row: &rusqlite::Row) -> Result<User> {
        let role: String = row.get(2)?;
        let created: String = row.get(3)?;

        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            role: role.parse()?,
            created_at: from_db_time(&created)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_db;

    #[test]
    fn test_create_and_lookup() {
        let (_dir, db) = test_db();
        let store = UserStore::new(&db);
        let now = Utc::now();

        let id = store.create("Ada", Role::Teacher, now).unwrap();
        let user = store.get(id).unwrap().unwrap();
        assert_eq!(user.name, "Ada");
        assert!(user.is_teacher());

        let by_name = store.get_by_name("ada").unwrap().unwrap();
        assert_eq!(by_name.id, id);
        assert!(store.get(999).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_and_blank_names_rejected() {
        let (_dir, db) = test_db();
        let store = UserStore::new(&db);
        let now = Utc::now();

        store.create("Ben", Role::Student, now).unwrap();
        assert!(store.create("BEN", Role::Student, now).is_err());
        assert!(store.create("   ", Role::Student, now).is_err());

        store.create("Ann", Role::Student, now).unwrap();
        let names: Vec<String> = store.list().unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["Ann", "Ben"]);
    }
}
