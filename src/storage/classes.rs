use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use rand::Rng;
use rusqlite::params;

use super::db::{from_db_time, to_db_time};
use super::Database;
use crate::users::User;

pub const JOIN_CODE_LEN: usize = 6;

/// Letters and digits that cannot be misread for one another (no 0/O, 1/I/L)
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

const MAX_CODE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct Class {
    pub id: i64,
    pub teacher_id: i64,
    pub name: String,
    pub join_code: String,
    pub student_count: usize,
    pub created_at: DateTime<Utc>,
}

const CLASS_COLUMNS: &str = "c.id, c.teacher_id, c.name, c.join_code, c.created_at,
    (SELECT COUNT(*) FROM enrollments e WHERE e.class_id = c.id)";

pub struct ClassStore<'a> {
    db: &'a Database,
}

impl<'a> ClassStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a class with a fresh join code
    pub fn create(&self, teacher_id: i64, name: &str, now: DateTime<Utc>) -> Result<Class> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Class name cannot be empty");
        }

        let mut rng = rand::thread_rng();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_join_code(&mut rng);
            if self.by_code(&code)?.is_some() {
                continue;
            }

            self.db
                .conn
                .execute(
                    "INSERT INTO classes (teacher_id, name, join_code, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![teacher_id, name, code, to_db_time(now)],
                )
                .context("Failed to insert class")?;

            let id = self.db.conn.last_insert_rowid();
            info!("Created class '{}' with code {}", name, code);
            return self
                .get(id)?
                .ok_or_else(|| anyhow::anyhow!("Class {} vanished after insert", id));
        }

        anyhow::bail!("Could not find an unused join code, try again")
    }

    pub fn get(&self, id: i64) -> Result<Option<Class>> {
        self.query_one(
            &format!("SELECT {} FROM classes c WHERE c.id = ?1", CLASS_COLUMNS),
            params![id],
        )
    }

    /// Look up a class by join code, ignoring case and surrounding spaces
    pub fn by_code(&self, code: &str) -> Result<Option<Class>> {
        let code = code.trim().to_uppercase();
        self.query_one(
            &format!("SELECT {} FROM classes c WHERE c.join_code = ?1", CLASS_COLUMNS),
            params![code],
        )
    }

    pub fn list_for_teacher(&self, teacher_id: i64) -> Result<Vec<Class>> {
        self.query_many(
            &format!(
                "SELECT {} FROM classes c WHERE c.teacher_id = ?1 ORDER BY c.name ASC",
                CLASS_COLUMNS
            ),
            teacher_id,
        )
    }

    pub fn list_for_student(&self, student_id: i64) -> Result<Vec<Class>> {
        self.query_many(
            &format!(
                "SELECT {} FROM classes c
                 JOIN enrollments en ON en.class_id = c.id
                 WHERE en.student_id = ?1 ORDER BY c.name ASC",
                CLASS_COLUMNS
            ),
            student_id,
        )
    }

    /// Enrol a student. Returns false when they were already enrolled.
    pub fn enroll(&self, class_id: i64, student_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let class = self
            .get(class_id)?
            .ok_or_else(|| anyhow::anyhow!("Class {} not found", class_id))?;
        if class.teacher_id == student_id {
            anyhow::bail!("You teach '{}' and cannot join it as a student", class.name);
        }

        let affected = self.db.conn.execute(
            "INSERT OR IGNORE INTO enrollments (class_id, student_id, joined_at) VALUES (?1, ?2, ?3)",
            params![class_id, student_id, to_db_time(now)],
        )?;

        Ok(affected > 0)
    }

    pub fn is_enrolled(&self, class_id: i64, student_id: i64) -> Result<bool> {
        let count: i64 = self.db.conn.query_row(
            "SELECT COUNT(*) FROM enrollments WHERE class_id = ?1 AND student_id = ?2",
            params![class_id, student_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Enrolled students, alphabetically
    pub fn roster(&self, class_id: i64) -> Result<Vec<User>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT u.id, u.name, u.role, u.created_at
             FROM users u JOIN enrollments en ON en.student_id = u.id
             WHERE en.class_id = ?1 ORDER BY u.name ASC",
        )?;
        let mut rows = stmt.query(params![class_id])?;
        let mut students = Vec::new();

        while let Some(row) = rows.next()? {
            let role: String = row.get(2)?;
            let created: String = row.get(3)?;
            students.push(User {
                id: row.get(0)?,
                name: row.get(1)?,
                role: role.parse()?,
                created_at: from_db_time(&created)?,
            });
        }

        Ok(students)
    }

    pub fn remove_student(&self, class_id: i64, student_id: i64) -> Result<bool> {
        let affected = self.db.conn.execute(
            "DELETE FROM enrollments WHERE class_id = ?1 AND student_id = ?2",
            params![class_id, student_id],
        )?;
        Ok(affected > 0)
    }

    fn query_one(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<Class>> {
        let mut stmt = self.db.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;

        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_class(row)?)),
            None => Ok(None),
        }
    }

    fn query_many(&self, sql: &str, id: i64) -> Result<Vec<Class>> {
        let mut stmt = self.db.conn.prepare(sql)?;
        let mut rows = stmt.query(params![id])?;
        let mut classes = Vec::new();

        while let Some(row) = rows.next()? {
            classes.push(Self::row_to_class(row)?);
        }

        Ok(classes)
    }

    fn row_to_class(row: &rusqlite::Row) -> Result<Class> {
        let created: String = row.get(4)?;
        let students: i64 = row.get(5)?;

        Ok(Class {
            id: row.get(0)?,
            teacher_id: row.get(1)?,
            name: row.get(2)?,
            join_code: row.get(3)?,
            student_count: students as usize,
            created_at: from_db_time(&created)?,
        })
    }
}

pub fn generate_join_code<R: Rng>(rng: &mut R) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}
