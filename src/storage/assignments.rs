use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::db::{from_db_time, to_db_time};
use super::Database;

/// A quiz assigned to a class
#[derive(Debug, Clone)]
pub struct Assignment {
    pub id: i64,
    pub class_id: i64,
    pub class_name: String,
    pub teacher_id: i64,
    pub quiz_id: i64,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_at.is_some_and(|due| now > due)
    }
}

/// An assignment from a student's point of view
#[derive(Debug, Clone)]
pub struct StudentAssignment {
    pub assignment: Assignment,
    /// Score of the latest submission, if any
    pub latest_score: Option<f64>,
}

const ASSIGNMENT_COLUMNS: &str =
    "a.id, a.class_id, c.name, c.teacher_id, a.quiz_id, a.title, a.due_at, a.created_at";

pub struct AssignmentStore<'a> {
    db: &'a Database,
}

impl<'a> AssignmentStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create(
        &self,
        class_id: i64,
        quiz_id: i64,
        title: &str,
        due_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let title = title.trim();
        if title.is_empty() {
            anyhow::bail!("Assignment title cannot be empty");
        }
        if let Some(due) = due_at
            && due <= now
        {
            anyhow::bail!("Due date {} is already in the past", due.format("%Y-%m-%d %H:%M"));
        }

        self.db
            .conn
            .execute(
                "INSERT INTO assignments (class_id, quiz_id, title, due_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![class_id, quiz_id, title, due_at.map(to_db_time), to_db_time(now)],
            )
            .context("Failed to insert assignment")?;

        Ok(self.db.conn.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<Assignment>> {
        let mut assignments = self.query(
            &format!(
                "SELECT {} FROM assignments a JOIN classes c ON c.id = a.class_id WHERE a.id = ?1",
                ASSIGNMENT_COLUMNS
            ),
            params![id],
        )?;
        Ok(assignments.pop())
    }

    /// Assignments of a class, soonest due first; undated ones last
    pub fn list_for_class(&self, class_id: i64) -> Result<Vec<Assignment>> {
        self.query(
            &format!(
                "SELECT {} FROM assignments a JOIN classes c ON c.id = a.class_id
                 WHERE a.class_id = ?1
                 ORDER BY a.due_at IS NULL, a.due_at ASC, a.id ASC",
                ASSIGNMENT_COLUMNS
            ),
            params![class_id],
        )
    }

    /// Every assignment across the student's classes, with submission status
    pub fn list_for_student(&self, student_id: i64) -> Result<Vec<StudentAssignment>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "SELECT {},
                (SELECT t.score FROM attempts t
                 WHERE t.assignment_id = a.id AND t.user_id = ?1
                 ORDER BY t.submitted_at DESC, t.id DESC LIMIT 1)
             FROM assignments a
             JOIN classes c ON c.id = a.class_id
             JOIN enrollments en ON en.class_id = a.class_id
             WHERE en.student_id = ?1
             ORDER BY a.due_at IS NULL, a.due_at ASC, a.id ASC",
            ASSIGNMENT_COLUMNS
        ))?;
        let mut rows = stmt.query(params![student_id])?;
        let mut assignments = Vec::new();

        while let Some(row) = rows.next()? {
            assignments.push(StudentAssignment {
                assignment: Self::row_to_assignment(row)?,
                latest_score: row.get(8)?,
            });
        }

        Ok(assignments)
    }

    /// Assignments falling due in `(from, until]`
    pub fn due_between(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Assignment>> {
        self.query(
            &format!(
                "SELECT {} FROM assignments a JOIN classes c ON c.id = a.class_id
                 WHERE a.due_at > ?1 AND a.due_at <= ?2
                 ORDER BY a.due_at ASC",
                ASSIGNMENT_COLUMNS
            ),
            params![to_db_time(from), to_db_time(until)],
        )
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let affected = self
            .db
            .conn
            .execute("DELETE FROM assignments WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Assignment>> {
        let mut stmt = self.db.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut assignments = Vec::new();

        while let Some(row) = rows.next()? {
            assignments.push(Self::row_to_assignment(row)?);
        }

        Ok(assignments)
    }

    fn row_to_assignment(row: &rusqlite::Row) -> Result<Assignment> {
        let due: Option<String> = row.get(6)?;
        let created: String = row.get(7)?;

        Ok(Assignment {
            id: row.get(0)?,
            class_id: row.get(1)?,
            class_name: row.get(2)?,
            teacher_id: row.get(3)?,
            quiz_id: row.get(4)?,
            title: row.get(5)?,
            due_at: due.as_deref().map(from_db_time).transpose()?,
            created_at: from_db_time(&created)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuizSession;
    use crate::storage::db::test_db;
    use crate::storage::quizzes::sample_quiz;
    use crate::storage::{AttemptStore, ClassStore, QuizStore, UserStore};
    use crate::users::Role;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_student_sees_submission_status() {
        let (_dir, db) = test_db();
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap();
        let users = UserStore::new(&db);
        let teacher = users.create("teach", Role::Teacher, now).unwrap();
        let student = users.create("stu", Role::Student, now).unwrap();

        let classes = ClassStore::new(&db);
        let class = classes.create(teacher, "Chem", now).unwrap();
        classes.enroll(class.id, student, now).unwrap();

        let quizzes = QuizStore::new(&db);
        let quiz_id = quizzes.insert(&sample_quiz(teacher), now).unwrap();

        let store = AssignmentStore::new(&db);
        let undated = store.create(class.id, quiz_id, "Practice", None, now).unwrap();
        let dated = store
            .create(class.id, quiz_id, "Unit test", Some(now + Duration::days(2)), now)
            .unwrap();

        let listed = store.list_for_student(student).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].assignment.id, dated);
        assert_eq!(listed[1].assignment.id, undated);
        assert!(listed.iter().all(|a| a.latest_score.is_none()));

        let mut session = QuizSession::new(quizzes.get(quiz_id).unwrap().unwrap()).unwrap();
        session.start(now).unwrap();
        let outcome = session.submit(now + Duration::minutes(11)).unwrap().clone();
        AttemptStore::new(&db)
            .record(student, quiz_id, Some(dated), &outcome)
            .unwrap();

        let listed = store.list_for_student(student).unwrap();
        assert!(listed[0].latest_score.is_some());
        assert_eq!(listed[0].latest_score, Some(0.0));
        assert!(listed[1].latest_score.is_none());
    }

    #[test]
    fn test_due_window_and_validation() {
        let (_dir, db) = test_db();
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0).unwrap();
        let teacher = UserStore::new(&db).create("teach", Role::Teacher, now).unwrap();
        let class = ClassStore::new(&db).create(teacher, "Chem", now).unwrap();
        let quiz_id = QuizStore::new(&db).insert(&sample_quiz(teacher), now).unwrap();

        let store = AssignmentStore::new(&db);
        assert!(store
            .create(class.id, quiz_id, "Late", Some(now - Duration::hours(1)), now)
            .is_err());

        let soon = store
            .create(class.id, quiz_id, "Soon", Some(now + Duration::hours(5)), now)
            .unwrap();
        store
            .create(class.id, quiz_id, "Later", Some(now + Duration::days(3)), now)
            .unwrap();

        let window = store.due_between(now, now + Duration::hours(24)).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].id, soon);
        assert_eq!(window[0].class_name, "Chem");

        assert!(store.delete(soon).unwrap());
        assert!(store.get(soon).unwrap().is_none());
    }
}
