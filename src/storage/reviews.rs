use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::params;

use super::db::{from_db_time, to_db_time};
use super::quizzes::row_to_question;
use super::Database;
use crate::learning::{LearningState, ReviewSchedule};
use crate::quiz::Question;

/// A question waiting in the learner's review queue
#[derive(Debug, Clone)]
pub struct DueItem {
    pub question: Question,
    pub schedule: ReviewSchedule,
}

const SCHEDULE_COLUMNS: &str =
    "ri.strength, ri.ease_factor, ri.interval_days, ri.review_count, ri.lapses, ri.next_review, ri.last_state";

pub struct ReviewStore<'a> {
    db: &'a Database,
}

impl<'a> ReviewStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, user_id: i64, question_id: i64) -> Result<Option<ReviewSchedule>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "SELECT {} FROM review_items ri WHERE ri.user_id = ?1 AND ri.question_id = ?2",
            SCHEDULE_COLUMNS
        ))?;
        let mut rows = stmt.query(params![user_id, question_id])?;

        match rows.next()? {
            Some(row) => Ok(Some(row_to_schedule(row, 0)?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the schedule for one (user, question) pair
    pub fn upsert(
        &self,
        user_id: i64,
        question_id: i64,
        schedule: &ReviewSchedule,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.db
            .conn
            .execute(
                "INSERT INTO review_items (user_id, question_id, strength, ease_factor, interval_days, review_count, lapses, next_review, last_state, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(user_id, question_id) DO UPDATE SET
                    strength = excluded.strength,
                    ease_factor = excluded.ease_factor,
                    interval_days = excluded.interval_days,
                    review_count = excluded.review_count,
                    lapses = excluded.lapses,
                    next_review = excluded.next_review,
                    last_state = excluded.last_state,
                    updated_at = excluded.updated_at",
                params![
                    user_id,
                    question_id,
                    schedule.strength as i64,
                    schedule.ease_factor,
                    schedule.interval_days,
                    schedule.review_count as i64,
                    schedule.lapses as i64,
                    to_db_time(schedule.next_review),
                    schedule.last_state.map(|s| s.as_str()),
                    to_db_time(now),
                ],
            )
            .context("Failed to save review schedule")?;

        Ok(())
    }

    /// Reschedule a question after the learner answered it in `state`
    pub fn apply_state(
        &self,
        user_id: i64,
        question_id: i64,
        state: LearningState,
        now: DateTime<Utc>,
    ) -> Result<ReviewSchedule> {
        let current = self
            .get(user_id, question_id)?
            .unwrap_or_else(|| ReviewSchedule::new(now));
        let next = current.schedule_next(state, now);

        self.upsert(user_id, question_id, &next, now)?;
        debug!(
            "Question {} now {} strength, next review {}",
            question_id, next.strength, next.next_review
        );

        Ok(next)
    }

    /// Items due at `now`, weakest and most overdue first
    pub fn due(&self, user_id: i64, now: DateTime<Utc>, limit: usize) -> Result<Vec<DueItem>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "SELECT qu.id, qu.prompt, qu.kind, qu.explanation, qu.concept, {}
             FROM review_items ri JOIN questions qu ON qu.id = ri.question_id
             WHERE ri.user_id = ?1 AND ri.next_review <= ?2
             ORDER BY ri.next_review ASC, ri.strength ASC
             LIMIT ?3",
            SCHEDULE_COLUMNS
        ))?;
        let mut rows = stmt.query(params![user_id, to_db_time(now), limit as i64])?;
        let mut items = Vec::new();

        while let Some(row) = rows.next()? {
            items.push(DueItem {
                question: row_to_question(row)?,
                schedule: row_to_schedule(row, 5)?,
            });
        }

        Ok(items)
    }

    pub fn count_due(&self, user_id: i64, now: DateTime<Utc>) -> Result<i64> {
        let count: i64 = self.db.conn.query_row(
            "SELECT COUNT(*) FROM review_items WHERE user_id = ?1 AND next_review <= ?2",
            params![user_id, to_db_time(now)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn schedules(&self, user_id: i64) -> Result<Vec<ReviewSchedule>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "SELECT {} FROM review_items ri WHERE ri.user_id = ?1",
            SCHEDULE_COLUMNS
        ))?;
        let mut rows = stmt.query(params![user_id])?;
        let mut schedules = Vec::new();

        while let Some(row) = rows.next()? {
            schedules.push(row_to_schedule(row, 0)?);
        }

        Ok(schedules)
    }

    pub fn mastered_count(&self, user_id: i64) -> Result<usize> {
        Ok(self
            .schedules(user_id)?
            .iter()
            .filter(|s| s.is_mastered())
            .count())
    }
}

/// Read schedule columns starting at `offset`
fn row_to_schedule(row: &rusqlite::Row, offset: usize) -> Result<ReviewSchedule> {
    let strength: i64 = row.get(offset)?;
    let review_count: i64 = row.get(offset + 3)?;
    let lapses: i64 = row.get(offset + 4)?;
    let next_review: String = row.get(offset + 5)?;
    let last_state: Option<String> = row.get(offset + 6)?;

    Ok(ReviewSchedule {
        strength: strength.clamp(0, 100) as u8,
        ease_factor: row.get(offset + 1)?,
        interval_days: row.get(offset + 2)?,
        review_count: review_count as u32,
        lapses: lapses as u32,
        next_review: from_db_time(&next_review)?,
        last_state: last_state.map(|s| s.parse()).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_db;
    use crate::storage::quizzes::sample_quiz;
    use crate::storage::{QuizStore, UserStore};
    use crate::users::Role;
    use chrono::{Duration, TimeZone};

    fn setup(db: &Database, now: DateTime<Utc>) -> (i64, Vec<i64>) {
        let user = UserStore::new(db).create("ana", Role::Student, now).unwrap();
        let quizzes = QuizStore::new(db);
        let quiz_id = quizzes.insert(&sample_quiz(user), now).unwrap();
        let ids = quizzes
            .get(quiz_id)
            .unwrap()
            .unwrap()
            .questions
            .iter()
            .map(|q| q.id.unwrap())
            .collect();
        (user, ids)
    }

    #[test]
    fn test_apply_state_creates_then_updates() {
        let (_dir, db) = test_db();
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
        let (user, questions) = setup(&db, now);
        let store = ReviewStore::new(&db);

        let first = store
            .apply_state(user, questions[0], LearningState::Mastered, now)
            .unwrap();
        assert_eq!(first.strength, 70);
        assert_eq!(first.next_review, now + Duration::days(1));

        let later = now + Duration::days(1);
        let second = store
            .apply_state(user, questions[0], LearningState::Mastered, later)
            .unwrap();
        assert_eq!(second.strength, 90);
        assert_eq!(second.review_count, 2);

        let stored = store.get(user, questions[0]).unwrap().unwrap();
        assert_eq!(stored, second);
        assert_eq!(store.mastered_count(user).unwrap(), 1);
    }

    #[test]
    fn test_due_items_ordered_and_counted() {
        let (_dir, db) = test_db();
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
        let (user, questions) = setup(&db, now);
        let store = ReviewStore::new(&db);

        // Misconception comes back in half a day, a lucky guess after one day
        store
            .apply_state(user, questions[0], LearningState::LuckyGuess, now)
            .unwrap();
        store
            .apply_state(user, questions[1], LearningState::Misconception, now)
            .unwrap();

        assert_eq!(store.count_due(user, now).unwrap(), 0);

        let noon = now + Duration::hours(12);
        let due = store.due(user, noon, 10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].question.id, Some(questions[1]));
        assert_eq!(due[0].schedule.lapses, 1);

        let tomorrow = now + Duration::days(2);
        let due = store.due(user, tomorrow, 10).unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].question.id, Some(questions[1]));
        assert_eq!(store.count_due(user, tomorrow).unwrap(), 2);
        assert_eq!(store.due(user, tomorrow, 1).unwrap().len(), 1);
    }
}
