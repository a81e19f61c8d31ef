use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;

use super::db::{from_db_time, to_db_time};
use super::Database;
use crate::learning::{ConfidenceLevel, LearningState, ResponseRecord};
use crate::quiz::{Answer, QuizOutcome, SubmitReason};

/// A submitted quiz attempt
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub assignment_id: Option<i64>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub reason: SubmitReason,
    pub correct: usize,
    pub total: usize,
    pub score_percent: f64,
}

/// One answer given outside a quiz attempt, e.g. during review
pub struct StandaloneResponse<'a> {
    pub question_id: i64,
    pub answer: Option<&'a Answer>,
    pub confidence: ConfidenceLevel,
    pub correct: bool,
    pub state: LearningState,
}

const ATTEMPT_COLUMNS: &str = "a.id, a.user_id, a.quiz_id, q.title, a.assignment_id, a.started_at, a.submitted_at, a.reason, a.correct, a.total, a.score";

const RESPONSE_COLUMNS: &str =
    "r.question_id, qu.prompt, qu.concept, r.correct, r.confidence, r.state, r.answered_at";

pub struct AttemptStore<'a> {
    db: &'a Database,
}

impl<'a> AttemptStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Persist a graded attempt and every per-question response
    pub fn record(
        &self,
        user_id: i64,
        quiz_id: i64,
        assignment_id: Option<i64>,
        outcome: &QuizOutcome,
    ) -> Result<i64> {
        self.db.transaction(|| {
            let conn = &self.db.conn;
            conn.execute(
                "INSERT INTO attempts (user_id, quiz_id, assignment_id, started_at, submitted_at, reason, correct, total, score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    user_id,
                    quiz_id,
                    assignment_id,
                    to_db_time(outcome.started_at),
                    to_db_time(outcome.submitted_at),
                    reason_str(outcome.reason),
                    outcome.correct as i64,
                    outcome.total as i64,
                    outcome.score_percent,
                ],
            )
            .context("Failed to insert attempt")?;
            let attempt_id = conn.last_insert_rowid();

            let answered_at = to_db_time(outcome.submitted_at);
            for result in &outcome.results {
                let Some(question_id) = result.question.id else {
                    continue;
                };
                let answer = result
                    .answer
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;

                conn.execute(
                    "INSERT INTO responses (user_id, attempt_id, question_id, answer, confidence, correct, state, answered_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        user_id,
                        attempt_id,
                        question_id,
                        answer,
                        result.confidence.as_str(),
                        result.correct,
                        result.state.as_str(),
                        answered_at,
                    ],
                )
                .context("Failed to insert response")?;
            }

            Ok(attempt_id)
        })
    }

    /// Record a single answer from a review session
    pub fn record_response(
        &self,
        user_id: i64,
        response: &StandaloneResponse,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let answer = response.answer.map(serde_json::to_string).transpose()?;

        self.db
            .conn
            .execute(
                "INSERT INTO responses (user_id, attempt_id, question_id, answer, confidence, correct, state, answered_at)
                 VALUES (?1, NULL, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user_id,
                    response.question_id,
                    answer,
                    response.confidence.as_str(),
                    response.correct,
                    response.state.as_str(),
                    to_db_time(now),
                ],
            )
            .context("Failed to insert response")?;

        Ok(())
    }

    /// A user's attempts, newest first
    pub fn list_for_user(&self, user_id: i64) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "SELECT {} FROM attempts a JOIN quizzes q ON q.id = a.quiz_id
             WHERE a.user_id = ?1 ORDER BY a.submitted_at DESC, a.id DESC",
            ATTEMPT_COLUMNS
        ))?;
        let mut rows = stmt.query(params![user_id])?;
        let mut attempts = Vec::new();

        while let Some(row) = rows.next()? {
            attempts.push(Self::row_to_attempt(row)?);
        }

        Ok(attempts)
    }

    /// The latest attempt of each currently enrolled student for an assignment
    pub fn latest_for_assignment(&self, assignment_id: i64) -> Result<Vec<AttemptRecord>> {
        let mut stmt = self.db.conn.prepare(&format!(
            "SELECT {} FROM attempts a
             JOIN quizzes q ON q.id = a.quiz_id
             JOIN assignments asg ON asg.id = a.assignment_id
             JOIN enrollments e ON e.class_id = asg.class_id AND e.student_id = a.user_id
             WHERE a.assignment_id = ?1
               AND a.id = (SELECT b.id FROM attempts b
                           WHERE b.assignment_id = a.assignment_id AND b.user_id = a.user_id
                           ORDER BY b.submitted_at DESC, b.id DESC LIMIT 1)
             ORDER BY a.user_id ASC",
            ATTEMPT_COLUMNS
        ))?;
        let mut rows = stmt.query(params![assignment_id])?;
        let mut attempts = Vec::new();

        while let Some(row) = rows.next()? {
            attempts.push(Self::row_to_attempt(row)?);
        }

        Ok(attempts)
    }

    pub fn has_submitted(&self, user_id: i64, assignment_id: i64) -> Result<bool> {
        let count: i64 = self.db.conn.query_row(
            "SELECT COUNT(*) FROM attempts WHERE user_id = ?1 AND assignment_id = ?2",
            params![user_id, assignment_id],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// Every answer a user has given, oldest first
    pub fn responses_for_user(&self, user_id: i64) -> Result<Vec<ResponseRecord>> {
        self.query_responses(
            &format!(
                "SELECT {} FROM responses r JOIN questions qu ON qu.id = r.question_id
                 WHERE r.user_id = ?1 ORDER BY r.answered_at ASC, r.id ASC",
                RESPONSE_COLUMNS
            ),
            user_id,
        )
    }

    pub fn responses_for_attempt(&self, attempt_id: i64) -> Result<Vec<ResponseRecord>> {
        self.query_responses(
            &format!(
                "SELECT {} FROM responses r JOIN questions qu ON qu.id = r.question_id
                 WHERE r.attempt_id = ?1 ORDER BY qu.position ASC",
                RESPONSE_COLUMNS
            ),
            attempt_id,
        )
    }

    /// Distinct UTC days on which the user answered anything
    pub fn activity_days(&self, user_id: i64) -> Result<Vec<NaiveDate>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT DISTINCT substr(answered_at, 1, 10) AS day FROM responses
             WHERE user_id = ?1 ORDER BY day ASC",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        let mut days = Vec::new();

        while let Some(row) = rows.next()? {
            let day: String = row.get(0)?;
            days.push(
                NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                    .with_context(|| format!("Invalid activity day '{}'", day))?,
            );
        }

        Ok(days)
    }

    fn query_responses(&self, sql: &str, id: i64) -> Result<Vec<ResponseRecord>> {
        let mut stmt = self.db.conn.prepare(sql)?;
        let mut rows = stmt.query(params![id])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let confidence: String = row.get(4)?;
            let state: String = row.get(5)?;
            let answered: String = row.get(6)?;

            records.push(ResponseRecord {
                question_id: row.get(0)?,
                prompt: row.get(1)?,
                concept: row.get(2)?,
                correct: row.get(3)?,
                confidence: confidence.parse()?,
                state: state.parse()?,
                answered_at: from_db_time(&answered)?,
            });
        }

        Ok(records)
    }

    fn row_to_attempt(row: &rusqlite::Row) -> Result<AttemptRecord> {
        let started: String = row.get(5)?;
        let submitted: String = row.get(6)?;
        let reason: String = row.get(7)?;
        let correct: i64 = row.get(8)?;
        let total: i64 = row.get(9)?;

        Ok(AttemptRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            quiz_id: row.get(2)?,
            quiz_title: row.get(3)?,
            assignment_id: row.get(4)?,
            started_at: from_db_time(&started)?,
            submitted_at: from_db_time(&submitted)?,
            reason: parse_reason(&reason)?,
            correct: correct as usize,
            total: total as usize,
            score_percent: row.get(10)?,
        })
    }
}

fn reason_str(reason: SubmitReason) -> &'static str {
    match reason {
        SubmitReason::Completed => "completed",
        SubmitReason::TimeExpired => "time_expired",
    }
}

fn parse_reason(value: &str) -> Result<SubmitReason> {
    match value {
        "completed" => Ok(SubmitReason::Completed),
        "time_expired" => Ok(SubmitReason::TimeExpired),
        other => anyhow::bail!("Unknown submit reason '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuizSession;
    use crate::storage::db::test_db;
    use crate::storage::quizzes::sample_quiz;
    use crate::storage::{QuizStore, UserStore};
    use crate::users::Role;
    use chrono::{Duration, TimeZone};

    fn taken_outcome(db: &Database, quiz_id: i64, start: DateTime<Utc>) -> QuizOutcome {
        let quiz = QuizStore::new(db).get(quiz_id).unwrap().unwrap();
        let mut session = QuizSession::new(quiz).unwrap();
        session.start(start).unwrap();

        // Confidently wrong on the first question, unsure but right on the second
        session.answer(start, Answer::Choice(0)).unwrap();
        session.set_confidence(start, ConfidenceLevel::High).unwrap();
        session.next(start).unwrap();
        session.answer(start, Answer::Bool(true)).unwrap();
        session.set_confidence(start, ConfidenceLevel::Low).unwrap();

        session.submit(start + Duration::minutes(3)).unwrap().clone()
    }

    #[test]
    fn test_record_attempt_and_read_responses() {
        let (_dir, db) = test_db();
        let start = Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap();
        let user = UserStore::new(&db).create("ana", Role::Student, start).unwrap();
        let quiz_id = QuizStore::new(&db).insert(&sample_quiz(user), start).unwrap();

        let outcome = taken_outcome(&db, quiz_id, start);
        let store = AttemptStore::new(&db);
        let attempt_id = store.record(user, quiz_id, None, &outcome).unwrap();

        let attempts = store.list_for_user(user).unwrap();
        assert_eq!(attempts.len(), 1);
        let attempt = &attempts[0];
        assert_eq!(attempt.id, attempt_id);
        assert_eq!(attempt.quiz_title, "Cell biology");
        assert_eq!(attempt.correct, 1);
        assert_eq!(attempt.total, 2);
        assert_eq!(attempt.reason, SubmitReason::Completed);
        assert_eq!(attempt.submitted_at, start + Duration::minutes(3));

        let responses = store.responses_for_user(user).unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].state, LearningState::Misconception);
        assert_eq!(responses[0].concept, "organelles");
        assert_eq!(responses[1].state, LearningState::LuckyGuess);

        let by_attempt = store.responses_for_attempt(attempt_id).unwrap();
        assert_eq!(by_attempt.len(), 2);
    }

    #[test]
    fn test_activity_days_are_distinct() {
        let (_dir, db) = test_db();
        let day_one = Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap();
        let user = UserStore::new(&db).create("ana", Role::Student, day_one).unwrap();
        let quiz_id = QuizStore::new(&db).insert(&sample_quiz(user), day_one).unwrap();
        let question_id = QuizStore::new(&db).get(quiz_id).unwrap().unwrap().questions[1]
            .id
            .unwrap();

        let store = AttemptStore::new(&db);
        let answer = Answer::Bool(true);
        let response = StandaloneResponse {
            question_id,
            answer: Some(&answer),
            confidence: ConfidenceLevel::High,
            correct: true,
            state: LearningState::Mastered,
        };
        store.record_response(user, &response, day_one).unwrap();
        store
            .record_response(user, &response, day_one + Duration::hours(2))
            .unwrap();
        store
            .record_response(user, &response, day_one + Duration::days(1))
            .unwrap();

        let days = store.activity_days(user).unwrap();
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
            ]
        );
    }
}
