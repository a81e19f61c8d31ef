use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use super::db::{from_db_time, to_db_time};
use super::Database;
use crate::quiz::{Difficulty, Question, QuestionKind, Quiz};

/// A saved quiz as shown in listings
#[derive(Debug, Clone)]
pub struct QuizSummary {
    pub id: i64,
    pub title: String,
    pub difficulty: Difficulty,
    pub question_count: usize,
    pub time_limit: Option<Duration>,
    pub created_at: DateTime<Utc>,
}

pub struct QuizStore<'a> {
    db: &'a Database,
}

impl<'a> QuizStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Save a quiz and its questions atomically
    pub fn insert(&self, quiz: &Quiz, now: DateTime<Utc>) -> Result<i64> {
        quiz.validate().context("Refusing to save an invalid quiz")?;

        self.db.transaction(|| {
            let conn = &self.db.conn;
            conn.execute(
                "INSERT INTO quizzes (owner_id, title, difficulty, time_limit_secs, document_ids, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    quiz.owner_id,
                    quiz.title,
                    quiz.difficulty.as_str(),
                    quiz.time_limit.map(|d| d.num_seconds()),
                    serde_json::to_string(&quiz.document_ids)?,
                    to_db_time(now),
                ],
            )
            .context("Failed to insert quiz")?;
            let quiz_id = conn.last_insert_rowid();

            for (position, question) in quiz.questions.iter().enumerate() {
                conn.execute(
                    "INSERT INTO questions (quiz_id, position, prompt, kind, explanation, concept)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        quiz_id,
                        position as i64,
                        question.prompt,
                        serde_json::to_string(&question.kind)?,
                        question.explanation,
                        question.concept,
                    ],
                )
                .context("Failed to insert question")?;
            }

            Ok(quiz_id)
        })
    }

    /// Load a quiz with its questions in order
    pub fn get(&self, id: i64) -> Result<Option<Quiz>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT id, owner_id, title, difficulty, time_limit_secs, document_ids
             FROM quizzes WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let difficulty: String = row.get(3)?;
        let time_limit: Option<i64> = row.get(4)?;
        let document_ids: String = row.get(5)?;

        Ok(Some(Quiz {
            id: Some(row.get(0)?),
            owner_id: row.get(1)?,
            title: row.get(2)?,
            difficulty: difficulty.parse()?,
            document_ids: serde_json::from_str(&document_ids)
                .context("Invalid document list on quiz")?,
            questions: self.questions_for(id)?,
            time_limit: time_limit.map(Duration::seconds),
        }))
    }

    pub fn get_question(&self, id: i64) -> Result<Option<Question>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT id, prompt, kind, explanation, concept FROM questions WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;

        match rows.next()? {
            Some(row) => Ok(Some(row_to_question(row)?)),
            None => Ok(None),
        }
    }

    fn questions_for(&self, quiz_id: i64) -> Result<Vec<Question>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT id, prompt, kind, explanation, concept
             FROM questions WHERE quiz_id = ?1 ORDER BY position ASC",
        )?;
        let mut rows = stmt.query(params![quiz_id])?;
        let mut questions = Vec::new();

        while let Some(row) = rows.next()? {
            questions.push(row_to_question(row)?);
        }

        Ok(questions)
    }

    /// List quizzes created by a user, newest first
    pub fn list(&self, owner_id: i64) -> Result<Vec<QuizSummary>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT q.id, q.title, q.difficulty, q.time_limit_secs, q.created_at,
                    (SELECT COUNT(*) FROM questions WHERE quiz_id = q.id)
             FROM quizzes q WHERE q.owner_id = ?1
             ORDER BY q.created_at DESC, q.id DESC",
        )?;
        let mut rows = stmt.query(params![owner_id])?;
        let mut quizzes = Vec::new();

        while let Some(row) = rows.next()? {
            let difficulty: String = row.get(2)?;
            let time_limit: Option<i64> = row.get(3)?;
            let created: String = row.get(4)?;
            let count: i64 = row.get(5)?;

            quizzes.push(QuizSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                difficulty: difficulty.parse()?,
                question_count: count as usize,
                time_limit: time_limit.map(Duration::seconds),
                created_at: from_db_time(&created)?,
            });
        }

        Ok(quizzes)
    }

    /// Delete a quiz the user owns; questions and attempts cascade
    pub fn delete(&self, owner_id: i64, id: i64) -> Result<bool> {
        let affected = self.db.conn.execute(
            "DELETE FROM quizzes WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;

        Ok(affected > 0)
    }
}

pub(crate) fn row_to_question(row: &rusqlite::Row) -> Result<Question> {
    let kind: String = row.get(2)?;
    let kind: QuestionKind =
        serde_json::from_str(&kind).context("Invalid question kind stored in database")?;
    let concept: String = row.get(4)?;

    let mut question = Question::new(row.get::<_, String>(1)?, kind).with_concept(concept);
    question.id = Some(row.get(0)?);
    question.explanation = row.get(3)?;
    Ok(question)
}

/// A two-question quiz for store tests
#[cfg(test)]
pub(crate) fn sample_quiz(owner_id: i64) -> Quiz {
    Quiz {
        id: None,
        owner_id,
        title: "Cell biology".to_string(),
        document_ids: vec![],
        difficulty: Difficulty::Hard,
        questions: vec![
            Question::new(
                "Which organelle produces ATP?",
                QuestionKind::MultipleChoice {
                    options: vec![
                        "Nucleus".to_string(),
                        "Mitochondria".to_string(),
                        "Ribosome".to_string(),
                    ],
                    correct: 1,
                },
            )
            .with_concept("Organelles")
            .with_explanation("Mitochondria run cellular respiration."),
            Question::new("Plant cells have walls.", QuestionKind::TrueFalse { answer: true }),
        ],
        time_limit: Some(Duration::minutes(10)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_db;
    use crate::storage::UserStore;
    use crate::users::Role;

    #[test]
    fn test_insert_and_get_round_trip() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let owner = UserStore::new(&db).create("ada", Role::Teacher, now).unwrap();
        let store = QuizStore::new(&db);

        let id = store.insert(&sample_quiz(owner), now).unwrap();
        let quiz = store.get(id).unwrap().unwrap();

        assert_eq!(quiz.id, Some(id));
        assert_eq!(quiz.difficulty, Difficulty::Hard);
        assert_eq!(quiz.time_limit_minutes(), Some(10));
        assert_eq!(quiz.questions.len(), 2);
        assert_eq!(quiz.questions[0].concept, "organelles");
        assert!(quiz.questions.iter().all(|q| q.id.is_some()));
        assert_eq!(quiz.questions[1].concept, "general");

        let question_id = quiz.questions[0].id.unwrap();
        let question = store.get_question(question_id).unwrap().unwrap();
        assert_eq!(question.kind, quiz.questions[0].kind);
    }

    #[test]
    fn test_invalid_quiz_is_rejected() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let owner = UserStore::new(&db).create("ada", Role::Teacher, now).unwrap();
        let store = QuizStore::new(&db);

        let mut quiz = sample_quiz(owner);
        quiz.questions.clear();
        assert!(store.insert(&quiz, now).is_err());
        assert!(store.list(owner).unwrap().is_empty());
    }

    #[test]
    fn test_list_and_delete() {
        let (_dir, db) = test_db();
        let now = Utc::now();
        let owner = UserStore::new(&db).create("ada", Role::Teacher, now).unwrap();
        let store = QuizStore::new(&db);
        let id = store.insert(&sample_quiz(owner), now).unwrap();

        let listed = store.list(owner).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].question_count, 2);

        assert!(!store.delete(owner + 1, id).unwrap());
        assert!(store.delete(owner, id).unwrap());
        assert!(store.get(id).unwrap().is_none());
    }
}
