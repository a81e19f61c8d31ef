//! Quiz-taking state machine.
//!
//! A session walks a learner through a quiz one question at a time. Each
//! question needs an answer and then a confidence rating before the learner
//! may move on. A time limit, when set, is enforced on every call: the first
//! operation after the deadline submits the quiz on the learner's behalf.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::collections::BTreeMap;

use super::grading;
use super::model::{Answer, Question, Quiz};
use crate::error::QuizError;
use crate::learning::{ConfidenceLevel, LearningState, classify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitReason {
    Completed,
    TimeExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    InProgress {
        started_at: DateTime<Utc>,
    },
    Submitted {
        submitted_at: DateTime<Utc>,
        reason: SubmitReason,
    },
}

/// What happened after `next()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved(usize),
    ReadyToSubmit,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Slot {
    answer: Option<Answer>,
    confidence: Option<ConfidenceLevel>,
}

impl Slot {
    fn is_complete(&self) -> bool {
        self.answer.is_some() && self.confidence.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResult {
    pub index: usize,
    pub question: Question,
    pub answer: Option<Answer>,
    pub confidence: ConfidenceLevel,
    pub correct: bool,
    pub state: LearningState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizOutcome {
    pub results: Vec<QuestionResult>,
    pub correct: usize,
    pub total: usize,
    pub score_percent: f64,
    pub reason: SubmitReason,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

impl QuizOutcome {
    pub fn duration(&self) -> Duration {
        self.submitted_at - self.started_at
    }

    pub fn states(&self) -> BTreeMap<LearningState, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.state).or_insert(0) += 1;
        }
        counts
    }

    /// Results ordered for the review screen, most urgent first
    pub fn by_priority(&self) -> Vec<&QuestionResult> {
        let mut ordered: Vec<&QuestionResult> = self.results.iter().collect();
        ordered.sort_by(|a, b| {
            b.state
                .priority()
                .cmp(&a.state.priority())
                .then(a.index.cmp(&b.index))
        });
        ordered
    }

    pub fn unanswered(&self) -> usize {
        self.results.iter().filter(|r| r.answer.is_none()).count()
    }
}

pub struct QuizSession {
    quiz: Quiz,
    slots: Vec<Slot>,
    current: usize,
    phase: Phase,
    outcome: Option<QuizOutcome>,
}

impl QuizSession {
    pub fn new(quiz: Quiz) -> Result<Self, QuizError> {
        if quiz.questions.is_empty() {
            return Err(QuizError::Empty);
        }
        let slots = vec![Slot::default(); quiz.questions.len()];
        Ok(Self {
            quiz,
            slots,
            current: 0,
            phase: Phase::NotStarted,
            outcome: None,
        })
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.quiz.questions.len()
    }

    pub fn outcome(&self) -> Option<&QuizOutcome> {
        self.outcome.as_ref()
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), QuizError> {
        match self.phase {
            Phase::NotStarted => {
                self.phase = Phase::InProgress { started_at: now };
                info!(
                    "Quiz '{}' started with {} questions",
                    self.quiz.title,
                    self.len()
                );
                Ok(())
            }
            Phase::InProgress { .. } => Err(QuizError::AlreadyStarted),
            Phase::Submitted { .. } => Err(QuizError::AlreadySubmitted),
        }
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match (self.phase, self.quiz.time_limit) {
            (Phase::InProgress { started_at }, Some(limit)) => Some(started_at + limit),
            _ => None,
        }
    }

    /// Time left before the quiz is submitted automatically
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.deadline()
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }

    pub fn current(&self) -> (usize, &Question) {
        (self.current, &self.quiz.questions[self.current])
    }

    pub fn current_answer(&self) -> Option<&Answer> {
        self.slots[self.current].answer.as_ref()
    }

    pub fn current_confidence(&self) -> Option<ConfidenceLevel> {
        self.slots[self.current].confidence
    }

    pub fn answered_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_complete()).count()
    }

    /// Record an answer for the current question.
    ///
    /// Changing a previous answer clears its confidence so the learner has
    /// to rate the new one.
    pub fn answer(&mut self, now: DateTime<Utc>, answer: Answer) -> Result<(), QuizError> {
        self.ensure_active(now)?;

        let slot = &mut self.slots[self.current];
        if slot.answer.as_ref() != Some(&answer) {
            slot.confidence = None;
        }
        slot.answer = Some(answer);
        debug!("Answered question {}", self.current + 1);
        Ok(())
    }

    pub fn set_confidence(
        &mut self,
        now: DateTime<Utc>,
        confidence: ConfidenceLevel,
    ) -> Result<(), QuizError> {
        self.ensure_active(now)?;

        let slot = &mut self.slots[self.current];
        if slot.answer.is_none() {
            return Err(QuizError::AnswerRequired);
        }
        slot.confidence = Some(confidence);
        Ok(())
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> Result<Advance, QuizError> {
        self.ensure_active(now)?;

        let slot = &self.slots[self.current];
        if slot.answer.is_none() {
            return Err(QuizError::AnswerRequired);
        }
        if slot.confidence.is_none() {
            return Err(QuizError::ConfidenceRequired);
        }

        if self.current + 1 >= self.len() {
            Ok(Advance::ReadyToSubmit)
        } else {
            self.current += 1;
            Ok(Advance::Moved(self.current))
        }
    }

    pub fn previous(&mut self, now: DateTime<Utc>) -> Result<usize, QuizError> {
        self.ensure_active(now)?;

        if self.current == 0 {
            return Err(QuizError::NoPreviousQuestion);
        }
        self.current -= 1;
        Ok(self.current)
    }

    pub fn jump_to(&mut self, now: DateTime<Utc>, index: usize) -> Result<(), QuizError> {
        self.ensure_active(now)?;

        if index >= self.len() {
            return Err(QuizError::QuestionOutOfRange {
                index,
                total: self.len(),
            });
        }
        self.current = index;
        Ok(())
    }

    /// Submit the quiz.
    ///
    /// Before the deadline every question must be answered and rated. After
    /// it, whatever was answered so far is scored.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<&QuizOutcome, QuizError> {
        let started_at = match self.phase {
            Phase::NotStarted => return Err(QuizError::NotStarted),
            Phase::Submitted { .. } => return Err(QuizError::AlreadySubmitted),
            Phase::InProgress { started_at } => started_at,
        };

        let expired = self.is_expired(now);
        if !expired {
            let unanswered: Vec<usize> = self
                .slots
                .iter()
                .enumerate()
                .filter(|(_, s)| !s.is_complete())
                .map(|(i, _)| i)
                .collect();
            if !unanswered.is_empty() {
                return Err(QuizError::Incomplete { unanswered });
            }
        }

        let reason = if expired {
            SubmitReason::TimeExpired
        } else {
            SubmitReason::Completed
        };
        // A late submission is stamped at the deadline, not when it was noticed
        let submitted_at = match (expired, self.deadline()) {
            (true, Some(deadline)) => deadline,
            _ => now,
        };
        self.finish(started_at, submitted_at, reason);

        self.outcome.as_ref().ok_or(QuizError::NotStarted)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Gate for every mutating call: must be in progress and within time
    fn ensure_active(&mut self, now: DateTime<Utc>) -> Result<(), QuizError> {
        match self.phase {
            Phase::NotStarted => Err(QuizError::NotStarted),
            Phase::Submitted { .. } => Err(QuizError::AlreadySubmitted),
            Phase::InProgress { started_at } => {
                if self.is_expired(now) {
                    let deadline = self.deadline().unwrap_or(now);
                    self.finish(started_at, deadline, SubmitReason::TimeExpired);
                    Err(QuizError::TimeExpired)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn finish(
        &mut self,
        started_at: DateTime<Utc>,
        submitted_at: DateTime<Utc>,
        reason: SubmitReason,
    ) {
        let results: Vec<QuestionResult> = self
            .quiz
            .questions
            .iter()
            .zip(&self.slots)
            .enumerate()
            .map(|(index, (question, slot))| {
                // Unrated answers count as guesses
                let confidence = slot.confidence.unwrap_or(ConfidenceLevel::Low);
                let correct = slot
                    .answer
                    .as_ref()
                    .is_some_and(|a| grading::grade(question, a));
                QuestionResult {
                    index,
                    question: question.clone(),
                    answer: slot.answer.clone(),
                    confidence,
                    correct,
                    state: classify(correct, confidence),
                }
            })
            .collect();

        let correct = results.iter().filter(|r| r.correct).count();
        let total = results.len();

        info!(
            "Quiz '{}' submitted ({:?}): {}/{}",
            self.quiz.title, reason, correct, total
        );

        self.outcome = Some(QuizOutcome {
            results,
            correct,
            total,
            score_percent: grading::score_percent(correct, total),
            reason,
            started_at,
            submitted_at,
        });
        self.phase = Phase::Submitted {
            submitted_at,
            reason,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::model::{Difficulty, QuestionKind};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 2, 14, 0, 0).unwrap()
    }

    fn quiz(time_limit: Option<Duration>) -> Quiz {
        Quiz {
            id: Some(1),
            owner_id: 1,
            title: "Cells".to_string(),
            document_ids: vec![],
            difficulty: Difficulty::Medium,
            questions: vec![
                Question::new(
                    "Powerhouse of the cell?",
                    QuestionKind::MultipleChoice {
                        options: vec!["Nucleus".into(), "Mitochondria".into()],
                        correct: 1,
                    },
                ),
                Question::new("Plant cells have walls", QuestionKind::TrueFalse { answer: true }),
                Question::new(
                    "DNA is stored in the ___",
                    QuestionKind::FillInBlank {
                        answer: "nucleus".into(),
                    },
                ),
            ],
            time_limit,
        }
    }

    fn answer_current(
        session: &mut QuizSession,
        now: DateTime<Utc>,
        answer: Answer,
        confidence: ConfidenceLevel,
    ) {
        session.answer(now, answer).unwrap();
        session.set_confidence(now, confidence).unwrap();
    }

    #[test]
    fn test_empty_quiz_is_rejected() {
        let mut q = quiz(None);
        q.questions.clear();
        assert!(matches!(QuizSession::new(q), Err(QuizError::Empty)));
    }

    #[test]
    fn test_operations_require_start() {
        let mut s = QuizSession::new(quiz(None)).unwrap();
        assert_eq!(
            s.answer(t0(), Answer::Choice(1)),
            Err(QuizError::NotStarted)
        );
        assert!(matches!(s.submit(t0()), Err(QuizError::NotStarted)));

        s.start(t0()).unwrap();
        assert_eq!(s.start(t0()), Err(QuizError::AlreadyStarted));
    }

    #[test]
    fn test_confidence_is_gated_on_answer() {
        let mut s = QuizSession::new(quiz(None)).unwrap();
        s.start(t0()).unwrap();

        assert_eq!(
            s.set_confidence(t0(), ConfidenceLevel::High),
            Err(QuizError::AnswerRequired)
        );
        assert_eq!(s.next(t0()), Err(QuizError::AnswerRequired));

        s.answer(t0(), Answer::Choice(0)).unwrap();
        assert_eq!(s.next(t0()), Err(QuizError::ConfidenceRequired));

        s.set_confidence(t0(), ConfidenceLevel::High).unwrap();
        assert_eq!(s.next(t0()), Ok(Advance::Moved(1)));
    }

    #[test]
    fn test_changing_answer_clears_confidence() {
        let mut s = QuizSession::new(quiz(None)).unwrap();
        s.start(t0()).unwrap();
        answer_current(&mut s, t0(), Answer::Choice(0), ConfidenceLevel::High);

        // Same answer keeps the rating
        s.answer(t0(), Answer::Choice(0)).unwrap();
        assert_eq!(s.current_confidence(), Some(ConfidenceLevel::High));

        s.answer(t0(), Answer::Choice(1)).unwrap();
        assert_eq!(s.current_confidence(), None);
    }

    #[test]
    fn test_navigation() {
        let mut s = QuizSession::new(quiz(None)).unwrap();
        s.start(t0()).unwrap();
        assert_eq!(s.previous(t0()), Err(QuizError::NoPreviousQuestion));

        s.jump_to(t0(), 2).unwrap();
        assert_eq!(s.current().0, 2);
        assert_eq!(
            s.jump_to(t0(), 3),
            Err(QuizError::QuestionOutOfRange { index: 3, total: 3 })
        );
        assert_eq!(s.previous(t0()), Ok(1));
    }

    #[test]
    fn test_full_run_scores_and_classifies() {
        let mut s = QuizSession::new(quiz(None)).unwrap();
        s.start(t0()).unwrap();

        answer_current(&mut s, t0(), Answer::Choice(1), ConfidenceLevel::High);
        assert_eq!(s.next(t0()), Ok(Advance::Moved(1)));
        answer_current(&mut s, t0(), Answer::Bool(false), ConfidenceLevel::High);
        assert_eq!(s.next(t0()), Ok(Advance::Moved(2)));
        answer_current(
            &mut s,
            t0(),
            Answer::Text("Nucleus".into()),
            ConfidenceLevel::Low,
        );
        assert_eq!(s.next(t0()), Ok(Advance::ReadyToSubmit));

        let done = t0() + Duration::minutes(4);
        let outcome = s.submit(done).unwrap().clone();
        assert_eq!(outcome.correct, 2);
        assert_eq!(outcome.total, 3);
        assert!((outcome.score_percent - 66.666).abs() < 0.01);
        assert_eq!(outcome.reason, SubmitReason::Completed);
        assert_eq!(outcome.duration(), Duration::minutes(4));

        let states: Vec<LearningState> = outcome.results.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![
                LearningState::Mastered,
                LearningState::Misconception,
                LearningState::LuckyGuess
            ]
        );
        assert_eq!(outcome.by_priority()[0].index, 1);

        assert!(matches!(s.submit(done), Err(QuizError::AlreadySubmitted)));
        assert_eq!(
            s.answer(done, Answer::Choice(0)),
            Err(QuizError::AlreadySubmitted)
        );
    }

    #[test]
    fn test_submit_requires_every_question() {
        let mut s = QuizSession::new(quiz(None)).unwrap();
        s.start(t0()).unwrap();
        answer_current(&mut s, t0(), Answer::Choice(1), ConfidenceLevel::High);
        s.next(t0()).unwrap();
        s.answer(t0(), Answer::Bool(true)).unwrap();

        match s.submit(t0()) {
            Err(QuizError::Incomplete { unanswered }) => assert_eq!(unanswered, vec![1, 2]),
            other => panic!("expected incomplete, got {:?}", other),
        }
    }

    #[test]
    fn test_timer_counts_down_and_saturates() {
        let mut s = QuizSession::new(quiz(Some(Duration::minutes(10)))).unwrap();
        assert_eq!(s.remaining(t0()), None);
        s.start(t0()).unwrap();

        assert_eq!(s.remaining(t0() + Duration::minutes(3)), Some(Duration::minutes(7)));
        assert_eq!(s.remaining(t0() + Duration::hours(1)), Some(Duration::zero()));
    }

    #[test]
    fn test_expired_timer_forces_submission() {
        let mut s = QuizSession::new(quiz(Some(Duration::minutes(10)))).unwrap();
        s.start(t0()).unwrap();
        answer_current(&mut s, t0(), Answer::Choice(1), ConfidenceLevel::Medium);
        s.next(t0()).unwrap();

        let late = t0() + Duration::minutes(11);
        assert_eq!(s.answer(late, Answer::Bool(true)), Err(QuizError::TimeExpired));
        assert!(matches!(
            s.phase(),
            Phase::Submitted {
                reason: SubmitReason::TimeExpired,
                ..
            }
        ));

        let outcome = s.outcome().unwrap();
        assert_eq!(outcome.correct, 1);
        assert_eq!(outcome.unanswered(), 2);
        assert_eq!(outcome.submitted_at, t0() + Duration::minutes(10));
        assert_eq!(outcome.results[0].state, LearningState::Developing);
        assert_eq!(outcome.results[2].state, LearningState::KnowledgeGap);
    }

    #[test]
    fn test_submit_after_deadline_skips_completeness_check() {
        let mut s = QuizSession::new(quiz(Some(Duration::minutes(5)))).unwrap();
        s.start(t0()).unwrap();

        let outcome = s.submit(t0() + Duration::minutes(6)).unwrap();
        assert_eq!(outcome.reason, SubmitReason::TimeExpired);
        assert_eq!(outcome.correct, 0);
    }
}
