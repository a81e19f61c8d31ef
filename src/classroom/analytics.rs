use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::learning::analytics::misconceptions;
use crate::learning::{ConfidenceLevel, LearningState, ResponseRecord};

/// Share of submitters answering wrong with high confidence that flags a class-wide misconception
pub const CLASS_MISCONCEPTION_SHARE: f64 = 0.3;

pub const AT_RISK_AVERAGE: f64 = 60.0;
pub const AT_RISK_MISCONCEPTIONS: usize = 3;
pub const AT_RISK_COMPLETION: f64 = 0.5;

/// A student's latest submission for one assignment
#[derive(Debug, Clone)]
pub struct Submission {
    pub student_id: i64,
    pub submitted_at: DateTime<Utc>,
    pub score_percent: f64,
    pub responses: Vec<ResponseRecord>,
}

impl Submission {
    pub fn is_late(&self, due_at: Option<DateTime<Utc>>) -> bool {
        due_at.is_some_and(|due| self.submitted_at > due)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionStat {
    pub question_id: i64,
    pub prompt: String,
    pub concept: String,
    pub answered: usize,
    pub correct: usize,
    pub confident_wrong: usize,
}

impl QuestionStat {
    pub fn accuracy(&self) -> f64 {
        if self.answered == 0 {
            0.0
        } else {
            self.correct as f64 / self.answered as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMisconception {
    pub question_id: i64,
    pub prompt: String,
    pub concept: String,
    /// Fraction of submitters who were confidently wrong
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentReport {
    pub enrolled: usize,
    pub submitted: usize,
    pub late: usize,
    pub average_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    /// Hardest question first
    pub questions: Vec<QuestionStat>,
    pub misconceptions: Vec<ClassMisconception>,
}

impl AssignmentReport {
    pub fn completion_rate(&self) -> f64 {
        if self.enrolled == 0 {
            0.0
        } else {
            self.submitted as f64 / self.enrolled as f64
        }
    }
}

pub fn assignment_report(
    enrolled: usize,
    due_at: Option<DateTime<Utc>>,
    submissions: &[Submission],
) -> AssignmentReport {
    let scores: Vec<f64> = submissions.iter().map(|s| s.score_percent).collect();
    let average_score = mean(&scores);
    let min_score = scores.iter().copied().reduce(f64::min);
    let max_score = scores.iter().copied().reduce(f64::max);
    let late = submissions.iter().filter(|s| s.is_late(due_at)).count();

    let mut by_question: HashMap<i64, QuestionStat> = HashMap::new();
    for response in submissions.iter().flat_map(|s| &s.responses) {
        let stat = by_question
            .entry(response.question_id)
            .or_insert_with(|| QuestionStat {
                question_id: response.question_id,
                prompt: response.prompt.clone(),
                concept: response.concept.clone(),
                answered: 0,
                correct: 0,
                confident_wrong: 0,
            });
        stat.answered += 1;
        if response.correct {
            stat.correct += 1;
        } else if response.confidence == ConfidenceLevel::High {
            stat.confident_wrong += 1;
        }
    }

    let mut questions: Vec<QuestionStat> = by_question.into_values().collect();
    questions.sort_by(|a, b| {
        a.accuracy()
            .total_cmp(&b.accuracy())
            .then(a.question_id.cmp(&b.question_id))
    });

    let submitters = submissions.len();
    let mut class_misconceptions: Vec<ClassMisconception> = questions
        .iter()
        .filter(|q| submitters > 0 && q.confident_wrong > 0)
        .map(|q| ClassMisconception {
            question_id: q.question_id,
            prompt: q.prompt.clone(),
            concept: q.concept.clone(),
            share: q.confident_wrong as f64 / submitters as f64,
        })
        .filter(|m| m.share >= CLASS_MISCONCEPTION_SHARE)
        .collect();
    class_misconceptions.sort_by(|a, b| b.share.total_cmp(&a.share));

    AssignmentReport {
        enrolled,
        submitted: submitters,
        late,
        average_score,
        min_score,
        max_score,
        questions,
        misconceptions: class_misconceptions,
    }
}

/// One student's standing across a class
#[derive(Debug, Clone, PartialEq)]
pub struct StudentReport {
    pub student_id: i64,
    pub name: String,
    pub assigned: usize,
    pub completed: usize,
    pub average_score: Option<f64>,
    pub misconceptions: usize,
    pub at_risk: bool,
}

impl StudentReport {
    pub fn completion_rate(&self) -> f64 {
        if self.assigned == 0 {
            1.0
        } else {
            self.completed as f64 / self.assigned as f64
        }
    }
}

pub fn student_report(
    student_id: i64,
    name: &str,
    assigned: usize,
    submissions: &[Submission],
) -> StudentReport {
    let scores: Vec<f64> = submissions.iter().map(|s| s.score_percent).collect();
    let responses: Vec<ResponseRecord> = submissions
        .iter()
        .flat_map(|s| s.responses.iter().cloned())
        .collect();
    let open_misconceptions = misconceptions(&responses)
        .iter()
        .filter(|m| m.latest_state == LearningState::Misconception)
        .count();

    let mut report = StudentReport {
        student_id,
        name: name.to_string(),
        assigned,
        completed: submissions.len(),
        average_score: mean(&scores),
        misconceptions: open_misconceptions,
        at_risk: false,
    };
    report.at_risk = report.average_score.is_some_and(|avg| avg < AT_RISK_AVERAGE)
        || report.misconceptions >= AT_RISK_MISCONCEPTIONS
        || report.completion_rate() < AT_RISK_COMPLETION;
    report
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::classify;
    use chrono::TimeZone;

    fn response(question_id: i64, correct: bool, confidence: ConfidenceLevel) -> ResponseRecord {
        ResponseRecord {
            question_id,
            prompt: format!("Question {}", question_id),
            concept: "forces".to_string(),
            correct,
            confidence,
            state: classify(correct, confidence),
            answered_at: Utc.with_ymd_and_hms(2025, 10, 2, 9, 0, 0).unwrap(),
        }
    }

    fn submission(student_id: i64, hour: u32, score: f64, responses: Vec<ResponseRecord>) -> Submission {
        Submission {
            student_id,
            submitted_at: Utc.with_ymd_and_hms(2025, 10, 2, hour, 0, 0).unwrap(),
            score_percent: score,
            responses,
        }
    }

    #[test]
    fn test_assignment_report_flags_class_misconceptions() {
        use ConfidenceLevel::*;
        let due = Utc.with_ymd_and_hms(2025, 10, 2, 12, 0, 0).unwrap();
        let submissions = vec![
            submission(1, 9, 100.0, vec![response(10, true, High), response(11, true, High)]),
            submission(2, 10, 50.0, vec![response(10, true, Medium), response(11, false, High)]),
            submission(3, 13, 0.0, vec![response(10, false, Low), response(11, false, Medium)]),
        ];

        let report = assignment_report(4, Some(due), &submissions);
        assert_eq!(report.submitted, 3);
        assert_eq!(report.late, 1);
        assert!((report.completion_rate() - 0.75).abs() < 1e-9);
        assert_eq!(report.average_score, Some(50.0));
        assert_eq!(report.min_score, Some(0.0));
        assert_eq!(report.max_score, Some(100.0));

        // Question 11 is hardest: 1 of 3 correct
        assert_eq!(report.questions[0].question_id, 11);
        assert_eq!(report.questions[0].confident_wrong, 1);

        // 1 of 3 submitters confidently wrong is 33%, above the threshold
        assert_eq!(report.misconceptions.len(), 1);
        assert_eq!(report.misconceptions[0].question_id, 11);
    }

    #[test]
    fn test_misconception_threshold_not_met() {
        use ConfidenceLevel::*;
        let mut submissions: Vec<Submission> = (1..=3)
            .map(|id| submission(id, 9, 100.0, vec![response(10, true, High)]))
            .collect();
        submissions.push(submission(4, 9, 0.0, vec![response(10, false, High)]));

        let report = assignment_report(4, None, &submissions);
        assert!(report.misconceptions.is_empty());
        assert_eq!(report.late, 0);
    }

    #[test]
    fn test_empty_assignment_report() {
        let report = assignment_report(5, None, &[]);
        assert_eq!(report.average_score, None);
        assert_eq!(report.completion_rate(), 0.0);
        assert!(report.questions.is_empty());
    }

    #[test]
    fn test_student_at_risk_rules() {
        use ConfidenceLevel::*;

        let strong = student_report(1, "amy", 2, &[
            submission(1, 9, 90.0, vec![response(10, true, High)]),
            submission(1, 10, 80.0, vec![response(11, true, Medium)]),
        ]);
        assert!(!strong.at_risk);
        assert_eq!(strong.average_score, Some(85.0));

        let low_average = student_report(2, "bo", 1, &[submission(2, 9, 40.0, vec![])]);
        assert!(low_average.at_risk);

        let incomplete = student_report(3, "cy", 3, &[submission(3, 9, 95.0, vec![])]);
        assert!(incomplete.at_risk);

        let confident_wrong = student_report(4, "di", 1, &[submission(
            4,
            9,
            70.0,
            vec![
                response(10, false, High),
                response(11, false, High),
                response(12, false, High),
            ],
        )]);
        assert_eq!(confident_wrong.misconceptions, 3);
        assert!(confident_wrong.at_risk);

        let nothing_assigned = student_report(5, "ed", 0, &[]);
        assert!(!nothing_assigned.at_risk);
        assert_eq!(nothing_assigned.completion_rate(), 1.0);
    }
}
