pub mod analytics;

use anyhow::Result;
use std::collections::HashMap;

use crate::storage::{Assignment, AssignmentStore, AttemptStore, ClassStore, Database};
use analytics::{AssignmentReport, StudentReport, Submission};

/// Latest submission of each student for an assignment
fn submissions_for(db: &Database, assignment_id: i64) -> Result<Vec<Submission>> {
    let attempts = AttemptStore::new(db);
    attempts
        .latest_for_assignment(assignment_id)?
        .into_iter()
        .map(|attempt| {
            Ok(Submission {
                student_id: attempt.user_id,
                submitted_at: attempt.submitted_at,
                score_percent: attempt.score_percent,
                responses: attempts.responses_for_attempt(attempt.id)?,
            })
        })
        .collect()
}

pub fn load_assignment_report(db: &Database, assignment: &Assignment) -> Result<AssignmentReport> {
    let enrolled = ClassStore::new(db).roster(assignment.class_id)?.len();
    let submissions = submissions_for(db, assignment.id)?;
    Ok(analytics::assignment_report(
        enrolled,
        assignment.due_at,
        &submissions,
    ))
}

/// Per-student standing over every assignment in a class, at-risk students first
pub fn load_student_reports(db: &Database, class_id: i64) -> Result<Vec<StudentReport>> {
    let roster = ClassStore::new(db).roster(class_id)?;
    let assignments = AssignmentStore::new(db).list_for_class(class_id)?;

    let mut by_student: HashMap<i64, Vec<Submission>> = HashMap::new();
    for assignment in &assignments {
        for submission in submissions_for(db, assignment.id)? {
            by_student
                .entry(submission.student_id)
                .or_default()
                .push(submission);
        }
    }

    let mut reports: Vec<StudentReport> = roster
        .iter()
        .map(|student| {
            let submissions = by_student.remove(&student.id).unwrap_or_default();
            analytics::student_report(student.id, &student.name, assignments.len(), &submissions)
        })
        .collect();
    reports.sort_by(|a, b| b.at_risk.cmp(&a.at_risk).then(a.name.cmp(&b.name)));

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::ConfidenceLevel;
    use crate::quiz::{Answer, QuizSession};
    use crate::storage::db::test_db;
    use crate::storage::quizzes::sample_quiz;
    use crate::storage::{QuizStore, UserStore};
    use crate::users::Role;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    #[test]
    fn test_reports_use_latest_submission() {
        let (_dir, db) = test_db();
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
        let users = UserStore::new(&db);
        let teacher = users.create("teach", Role::Teacher, now).unwrap();
        let amy = users.create("amy", Role::Student, now).unwrap();
        let bo = users.create("bo", Role::Student, now).unwrap();

        let classes = ClassStore::new(&db);
        let class = classes.create(teacher, "Bio", now).unwrap();
        classes.enroll(class.id, amy, now).unwrap();
        classes.enroll(class.id, bo, now).unwrap();

        let quizzes = QuizStore::new(&db);
        let quiz_id = quizzes.insert(&sample_quiz(teacher), now).unwrap();
        let assignments = AssignmentStore::new(&db);
        let assignment_id = assignments
            .create(class.id, quiz_id, "Cells", Some(now + Duration::days(1)), now)
            .unwrap();
        let assignment = assignments.get(assignment_id).unwrap().unwrap();

        let attempts = AttemptStore::new(&db);
        let take = |first: usize, confidence: ConfidenceLevel, at: DateTime<Utc>| {
            let mut session = QuizSession::new(quizzes.get(quiz_id).unwrap().unwrap()).unwrap();
            session.start(at).unwrap();
            session.answer(at, Answer::Choice(first)).unwrap();
            session.set_confidence(at, confidence).unwrap();
            session.next(at).unwrap();
            session.answer(at, Answer::Bool(true)).unwrap();
            session.set_confidence(at, ConfidenceLevel::High).unwrap();
            session.submit(at).unwrap().clone()
        };

        // amy first fails confidently, then retakes and gets everything right
        let first = take(0, ConfidenceLevel::High, now);
        attempts.record(amy, quiz_id, Some(assignment_id), &first).unwrap();
        let retake = take(1, ConfidenceLevel::High, now + Duration::hours(1));
        attempts.record(amy, quiz_id, Some(assignment_id), &retake).unwrap();

        let report = load_assignment_report(&db, &assignment).unwrap();
        assert_eq!(report.enrolled, 2);
        assert_eq!(report.submitted, 1);
        assert_eq!(report.average_score, Some(100.0));
        assert!(report.misconceptions.is_empty());

        let students = load_student_reports(&db, class.id).unwrap();
        assert_eq!(students.len(), 2);
        // bo has done nothing and sorts first as at risk
        assert_eq!(students[0].student_id, bo);
        assert!(students[0].at_risk);
        assert_eq!(students[1].student_id, amy);
        assert_eq!(students[1].completed, 1);
        assert!(!students[1].at_risk);
    }

    #[test]
    fn test_removed_students_leave_the_report() {
        let (_dir, db) = test_db();
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
        let users = UserStore::new(&db);
        let teacher = users.create("teach", Role::Teacher, now).unwrap();
        let amy = users.create("amy", Role::Student, now).unwrap();
        let bo = users.create("bo", Role::Student, now).unwrap();

        let classes = ClassStore::new(&db);
        let class = classes.create(teacher, "Bio", now).unwrap();
        classes.enroll(class.id, amy, now).unwrap();
        classes.enroll(class.id, bo, now).unwrap();

        let quizzes = QuizStore::new(&db);
        let quiz_id = quizzes.insert(&sample_quiz(teacher), now).unwrap();
        let assignments = AssignmentStore::new(&db);
        let assignment_id = assignments
            .create(class.id, quiz_id, "Cells", None, now)
            .unwrap();
        let assignment = assignments.get(assignment_id).unwrap().unwrap();

        let mut session = QuizSession::new(quizzes.get(quiz_id).unwrap().unwrap()).unwrap();
        session.start(now).unwrap();
        session.answer(now, Answer::Choice(1)).unwrap();
        session.set_confidence(now, ConfidenceLevel::High).unwrap();
        session.next(now).unwrap();
        session.answer(now, Answer::Bool(true)).unwrap();
        session.set_confidence(now, ConfidenceLevel::High).unwrap();
        let outcome = session.submit(now).unwrap().clone();
        AttemptStore::new(&db)
            .record(amy, quiz_id, Some(assignment_id), &outcome)
            .unwrap();

        assert!(classes.remove_student(class.id, amy).unwrap());

        let report = load_assignment_report(&db, &assignment).unwrap();
        assert_eq!(report.enrolled, 1);
        assert_eq!(report.submitted, 0);
        assert_eq!(report.completion_rate(), 0.0);
        assert_eq!(report.average_score, None);

        let students = load_student_reports(&db, class.id).unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].student_id, bo);
        assert_eq!(students[0].completed, 0);
    }
}
