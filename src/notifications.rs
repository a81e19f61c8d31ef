use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::fmt;
use std::str::FromStr;

use crate::storage::{
    Assignment, AssignmentStore, AttemptStore, ClassStore, Database, NotificationStore,
    ReviewStore,
};

/// How far ahead a deadline triggers a reminder
pub const DUE_SOON_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    AssignmentCreated,
    AssignmentSubmitted,
    DueSoon,
    ReviewsDue,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::AssignmentCreated,
        NotificationKind::AssignmentSubmitted,
        NotificationKind::DueSoon,
        NotificationKind::ReviewsDue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AssignmentCreated => "assignment_created",
            NotificationKind::AssignmentSubmitted => "assignment_submitted",
            NotificationKind::DueSoon => "due_soon",
            NotificationKind::ReviewsDue => "reviews_due",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NotificationKind::AssignmentCreated => "New assignment",
            NotificationKind::AssignmentSubmitted => "Submission",
            NotificationKind::DueSoon => "Due soon",
            NotificationKind::ReviewsDue => "Reviews due",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NotificationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        NotificationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown notification kind '{}'", s))
    }
}

fn assignment_ref(assignment_id: i64) -> String {
    format!("assignment:{}", assignment_id)
}

/// Emits notifications for classroom and study events
pub struct Notifier<'a> {
    db: &'a Database,
}

impl<'a> Notifier<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Tell every enrolled student about a new assignment. Returns how many were notified.
    pub fn assignment_created(&self, assignment: &Assignment, now: DateTime<Utc>) -> Result<usize> {
        let roster = ClassStore::new(self.db).roster(assignment.class_id)?;
        let store = NotificationStore::new(self.db);

        let message = match assignment.due_at {
            Some(due) => format!(
                "{}: '{}' is due {}",
                assignment.class_name,
                assignment.title,
                due.format("%Y-%m-%d %H:%M UTC")
            ),
            None => format!("{}: '{}' was assigned", assignment.class_name, assignment.title),
        };
        let reference = assignment_ref(assignment.id);

        for student in &roster {
            store.push(
                student.id,
                NotificationKind::AssignmentCreated,
                &message,
                Some(&reference),
                now,
            )?;
        }

        info!(
            "Notified {} students about assignment {}",
            roster.len(),
            assignment.id
        );
        Ok(roster.len())
    }

    /// Tell the teacher a student submitted
    pub fn assignment_submitted(
        &self,
        assignment: &Assignment,
        student_name: &str,
        score_percent: f64,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let late = assignment.is_overdue(now);
        let message = format!(
            "{} submitted '{}' ({:.0}%){}",
            student_name,
            assignment.title,
            score_percent,
            if late { ", late" } else { "" }
        );

        NotificationStore::new(self.db).push(
            assignment.teacher_id,
            NotificationKind::AssignmentSubmitted,
            &message,
            Some(&assignment_ref(assignment.id)),
            now,
        )
    }

    /// Remind students of unsubmitted work due within the next day.
    ///
    /// Each (student, assignment) pair is reminded at most once.
    pub fn refresh_due_reminders(&self, now: DateTime<Utc>) -> Result<usize> {
        let upcoming = AssignmentStore::new(self.db)
            .due_between(now, now + Duration::hours(DUE_SOON_WINDOW_HOURS))?;
        let classes = ClassStore::new(self.db);
        let attempts = AttemptStore::new(self.db);
        let store = NotificationStore::new(self.db);
        let mut sent = 0;

        for assignment in &upcoming {
            let Some(due) = assignment.due_at else {
                continue;
            };
            let hours_left = (due - now).num_hours();
            let message = format!(
                "{}: '{}' is due in {}",
                assignment.class_name,
                assignment.title,
                if hours_left < 1 {
                    "less than an hour".to_string()
                } else {
                    format!("{} hours", hours_left)
                }
            );
            let reference = assignment_ref(assignment.id);

            for student in classes.roster(assignment.class_id)? {
                if attempts.has_submitted(student.id, assignment.id)? {
                    continue;
                }
                if store
                    .push_unique(student.id, NotificationKind::DueSoon, &message, &reference, now)?
                    .is_some()
                {
                    sent += 1;
                }
            }
        }

        debug!("Sent {} due-soon reminders", sent);
        Ok(sent)
    }

    /// At most one "reviews due" notice per user per day
    pub fn reviews_due(&self, user_id: i64, now: DateTime<Utc>) -> Result<Option<i64>> {
        let due = ReviewStore::new(self.db).count_due(user_id, now)?;
        if due == 0 {
            return Ok(None);
        }

        let message = format!(
            "{} question{} ready for review",
            due,
            if due == 1 { " is" } else { "s are" }
        );
        let reference = format!("reviews:{}", now.date_naive());

        NotificationStore::new(self.db).push_unique(
            user_id,
            NotificationKind::ReviewsDue,
            &message,
            &reference,
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::LearningState;
    use crate::quiz::QuizSession;
    use crate::storage::db::test_db;
    use crate::storage::quizzes::sample_quiz;
    use crate::storage::{QuizStore, UserStore};
    use crate::users::Role;
    use chrono::TimeZone;

    struct Fixture {
        teacher: i64,
        students: Vec<i64>,
        assignment: Assignment,
    }

    fn setup(db: &Database, now: DateTime<Utc>, due: Option<DateTime<Utc>>) -> Fixture {
        let users = UserStore::new(db);
        let teacher = users.create("teach", Role::Teacher, now).unwrap();
        let students = vec![
            users.create("amy", Role::Student, now).unwrap(),
            users.create("bo", Role::Student, now).unwrap(),
        ];

        let classes = ClassStore::new(db);
        let class = classes.create(teacher, "Physics", now).unwrap();
        for s in &students {
            classes.enroll(class.id, *s, now).unwrap();
        }

        let quiz_id = QuizStore::new(db).insert(&sample_quiz(teacher), now).unwrap();
        let assignments = AssignmentStore::new(db);
        let id = assignments
            .create(class.id, quiz_id, "Forces", due, now)
            .unwrap();

        Fixture {
            teacher,
            students,
            assignment: assignments.get(id).unwrap().unwrap(),
        }
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
        assert!("spam".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn test_assignment_fan_out_and_submission() {
        let (_dir, db) = test_db();
        let now = Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap();
        let fx = setup(&db, now, None);
        let notifier = Notifier::new(&db);
        let store = NotificationStore::new(&db);

        assert_eq!(notifier.assignment_created(&fx.assignment, now).unwrap(), 2);
        for s in &fx.students {
            let inbox = store.list(*s, false).unwrap();
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].kind, NotificationKind::AssignmentCreated);
            assert!(inbox[0].message.contains("Forces"));
        }
        assert_eq!(store.unread_count(fx.teacher).unwrap(), 0);

        notifier
            .assignment_submitted(&fx.assignment, "amy", 85.0, now)
            .unwrap();
        let inbox = store.list(fx.teacher, false).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message, "amy submitted 'Forces' (85%)");
    }

    #[test]
    fn test_due_reminders_skip_submitted_and_deduplicate() {
        let (_dir, db) = test_db();
        let now = Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap();
        let fx = setup(&db, now, Some(now + Duration::hours(30)));
        let notifier = Notifier::new(&db);

        // Not yet inside the window
        assert_eq!(notifier.refresh_due_reminders(now).unwrap(), 0);

        // amy submits before the reminder goes out
        let quiz = QuizStore::new(&db)
            .get(fx.assignment.quiz_id)
            .unwrap()
            .unwrap();
        let mut session = QuizSession::new(quiz).unwrap();
        session.start(now).unwrap();
        let outcome = session.submit(now + Duration::minutes(20)).unwrap().clone();
        AttemptStore::new(&db)
            .record(fx.students[0], fx.assignment.quiz_id, Some(fx.assignment.id), &outcome)
            .unwrap();

        let later = now + Duration::hours(10);
        assert_eq!(notifier.refresh_due_reminders(later).unwrap(), 1);
        assert_eq!(
            notifier
                .refresh_due_reminders(later + Duration::hours(1))
                .unwrap(),
            0
        );

        let store = NotificationStore::new(&db);
        assert_eq!(store.unread_count(fx.students[0]).unwrap(), 0);
        let inbox = store.list(fx.students[1], false).unwrap();
        assert_eq!(inbox[0].kind, NotificationKind::DueSoon);
        assert!(inbox[0].message.contains("20 hours"));
    }

    #[test]
    fn test_reviews_due_once_per_day() {
        let (_dir, db) = test_db();
        let now = Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap();
        let fx = setup(&db, now, None);
        let student = fx.students[0];
        let notifier = Notifier::new(&db);

        assert!(notifier.reviews_due(student, now).unwrap().is_none());

        let quiz = QuizStore::new(&db)
            .get(fx.assignment.quiz_id)
            .unwrap()
            .unwrap();
        let reviews = ReviewStore::new(&db);
        for question in &quiz.questions {
            reviews
                .apply_state(student, question.id.unwrap(), LearningState::KnowledgeGap, now)
                .unwrap();
        }

        let next_day = now + Duration::days(1);
        assert!(notifier.reviews_due(student, next_day).unwrap().is_some());
        assert!(notifier
            .reviews_due(student, next_day + Duration::hours(3))
            .unwrap()
            .is_none());
        assert!(notifier
            .reviews_due(student, next_day + Duration::days(1))
            .unwrap()
            .is_some());

        let inbox = NotificationStore::new(&db).list(student, false).unwrap();
        assert_eq!(inbox[0].message, "2 questions are ready for review");
    }
}
