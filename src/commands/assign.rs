use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use colored::Colorize;
use inquire::{Select, Text};

use super::{Workspace, cancelled, confirm, prompt_id};
use crate::notifications::Notifier;
use crate::storage::{AssignmentStore, ClassStore, QuizStore};

/// Parse `YYYY-MM-DD HH:MM` (UTC); a bare date means the end of that day
pub fn parse_due(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(at) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M") {
        return Ok(at.and_utc());
    }
    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let end = NaiveTime::from_hms_opt(23, 59, 0)
            .ok_or_else(|| anyhow::anyhow!("Invalid end-of-day time"))?;
        return Ok(day.and_time(end).and_utc());
    }
    anyhow::bail!("Could not read due date '{}'. Use YYYY-MM-DD or YYYY-MM-DD HH:MM", input)
}

pub async fn create(
    class_id: Option<i64>,
    quiz_id: Option<i64>,
    title: Option<String>,
    due: Option<String>,
) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    user.require_teacher("create assignments")?;
    let now = ws.now();

    let classes = ClassStore::new(&ws.db);
    let class_id = prompt_id(class_id, "Class ID:")?;
    let Some(class) = classes.get(class_id)?.filter(|c| c.teacher_id == user.id) else {
        println!("{} Class {} not found among your classes", "✗".red(), class_id);
        return Ok(());
    };

    let quizzes = QuizStore::new(&ws.db);
    let quiz_id = match quiz_id {
        Some(id) => id,
        None => {
            let mine = quizzes.list(user.id)?;
            if mine.is_empty() {
                anyhow::bail!("You have no quizzes. Run 'quizwhiz generate' first.");
            }
            let labels: Vec<String> = mine
                .iter()
                .map(|q| format!("[{}] {} ({} questions)", q.id, q.title, q.question_count))
                .collect();
            let picked = Select::new("Quiz to assign:", labels.clone()).prompt()?;
            let index = labels.iter().position(|l| *l == picked).unwrap_or(0);
            mine[index].id
        }
    };
    let Some(quiz) = quizzes.get(quiz_id)?.filter(|q| q.owner_id == user.id) else {
        println!("{} Quiz {} not found", "✗".red(), quiz_id);
        return Ok(());
    };

    let title = match title {
        Some(t) => t,
        None => Text::new("Assignment title:")
            .with_default(&quiz.title)
            .prompt()?,
    };

    let due_input = match due {
        Some(d) => d,
        None => {
            let prompted = Text::new("Due date (optional):")
                .with_help_message("YYYY-MM-DD or YYYY-MM-DD HH:MM in UTC, Enter for none")
                .prompt();
            let Some(input) = prompted_due(prompted)? else {
                println!("{}", "Cancelled, nothing was assigned.".dimmed());
                return Ok(());
            };
            input
        }
    };
    let due_at = if due_input.trim().is_empty() {
        None
    } else {
        Some(parse_due(&due_input)?)
    };

    let store = AssignmentStore::new(&ws.db);
    let id = store.create(class.id, quiz_id, &title, due_at, now)?;
    let assignment = store
        .get(id)?
        .ok_or_else(|| anyhow::anyhow!("Assignment {} vanished after insert", id))?;
    let notified = Notifier::new(&ws.db).assignment_created(&assignment, now)?;

    println!(
        "{} Assigned '{}' to {} ({} student(s) notified)",
        "✓".green(),
        assignment.title.bold(),
        class.name,
        notified
    );
    Ok(())
}

pub async fn list() -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let now = ws.now();
    Notifier::new(&ws.db).refresh_due_reminders(now)?;

    let store = AssignmentStore::new(&ws.db);

    if user.is_teacher() {
        let classes = ClassStore::new(&ws.db).list_for_teacher(user.id)?;
        let mut any = false;
        for class in &classes {
            let assignments = store.list_for_class(class.id)?;
            if assignments.is_empty() {
                continue;
            }
            any = true;
            println!("\n{}", class.name.bold().cyan());
            for assignment in &assignments {
                println!(
                    "  {} {} {} {}",
                    format!("[{}]", assignment.id).dimmed(),
                    assignment.title,
                    due_label(assignment.due_at, now),
                    format!("(set {})", assignment.created_at.format("%Y-%m-%d")).dimmed()
                );
            }
        }
        if !any {
            println!("{}", "No assignments yet.".dimmed());
        }
        return Ok(());
    }

    let assignments = store.list_for_student(user.id)?;
    if assignments.is_empty() {
        println!("{}", "No assignments.".dimmed());
        return Ok(());
    }

    for item in &assignments {
        let status = match item.latest_score {
            Some(score) => format!("done {:.0}%", score).green(),
            None if item.assignment.is_overdue(now) => "overdue".red().bold(),
            None => "to do".yellow(),
        };
        println!(
            "  {} {} {} {} {}",
            format!("[{}]", item.assignment.id).dimmed(),
            item.assignment.title.bold(),
            format!("({})", item.assignment.class_name).dimmed(),
            due_label(item.assignment.due_at, now),
            status
        );
    }
    println!(
        "\nStart one with {}",
        "quizwhiz assign take <id>".cyan()
    );
    Ok(())
}

/// `Ok(None)` when the learner backed out of the due date prompt
fn prompted_due(prompted: Result<String, inquire::InquireError>) -> Result<Option<String>> {
    match prompted {
        Ok(input) => Ok(Some(input)),
        Err(e) => {
            let e = anyhow::Error::from(e);
            if cancelled(&e) {
                Ok(None)
            } else {
                Err(e)
            }
        }
    }
}

fn due_label(due_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match due_at {
        None => "no due date".dimmed().to_string(),
        Some(due) if due < now => format!("was due {}", due.format("%Y-%m-%d %H:%M"))
            .red()
            .to_string(),
        Some(due) => format!("due {}", due.format("%Y-%m-%d %H:%M")),
    }
}

/// Withdraw an assignment from one of your classes
pub async fn delete(assignment_id: Option<i64>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    user.require_teacher("delete assignments")?;
    let assignment_id = prompt_id(assignment_id, "Assignment ID to delete:")?;

    let store = AssignmentStore::new(&ws.db);
    let Some(assignment) = store
        .get(assignment_id)?
        .filter(|a| a.teacher_id == user.id)
    else {
        println!("{} Assignment {} not found among your classes", "✗".red(), assignment_id);
        return Ok(());
    };

    if !confirm(&format!("Delete '{}' for {}?", assignment.title, assignment.class_name))? {
        println!("{}", "Cancelled.".dimmed());
        return Ok(());
    }

    store.delete(assignment.id)?;
    println!("{} Deleted assignment '{}'", "✓".green(), assignment.title);
    Ok(())
}

/// Take an assignment's quiz as an enrolled student
pub async fn take(assignment_id: Option<i64>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let assignment_id = prompt_id(assignment_id, "Assignment ID:")?;

    let Some(assignment) = AssignmentStore::new(&ws.db).get(assignment_id)? else {
        println!("{} Assignment {} not found", "✗".red(), assignment_id);
        return Ok(());
    };
    if !ClassStore::new(&ws.db).is_enrolled(assignment.class_id, user.id)? {
        anyhow::bail!("You are not enrolled in '{}'", assignment.class_name);
    }

    if assignment.is_overdue(ws.now()) {
        println!(
            "{} This assignment is past due; your submission will be marked late.",
            "⚠".yellow()
        );
    }

    let quiz = QuizStore::new(&ws.db)
        .get(assignment.quiz_id)?
        .ok_or_else(|| anyhow::anyhow!("The quiz for this assignment was deleted"))?;

    super::quiz::run_quiz(&ws, &user, quiz, Some(&assignment)).await
}
