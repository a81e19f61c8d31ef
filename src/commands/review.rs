use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::collections::BTreeMap;

use super::quiz::{prompt_answer, prompt_confidence};
use super::{Workspace, cancelled, print_section};
use crate::learning::{ConfidenceLevel, LearningState, ReviewSchedule, classify};
use crate::quiz::grading::grade;
use crate::quiz::{Answer, Question};
use crate::storage::{AttemptStore, Database, ReviewStore, StandaloneResponse};

pub async fn run() -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let store = ReviewStore::new(&ws.db);

    let due_count = store.count_due(user.id, ws.now())?;
    if due_count == 0 {
        println!("\n{} Nothing is due for review right now.", "✓".green());
        println!(
            "  Take a quiz with {} to fill your review queue.",
            "quizwhiz take".cyan()
        );
        return Ok(());
    }

    println!();
    println!(
        "    {}",
        "╭──────────────────────────────────────────────────────╮".blue()
    );
    println!(
        "    {}          {}          {}",
        "│".blue(),
        "🔁 SPACED REPETITION REVIEW 🔁".bold().white(),
        "│".blue()
    );
    println!(
        "    {}   {} questions due for review                    {}",
        "│".blue(),
        due_count.to_string().yellow().bold(),
        "│".blue()
    );
    println!(
        "    {}",
        "╰──────────────────────────────────────────────────────╯".blue()
    );
    println!();

    let items = store.due(user.id, ws.now(), ws.config.review.session_size)?;
    let total = items.len();
    let mut states: BTreeMap<LearningState, usize> = BTreeMap::new();

    for (i, item) in items.iter().enumerate() {
        let question = &item.question;
        println!(
            "{} [{}/{}] {} {}",
            "Review".bold().cyan(),
            i + 1,
            total,
            format!("({})", question.kind.label()).dimmed(),
            format!("strength {}", item.schedule.strength).dimmed()
        );
        println!("  {}", question.prompt);
        println!();

        let answered = prompt_answer(question).and_then(|a| Ok((a, prompt_confidence()?)));
        let (answer, confidence) = match answered {
            Ok(pair) => pair,
            Err(e) if cancelled(&e) => {
                println!("\n{} Review paused. Answers so far are saved.", "⊘".yellow());
                break;
            }
            Err(e) => return Err(e),
        };

        let reviewed = record_review(&ws.db, user.id, question, &answer, confidence, ws.now())?;
        *states.entry(reviewed.state).or_insert(0) += 1;

        if reviewed.correct {
            println!("  {} Correct! {}", "✓".green().bold(), reviewed.state.label().dimmed());
        } else {
            println!(
                "  {} {} {}",
                "✗".red().bold(),
                "Answer:".dimmed(),
                question.kind.answer_text().green()
            );
            println!("  {}", reviewed.state.recommendation().dimmed());
        }
        println!(
            "  {}",
            format!(
                "Next review {} (strength {})",
                if reviewed.schedule.is_due(ws.now() + chrono::Duration::days(1)) {
                    "within a day".to_string()
                } else {
                    reviewed.schedule.next_review.format("%Y-%m-%d %H:%M").to_string()
                },
                reviewed.schedule.strength
            )
            .dimmed()
        );
        println!("{}", "─".repeat(50).dimmed());
    }

    if !states.is_empty() {
        print_section("Review complete");
        for (state, count) in &states {
            println!("  {:<14} {}", state.label(), count.to_string().bold());
        }
        let left = store.count_due(user.id, ws.now())?;
        if left > 0 {
            println!("\n  {} more due. Run {} again.", left, "quizwhiz review".cyan());
        }
    }

    Ok(())
}

/// Result of one reviewed question
#[derive(Debug)]
struct Reviewed {
    correct: bool,
    state: LearningState,
    schedule: ReviewSchedule,
}

/// Grade a review answer, reschedule the question and log the response
fn record_review(
    db: &Database,
    user_id: i64,
    question: &Question,
    answer: &Answer,
    confidence: ConfidenceLevel,
    now: DateTime<Utc>,
) -> Result<Reviewed> {
    let question_id = question
        .id
        .ok_or_else(|| anyhow::anyhow!("Review question has no ID"))?;
    let correct = grade(question, answer);
    let state = classify(correct, confidence);

    let schedule = ReviewStore::new(db).apply_state(user_id, question_id, state, now)?;
    AttemptStore::new(db).record_response(
        user_id,
        &StandaloneResponse {
            question_id,
            answer: Some(answer),
            confidence,
            correct,
            state,
        },
        now,
    )?;

    Ok(Reviewed {
        correct,
        state,
        schedule,
    })
}
