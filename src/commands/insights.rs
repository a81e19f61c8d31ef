use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::collections::BTreeMap;

use super::{Workspace, confirm, print_section};
use crate::learning::analytics::{
    self, Calibration, ConceptStats, MisconceptionSummary, ResponseRecord,
};
use crate::learning::LearningState;
use crate::llm;
use crate::notifications::Notifier;
use crate::render::render_markdown;
use crate::storage::{AttemptRecord, AttemptStore, Database, QuizStore, ReviewStore};

const RECENT_ATTEMPTS: usize = 5;
const PLAN_CONCEPTS: usize = 3;

/// Everything shown on the insights screen for one learner
#[derive(Debug)]
struct Insights {
    answered: usize,
    accuracy: f64,
    calibration: Calibration,
    states: BTreeMap<LearningState, usize>,
    concepts: Vec<ConceptStats>,
    misconceptions: Vec<MisconceptionSummary>,
    streak: u32,
    due: i64,
    mastered: usize,
    recent: Vec<AttemptRecord>,
}

fn gather(db: &Database, user_id: i64, now: DateTime<Utc>) -> Result<Insights> {
    let attempts = AttemptStore::new(db);
    let reviews = ReviewStore::new(db);
    let records: Vec<ResponseRecord> = attempts.responses_for_user(user_id)?;
    let days = attempts.activity_days(user_id)?;

    let mut recent = attempts.list_for_user(user_id)?;
    recent.truncate(RECENT_ATTEMPTS);

    Ok(Insights {
        answered: records.len(),
        accuracy: analytics::accuracy(&records),
        calibration: analytics::calibration(&records),
        states: analytics::state_distribution(&records),
        concepts: analytics::concept_breakdown(&records),
        misconceptions: analytics::misconceptions(&records),
        streak: analytics::study_streak(&days, now.date_naive()),
        due: reviews.count_due(user_id, now)?,
        mastered: reviews.mastered_count(user_id)?,
        recent,
    })
}

pub async fn run() -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let now = ws.now();

    Notifier::new(&ws.db).reviews_due(user.id, now)?;
    let insights = gather(&ws.db, user.id, now)?;

    println!();
    println!(
        "    {}",
        "╭──────────────────────────────────────────────────────╮".cyan()
    );
    println!(
        "    {}              {}              {}",
        "│".cyan(),
        "📊 LEARNING INSIGHTS 📊".bold().white(),
        "│".cyan()
    );
    println!(
        "    {}",
        "╰──────────────────────────────────────────────────────╯".cyan()
    );

    if insights.answered == 0 {
        println!("\n{}", "No answers recorded yet.".dimmed());
        println!("Take a quiz with {} to see insights.", "quizwhiz take".cyan());
        return Ok(());
    }

    print_overview(&insights);
    print_calibration(&insights.calibration);
    print_states(&insights.states);
    print_concepts(&insights.concepts);
    print_misconceptions(&insights.misconceptions);
    print_recent(&insights.recent);

    let plan = study_plan(&insights.concepts);
    if !plan.is_empty() {
        print_section("Study plan");
        render_markdown(&plan);
    }

    if let Some(top) = insights
        .misconceptions
        .iter()
        .find(|m| m.latest_state == LearningState::Misconception)
        && ws.config.has_api_key()
        && confirm(&format!("Ask the tutor about \"{}\"?", top.prompt))?
    {
        let client = llm::client_from_config(&ws.config)?;
        if let Some(question) = QuizStore::new(&ws.db).get_question(top.question_id)? {
            print_section("Tutor");
            llm::explain_misconception(&client, &question, None).await?;
        }
    }

    Ok(())
}

fn print_overview(insights: &Insights) {
    print_section("Overview");
    println!(
        "  {} {}   {} {:.0}%",
        "Answered:".bold(),
        insights.answered,
        "Accuracy:".bold(),
        insights.accuracy * 100.0
    );
    println!(
        "  {} {} day{}",
        "Study streak:".bold(),
        insights.streak.to_string().yellow().bold(),
        if insights.streak == 1 { "" } else { "s" }
    );
    println!(
        "  {} {}   {} {}",
        "Due for review:".bold(),
        insights.due,
        "Mastered:".bold(),
        insights.mastered.to_string().green()
    );
}

fn print_calibration(calibration: &Calibration) {
    print_section("Confidence calibration");
    for bucket in &calibration.buckets {
        let accuracy = bucket
            .accuracy()
            .map(|a| format!("{:.0}% correct", a * 100.0))
            .unwrap_or_else(|| "no answers".to_string());
        println!(
            "  {:<7} {:>3} answers  {}",
            bucket.level.as_str(),
            bucket.answered,
            accuracy.dimmed()
        );
    }
    println!("  {}", calibration.label().describe().bold());
}

fn print_states(states: &BTreeMap<LearningState, usize>) {
    print_section("Learning states");
    let total: usize = states.values().sum();
    for (state, count) in states {
        let share = *count as f64 / total.max(1) as f64;
        let bar = "█".repeat((share * 30.0).round() as usize);
        println!(
            "  {:<14} {:>3}  {}",
            state.label(),
            count,
            if state.is_correct() { bar.green() } else { bar.red() }
        );
    }
}

fn print_concepts(concepts: &[ConceptStats]) {
    print_section("Concepts (weakest first)");
    for concept in concepts {
        let misconceptions = if concept.misconceptions > 0 {
            format!(", {} misconception(s)", concept.misconceptions)
                .red()
                .to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<24} {:>3.0}% of {}{}  {}",
            concept.concept,
            concept.accuracy() * 100.0,
            concept.attempts,
            misconceptions,
            concept.dominant_state.label().dimmed()
        );
    }
}

fn print_misconceptions(open: &[MisconceptionSummary]) {
    if open.is_empty() {
        return;
    }
    print_section("Needs attention");
    for item in open {
        println!(
            "  {} {} {}",
            format!("[{}]", item.priority()).red(),
            item.prompt,
            format!("({}, missed {}x)", item.concept, item.occurrences).dimmed()
        );
    }
}

fn print_recent(recent: &[AttemptRecord]) {
    if recent.is_empty() {
        return;
    }
    print_section("Recent quizzes");
    for attempt in recent {
        println!(
            "  {} {} {:.0}% ({}/{})",
            attempt.submitted_at.format("%Y-%m-%d").to_string().dimmed(),
            attempt.quiz_title,
            attempt.score_percent,
            attempt.correct,
            attempt.total
        );
    }
}

/// Markdown advice for the weakest concepts
fn study_plan(concepts: &[ConceptStats]) -> String {
    concepts
        .iter()
        .filter(|c| !c.dominant_state.is_correct() || c.misconceptions > 0)
        .take(PLAN_CONCEPTS)
        .map(|c| {
            format!(
                "* **{}** ({:.0}% correct): {}\n",
                c.concept,
                c.accuracy() * 100.0,
                c.dominant_state.recommendation()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::ConfidenceLevel;
    use crate::quiz::{Answer, QuizSession};
    use crate::storage::db::test_db;
    use crate::storage::quizzes::sample_quiz;
    use crate::storage::UserStore;
    use crate::users::Role;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_gather_summarizes_history() {
        let (_dir, db) = test_db();
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 9, 0, 0).unwrap();
        let user_id = UserStore::new(&db).create("amy", Role::Student, now).unwrap();
        let quizzes = QuizStore::new(&db);
        let quiz_id = quizzes.insert(&sample_quiz(user_id), now).unwrap();

        let attempts = AttemptStore::new(&db);
        let reviews = ReviewStore::new(&db);
        for day in 0..2 {
            let at = now + Duration::days(day);
            let mut session = QuizSession::new(quizzes.get(quiz_id).unwrap().unwrap()).unwrap();
            session.start(at).unwrap();
            session.answer(at, Answer::Choice(0)).unwrap();
            session.set_confidence(at, ConfidenceLevel::High).unwrap();
            session.next(at).unwrap();
            session.answer(at, Answer::Bool(true)).unwrap();
            session.set_confidence(at, ConfidenceLevel::High).unwrap();
            let outcome = session.submit(at).unwrap().clone();
            attempts.record(user_id, quiz_id, None, &outcome).unwrap();
            for result in &outcome.results {
                reviews
                    .apply_state(user_id, result.question.id.unwrap(), result.state, at)
                    .unwrap();
            }
        }

        let insights = gather(&db, user_id, now + Duration::days(1)).unwrap();
        assert_eq!(insights.answered, 4);
        assert!((insights.accuracy - 0.5).abs() < 1e-9);
        assert_eq!(insights.streak, 2);
        assert_eq!(insights.states.get(&LearningState::Misconception), Some(&2));
        assert_eq!(insights.misconceptions.len(), 1);
        assert_eq!(insights.recent.len(), 2);
    }

    #[test]
    fn test_study_plan_skips_strong_concepts() {
        let concepts = vec![
            ConceptStats {
                concept: "osmosis".to_string(),
                attempts: 4,
                correct: 1,
                misconceptions: 2,
                dominant_state: LearningState::Misconception,
            },
            ConceptStats {
                concept: "cells".to_string(),
                attempts: 4,
                correct: 4,
                misconceptions: 0,
                dominant_state: LearningState::Mastered,
            },
        ];

        let plan = study_plan(&concepts);
        assert!(plan.contains("**osmosis** (25% correct)"));
        assert!(!plan.contains("cells"));
    }
}
