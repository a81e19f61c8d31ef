use anyhow::Result;
use colored::Colorize;
use inquire::{Select, Text};

use super::{Workspace, cancelled, confirm, format_duration, print_section, prompt_id};
use crate::error::QuizError;
use crate::learning::{ConfidenceLevel, LearningState};
use crate::llm;
use crate::notifications::Notifier;
use crate::quiz::model::option_letter;
use crate::quiz::{
    Advance, Answer, Question, QuestionKind, Quiz, QuizOutcome, QuizSession, SubmitReason,
};
use crate::render::render_markdown;
use crate::storage::{Assignment, AttemptStore, Database, QuizStore, ReviewStore};
use crate::users::User;

/// List the current profile's saved quizzes
pub async fn list() -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let quizzes = QuizStore::new(&ws.db).list(user.id)?;

    if quizzes.is_empty() {
        println!("{}", "No quizzes yet.".dimmed());
        println!("Use {} to create one.", "quizwhiz generate".cyan());
        return Ok(());
    }

    println!("\n{} ({} quizzes)\n", "Quizzes".bold(), quizzes.len());
    for quiz in &quizzes {
        let limit = quiz
            .time_limit
            .map(|d| format!(", {} min", d.num_minutes()))
            .unwrap_or_default();
        println!(
            "  {} {} {} {}",
            format!("[{}]", quiz.id).dimmed(),
            quiz.title.bold(),
            format!("({} questions, {}{})", quiz.question_count, quiz.difficulty, limit).dimmed(),
            quiz.created_at.format("%Y-%m-%d").to_string().dimmed()
        );
    }

    Ok(())
}

/// Delete one of your own quizzes along with its questions
pub async fn delete(quiz_id: Option<i64>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let quiz_id = prompt_id(quiz_id, "Quiz ID to delete:")?;

    if !confirm(&format!("Delete quiz {}? Its review history goes too.", quiz_id))? {
        println!("{}", "Cancelled.".dimmed());
        return Ok(());
    }

    if QuizStore::new(&ws.db).delete(user.id, quiz_id)? {
        println!("{} Deleted quiz {}", "✓".green(), quiz_id);
    } else {
        println!("{} Quiz not found: {}", "✗".red(), quiz_id);
    }
    Ok(())
}

/// Take one of your own quizzes
pub async fn take(quiz_id: Option<i64>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let store = QuizStore::new(&ws.db);

    let quiz_id = match quiz_id {
        Some(id) => id,
        None => {
            let quizzes = store.list(user.id)?;
            if quizzes.is_empty() {
                println!(
                    "{} No quizzes yet. Run {} first.",
                    "⊘".yellow(),
                    "quizwhiz generate".cyan()
                );
                return Ok(());
            }
            let labels: Vec<String> = quizzes
                .iter()
                .map(|q| format!("[{}] {} ({} questions)", q.id, q.title, q.question_count))
                .collect();
            let picked = Select::new("Which quiz?", labels.clone()).prompt()?;
            let index = labels.iter().position(|l| *l == picked).unwrap_or(0);
            quizzes[index].id
        }
    };

    let Some(quiz) = store.get(quiz_id)?.filter(|q| q.owner_id == user.id) else {
        println!("{} Quiz not found: {}", "✗".red(), quiz_id);
        return Ok(());
    };

    run_quiz(&ws, &user, quiz, None).await
}

/// Walk the learner through a quiz, then grade, store and report it
pub(super) async fn run_quiz(
    ws: &Workspace,
    user: &User,
    quiz: Quiz,
    assignment: Option<&Assignment>,
) -> Result<()> {
    let quiz_id = quiz
        .id
        .ok_or_else(|| anyhow::anyhow!("Quiz must be saved before it can be taken"))?;

    println!();
    println!("{} {}", "Quiz:".bold(), quiz.title.bold().cyan());
    println!(
        "{}",
        format!(
            "{} questions, {} difficulty{}",
            quiz.questions.len(),
            quiz.difficulty,
            quiz.time_limit_minutes()
                .map(|m| format!(", {} minute limit", m))
                .unwrap_or_default()
        )
        .dimmed()
    );
    println!(
        "{}",
        "After each answer, say how sure you are. Esc leaves the quiz.".dimmed()
    );

    let mut session = QuizSession::new(quiz)?;
    session.start(ws.now())?;

    match answer_loop(ws, &mut session) {
        Ok(()) => {}
        Err(e) if cancelled(&e) => {
            println!("\n{} Quiz abandoned, nothing was saved.", "⊘".yellow());
            return Ok(());
        }
        Err(e) => return Err(e),
    }

    log::debug!("Answer loop finished in phase {:?}", session.phase());
    let outcome = match session.outcome() {
        Some(outcome) => outcome.clone(),
        None => session.submit(ws.now())?.clone(),
    };

    if outcome.reason == SubmitReason::TimeExpired {
        println!(
            "\n{} Time is up. Your quiz was submitted with {} unanswered question(s).",
            "⏰".yellow(),
            outcome.unanswered()
        );
    }

    persist_outcome(&ws.db, user, quiz_id, assignment, &outcome, ws.now())?;
    print_results(&outcome);
    offer_tutor(ws, &outcome).await;

    Ok(())
}

/// Ask every question, then let the learner revise before submitting.
///
/// Returns once the session is ready to submit or was closed by the timer.
fn answer_loop(ws: &Workspace, session: &mut QuizSession) -> Result<()> {
    loop {
        if ask_current(ws, session)? {
            return Ok(());
        }
        match session.next(ws.now()) {
            Ok(Advance::Moved(_)) => continue,
            Ok(Advance::ReadyToSubmit) => break,
            Err(QuizError::TimeExpired) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }

    loop {
        let options = vec!["Submit quiz", "Change an answer", "Back one question"];
        let status = format!(
            "{} of {} questions answered (on question {}).",
            session.answered_count(),
            session.len(),
            session.current().0 + 1
        );
        match Select::new(&status, options).prompt()? {
            "Submit quiz" => return Ok(()),
            "Back one question" => {
                match session.previous(ws.now()) {
                    Ok(_) => {}
                    Err(QuizError::NoPreviousQuestion) => {
                        println!("{}", "Already on the first question.".dimmed());
                        continue;
                    }
                    Err(QuizError::TimeExpired) => return Ok(()),
                    Err(e) => return Err(e.into()),
                }
                if ask_current(ws, session)? {
                    return Ok(());
                }
                continue;
            }
            _ => {}
        }

        let labels: Vec<String> = session
            .quiz()
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}. {}", i + 1, q.prompt))
            .collect();
        let picked = Select::new("Which question?", labels.clone()).prompt()?;
        let index = labels.iter().position(|l| *l == picked).unwrap_or(0);
        if expired(session.jump_to(ws.now(), index))? || ask_current(ws, session)? {
            return Ok(());
        }
    }
}

/// Prompt for the current question's answer and confidence.
///
/// `Ok(true)` when the timer closed the session meanwhile.
fn ask_current(ws: &Workspace, session: &mut QuizSession) -> Result<bool> {
    let (index, question) = session.current();
    let question = question.clone();
    print_question(session, index, &question, ws);
    if let Some(previous) = session.current_answer() {
        let confidence = session
            .current_confidence()
            .map(|c| format!(" ({})", c))
            .unwrap_or_default();
        println!(
            "  {} {}{}",
            "Current answer:".dimmed(),
            previous.display_for(&question),
            confidence.dimmed()
        );
    }

    let answer = prompt_answer(&question)?;
    if expired(session.answer(ws.now(), answer))? {
        return Ok(true);
    }
    let confidence = prompt_confidence()?;
    expired(session.set_confidence(ws.now(), confidence))
}

/// `Ok(true)` when the timer closed the session
fn expired(result: Result<(), QuizError>) -> Result<bool> {
    match result {
        Ok(()) => Ok(false),
        Err(QuizError::TimeExpired) => Ok(true),
        Err(e) => Err(e.into()),
    }
}

fn print_question(session: &QuizSession, index: usize, question: &Question, ws: &Workspace) {
    let timer = session
        .remaining(ws.now())
        .map(|left| format!("  ⏱ {} left", format_duration(left)))
        .unwrap_or_default();

    println!(
        "\n{} [{}/{}] {}{}",
        "Question".bold().cyan(),
        index + 1,
        session.len(),
        format!("({})", question.kind.label()).dimmed(),
        timer.yellow()
    );
    println!("  {}", question.prompt);
    println!();
}

/// Ask for an answer in the form the question expects
pub(super) fn prompt_answer(question: &Question) -> Result<Answer> {
    match &question.kind {
        QuestionKind::MultipleChoice { options, .. } => {
            let labels: Vec<String> = options
                .iter()
                .enumerate()
                .map(|(i, o)| format!("{}) {}", option_letter(i), o))
                .collect();
            let picked = Select::new("Your answer:", labels.clone()).prompt()?;
            let index = labels.iter().position(|l| *l == picked).unwrap_or(0);
            Ok(Answer::Choice(index))
        }
        QuestionKind::TrueFalse { .. } => {
            let picked = Select::new("True or false?", vec!["True", "False"]).prompt()?;
            Ok(Answer::Bool(picked == "True"))
        }
        QuestionKind::FillInBlank { .. } => {
            let text = Text::new("Fill in the blank:").prompt()?;
            Ok(Answer::Text(text.trim().to_string()))
        }
        QuestionKind::ShortAnswer { .. } => {
            let text = Text::new("Your answer:")
                .with_help_message("A sentence or two is enough")
                .prompt()?;
            Ok(Answer::Text(text.trim().to_string()))
        }
    }
}

pub(super) fn prompt_confidence() -> Result<ConfidenceLevel> {
    let options = vec![
        "🟢  Sure        │ I know this",
        "🟡  Fairly sure │ I think so",
        "🔴  Guessing    │ No idea really",
    ];
    let picked = Select::new("How confident are you?", options).prompt()?;
    Ok(if picked.contains("Guessing") {
        ConfidenceLevel::Low
    } else if picked.contains("Fairly") {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::High
    })
}

/// Store the attempt, reschedule every question and tell the teacher
fn persist_outcome(
    db: &Database,
    user: &User,
    quiz_id: i64,
    assignment: Option<&Assignment>,
    outcome: &QuizOutcome,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<i64> {
    let attempt_id = db.transaction(|| {
        let attempt_id =
            AttemptStore::new(db).record(user.id, quiz_id, assignment.map(|a| a.id), outcome)?;

        let reviews = ReviewStore::new(db);
        for result in &outcome.results {
            if let Some(question_id) = result.question.id {
                reviews.apply_state(user.id, question_id, result.state, now)?;
            }
        }

        if let Some(assignment) = assignment {
            Notifier::new(db).assignment_submitted(
                assignment,
                &user.name,
                outcome.score_percent,
                outcome.submitted_at,
            )?;
        }
        Ok(attempt_id)
    })?;

    log::info!(
        "Recorded attempt {} for quiz {} ({:.0}%)",
        attempt_id,
        quiz_id,
        outcome.score_percent
    );
    Ok(attempt_id)
}

fn print_results(outcome: &QuizOutcome) {
    let score = format!("{:.0}%", outcome.score_percent);
    let score = if outcome.score_percent >= 80.0 {
        score.green().bold()
    } else if outcome.score_percent >= 60.0 {
        score.yellow().bold()
    } else {
        score.red().bold()
    };

    println!();
    println!(
        "    {}",
        "╭──────────────────────────────────────────────────────╮".green()
    );
    println!(
        "    {}             {}             {}",
        "│".green(),
        "🎯 QUIZ RESULTS 🎯".bold().white(),
        "│".green()
    );
    println!(
        "    {}",
        "╰──────────────────────────────────────────────────────╯".green()
    );
    println!(
        "  Score: {} ({}/{})   Time: {}",
        score,
        outcome.correct,
        outcome.total,
        format_duration(outcome.duration())
    );

    print_section("Where you stand");
    for (state, count) in outcome.states() {
        println!(
            "  {} {:<14} {:>2}  {}",
            state_marker(state),
            state.label(),
            count.to_string().bold(),
            state.description().dimmed()
        );
    }

    print_section("Question review (most urgent first)");
    for result in outcome.by_priority() {
        let question = &result.question;
        println!(
            "\n  {} {}. {}",
            state_marker(result.state),
            result.index + 1,
            question.prompt.bold()
        );
        let given = result
            .answer
            .as_ref()
            .map(|a| a.display_for(question))
            .unwrap_or_else(|| "(no answer)".to_string());
        println!(
            "     {} {} {}",
            "Your answer:".dimmed(),
            given,
            format!("[{} confidence]", result.confidence).dimmed()
        );
        if !result.correct {
            println!(
                "     {} {}",
                "Correct:".dimmed(),
                question.kind.answer_text().green()
            );
        }
        println!(
            "     {} {}",
            result.state.label().bold(),
            result.state.recommendation().dimmed()
        );
        if !result.correct
            && let Some(explanation) = &question.explanation
        {
            render_markdown(explanation);
        }
    }
    println!();
}

fn state_marker(state: LearningState) -> colored::ColoredString {
    match state {
        LearningState::Mastered => "✓".green(),
        LearningState::Developing => "◐".green(),
        LearningState::LuckyGuess => "?".yellow(),
        LearningState::KnowledgeGap => "○".yellow(),
        LearningState::Confused => "✗".red(),
        LearningState::Misconception => "‼".red().bold(),
    }
}

/// Offer an AI walkthrough for each confidently wrong answer
async fn offer_tutor(ws: &Workspace, outcome: &QuizOutcome) {
    let wrong: Vec<_> = outcome
        .by_priority()
        .into_iter()
        .filter(|r| r.state == LearningState::Misconception)
        .collect();
    if wrong.is_empty() || !ws.config.has_api_key() {
        return;
    }

    let question = format!(
        "You were sure about {} wrong answer(s). Get a tutor walkthrough?",
        wrong.len()
    );
    if !matches!(confirm(&question), Ok(true)) {
        return;
    }

    let client = match llm::client_from_config(&ws.config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            return;
        }
    };

    for result in wrong {
        print_section(&result.question.prompt);
        if let Err(e) =
            llm::explain_misconception(&client, &result.question, result.answer.as_ref()).await
        {
            eprintln!("{} {}", "Error:".red(), e);
            break;
        }
    }
}
