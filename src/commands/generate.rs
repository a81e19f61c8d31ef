use anyhow::Result;
use colored::Colorize;
use inquire::{Select, Text};

use super::{Workspace, confirm, create_spinner};
use crate::generation::{self, MAX_CONTEXT_CHARS, MAX_QUESTIONS, MIN_QUESTIONS, QuizRequest};
use crate::llm;
use crate::quiz::{Difficulty, Quiz};
use crate::storage::{Document, DocumentStore, QuizStore};

/// Options given on the command line; anything missing is asked for
#[derive(Debug, Default)]
pub struct GenerateArgs {
    pub topic: Option<String>,
    pub count: Option<usize>,
    pub difficulty: Option<Difficulty>,
    pub time_limit: Option<u32>,
}

impl GenerateArgs {
    fn is_empty(&self) -> bool {
        self.topic.is_none()
            && self.count.is_none()
            && self.difficulty.is_none()
            && self.time_limit.is_none()
    }
}

pub async fn run(args: GenerateArgs) -> Result<()> {
    println!();
    println!(
        "    {}",
        "╭──────────────────────────────────────────────────────╮".magenta()
    );
    println!(
        "    {}              {}              {}",
        "│".magenta(),
        "🎯 QUIZ GENERATOR 🎯".bold().white(),
        "│".magenta()
    );
    println!(
        "    {}",
        "╰──────────────────────────────────────────────────────╯".magenta()
    );
    println!();

    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let client = llm::client_from_config(&ws.config)?;

    let interactive = args.is_empty();
    let defaults = ws.config.quiz.clone();

    let topic = match args.topic {
        Some(t) => t,
        None if interactive => Text::new("Topic (or Enter for all materials):")
            .prompt()
            .unwrap_or_default(),
        None => String::new(),
    };

    let difficulty = match args.difficulty {
        Some(d) => d,
        None if interactive => prompt_difficulty(defaults.difficulty)?,
        None => defaults.difficulty,
    };

    let count = match args.count {
        Some(c) => c,
        None if interactive => prompt_count(defaults.question_count)?,
        None => defaults.question_count,
    };

    let time_limit = match args.time_limit {
        Some(0) => None,
        Some(minutes) => Some(chrono::Duration::minutes(minutes as i64)),
        None => defaults.time_limit(),
    };

    let documents = select_documents(&ws, user.id, &topic)?;
    if documents.is_empty() {
        println!(
            "{} No documents found. Add materials first with {}.",
            "Error:".red(),
            "quizwhiz add".cyan()
        );
        return Ok(());
    }

    let context = generation::build_context(&documents, MAX_CONTEXT_CHARS);
    let request = QuizRequest::new(topic.trim(), difficulty, count);

    let spinner = create_spinner(&format!(
        "Writing {} {} questions from {} document(s)...",
        request.question_count,
        request.difficulty,
        documents.len()
    ));
    let result = generation::generate_quiz(&client, &request, &context).await;
    spinner.finish_and_clear();
    let questions = result?;

    let quiz = Quiz {
        id: None,
        owner_id: user.id,
        title: quiz_title(&topic, &documents),
        document_ids: documents.iter().map(|d| d.id).collect(),
        difficulty,
        questions,
        time_limit,
    };

    let quiz_id = QuizStore::new(&ws.db).insert(&quiz, ws.now())?;

    println!("{} Saved quiz {} '{}'", "✓".green(), quiz_id, quiz.title.bold());
    println!("{}", "─".repeat(50).dimmed());
    println!("{} {}", "Questions:".bold(), quiz.questions.len());
    println!("{} {}", "Difficulty:".bold(), quiz.difficulty);
    match quiz.time_limit_minutes() {
        Some(minutes) => println!("{} {} minutes", "Time limit:".bold(), minutes),
        None => println!("{} none", "Time limit:".bold()),
    }
    for (i, question) in quiz.questions.iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            question.prompt,
            format!("({})", question.kind.label()).dimmed()
        );
    }
    println!("{}", "─".repeat(50).dimmed());

    if interactive && confirm("Take this quiz now?")? {
        drop(ws);
        return super::quiz::take(Some(quiz_id)).await;
    }

    println!(
        "Run {} to take it.",
        format!("quizwhiz take {}", quiz_id).cyan()
    );
    Ok(())
}

/// Documents matching the topic, or every document when nothing matches
fn select_documents(ws: &Workspace, owner_id: i64, topic: &str) -> Result<Vec<Document>> {
    let store = DocumentStore::new(&ws.db);

    if !topic.trim().is_empty() {
        // FTS query syntax errors fall through to the full list
        match store.search(owner_id, topic.trim()) {
            Ok(docs) if !docs.is_empty() => return Ok(docs),
            Ok(_) => log::debug!("No documents match '{}', using all", topic),
            Err(e) => log::debug!("Search for '{}' failed: {}", topic, e),
        }
    }

    store.list(owner_id)
}

fn quiz_title(topic: &str, documents: &[Document]) -> String {
    let topic = topic.trim();
    if !topic.is_empty() {
        return topic.to_string();
    }
    match documents {
        [only] => only.filename.clone(),
        _ => format!("Review of {} documents", documents.len()),
    }
}

fn prompt_difficulty(default: Difficulty) -> Result<Difficulty> {
    let options = vec![Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];
    let start = options.iter().position(|d| *d == default).unwrap_or(1);
    Ok(Select::new("Difficulty:", options)
        .with_starting_cursor(start)
        .prompt()?)
}

fn prompt_count(default: usize) -> Result<usize> {
    let input = Text::new("Number of questions:")
        .with_default(&default.to_string())
        .with_help_message(&format!("Between {} and {}", MIN_QUESTIONS, MAX_QUESTIONS))
        .prompt()?;
    input
        .trim()
        .parse::<usize>()
        .map(|n| n.clamp(MIN_QUESTIONS, MAX_QUESTIONS))
        .map_err(|_| anyhow::anyhow!("Invalid number: '{}'", input.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(name: &str) -> Document {
        Document {
            id: 1,
            owner_id: 1,
            source_path: format!("/notes/{}", name),
            filename: name.to_string(),
            content_type: "text".to_string(),
            content: "cells".to_string(),
            tags: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_quiz_title() {
        assert_eq!(quiz_title(" Photosynthesis ", &[doc("bio.md")]), "Photosynthesis");
        assert_eq!(quiz_title("", &[doc("bio.md")]), "bio.md");
        assert_eq!(
            quiz_title("", &[doc("bio.md"), doc("chem.md")]),
            "Review of 2 documents"
        );
    }

    #[test]
    fn test_empty_args_are_interactive() {
        assert!(GenerateArgs::default().is_empty());
        let args = GenerateArgs {
            count: Some(5),
            ..Default::default()
        };
        assert!(!args.is_empty());
    }
}
