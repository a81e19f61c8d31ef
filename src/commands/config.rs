use anyhow::Result;
use colored::Colorize;
use inquire::{Password, Select, Text};

use super::cancelled;
use crate::config::Config;
use crate::generation::{MAX_QUESTIONS, MIN_QUESTIONS};
use crate::llm::GroqClient;
use crate::llm::groq::DEFAULT_MODEL;
use crate::quiz::Difficulty;

pub async fn run() -> Result<()> {
    println!();
    println!(
        "    {}",
        "╭──────────────────────────────────────────────────────╮".bright_black()
    );
    println!(
        "    {}            {}            {}",
        "│".bright_black(),
        "⚙️  SETTINGS ⚙️".bold().white(),
        "│".bright_black()
    );
    println!(
        "    {}        {}        {}",
        "│".bright_black(),
        "Configure QuizWhiz to your liking".dimmed(),
        "│".bright_black()
    );
    println!(
        "    {}",
        "╰──────────────────────────────────────────────────────╯".bright_black()
    );
    println!();

    let mut config = Config::load()?;

    let options = vec![
        "🔑  Set API Key        │ Configure Groq API access",
        "🤖  Select Model       │ Choose default LLM",
        "📝  Quiz Defaults      │ Question count, time limit, difficulty",
        "🔁  Review Session     │ Questions per review session",
        "📋  View Settings      │ See current configuration",
        "←   Back",
    ];

    loop {
        let selection =
            Select::new("What would you like to configure?", options.clone()).prompt();

        let selection = match selection {
            Ok(s) => s,
            Err(inquire::InquireError::OperationCanceled)
            | Err(inquire::InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e.into()),
        };

        let result = match selection {
            s if s.contains("Set API Key") => set_api_key(&mut config),
            s if s.contains("Select Model") => select_model(&mut config),
            s if s.contains("Quiz Defaults") => set_quiz_defaults(&mut config),
            s if s.contains("Review Session") => set_review_size(&mut config),
            s if s.contains("View Settings") => {
                view_config(&config);
                Ok(())
            }
            _ => break,
        };

        if let Err(e) = result
            && !cancelled(&e)
        {
            eprintln!("{} {}", "Error:".red(), e);
        }

        println!();
    }

    Ok(())
}

fn set_api_key(config: &mut Config) -> Result<()> {
    println!(
        "\n{} Get your API key from {}",
        "Tip:".yellow(),
        "https://console.groq.com/keys".cyan()
    );

    let key = Password::new("Enter your Groq API key:")
        .without_confirmation()
        .prompt()?;

    if key.is_empty() {
        println!("{}", "Cancelled.".dimmed());
        return Ok(());
    }

    config.groq_api_key = Some(key);
    config.save()?;

    println!("{} API key saved!", "✓".green());

    Ok(())
}

fn select_model(config: &mut Config) -> Result<()> {
    let model_options: Vec<String> = GroqClient::MODELS
        .iter()
        .map(|(id, desc)| format!("{} - {}", id, desc))
        .collect();

    let selection = Select::new("Select default model:", model_options.clone()).prompt()?;
    let index = model_options
        .iter()
        .position(|m| *m == selection)
        .unwrap_or(0);
    let model_id = GroqClient::MODELS[index].0.to_string();

    config.default_model = Some(model_id.clone());
    config.save()?;

    println!("{} Default model set to {}", "✓".green(), model_id.yellow());

    Ok(())
}

fn set_quiz_defaults(config: &mut Config) -> Result<()> {
    let count = Text::new("Questions per quiz:")
        .with_default(&config.quiz.question_count.to_string())
        .with_help_message(&format!("Between {} and {}", MIN_QUESTIONS, MAX_QUESTIONS))
        .prompt()?;
    let count: usize = count
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number: '{}'", count.trim()))?;

    let limit = Text::new("Time limit in minutes:")
        .with_default(
            &config
                .quiz
                .time_limit_minutes
                .map(|m| m.to_string())
                .unwrap_or_else(|| "0".to_string()),
        )
        .with_help_message("0 for no limit")
        .prompt()?;
    let limit: u32 = limit
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number: '{}'", limit.trim()))?;

    let difficulty = Select::new(
        "Default difficulty:",
        vec![Difficulty::Easy, Difficulty::Medium, Difficulty::Hard],
    )
    .prompt()?;

    config.quiz.question_count = count.clamp(MIN_QUESTIONS, MAX_QUESTIONS);
    config.quiz.time_limit_minutes = (limit > 0).then_some(limit);
    config.quiz.difficulty = difficulty;
    config.save()?;

    println!("{} Quiz defaults saved", "✓".green());
    Ok(())
}

fn set_review_size(config: &mut Config) -> Result<()> {
    let size = Text::new("Questions per review session:")
        .with_default(&config.review.session_size.to_string())
        .prompt()?;
    let size: usize = size
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid number: '{}'", size.trim()))?;
    if size == 0 {
        anyhow::bail!("A review session needs at least one question");
    }

    config.review.session_size = size;
    config.save()?;

    println!("{} Review sessions now hold up to {} questions", "✓".green(), size);
    Ok(())
}

fn view_config(config: &Config) {
    println!("\n{}", "Current Configuration:".bold());
    println!("{}", "─".repeat(30).dimmed());

    let api_status = if config.groq_api_key.as_deref().is_some_and(|k| !k.is_empty()) {
        "configured".green().to_string()
    } else if config.has_api_key() {
        "set via GROQ_API_KEY env".yellow().to_string()
    } else {
        "not set".red().to_string()
    };

    println!("  API Key: {}", api_status);

    println!(
        "  Default Model: {}",
        config
            .default_model
            .clone()
            .unwrap_or_else(|| format!("{} (default)", DEFAULT_MODEL))
    );
    println!(
        "  Quiz: {} questions, {}, {}",
        config.quiz.question_count,
        config.quiz.difficulty,
        config
            .quiz
            .time_limit_minutes
            .map(|m| format!("{} minute limit", m))
            .unwrap_or_else(|| "no time limit".to_string())
    );
    println!("  Review session: {} questions", config.review.session_size);

    if let Ok(path) = Config::config_path() {
        println!("  Config file: {}", path.display().to_string().dimmed());
    }

    if let Ok(path) = config.database_path() {
        println!("  Database: {}", path.display().to_string().dimmed());
    }
}
