pub mod add;
pub mod assign;
pub mod class;
pub mod config;
pub mod docs;
pub mod generate;
pub mod insights;
pub mod notifications;
pub mod quiz;
pub mod review;
pub mod user;

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Select, Text};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::storage::{Database, UserStore};
use crate::users::User;

/// Everything a command needs: settings, the database and the time source
pub struct Workspace {
    pub config: Config,
    pub db: Database,
    clock: Box<dyn Clock>,
}

impl Workspace {
    pub fn open() -> Result<Self> {
        let config = Config::load()?;
        let db = Database::open(&config)?;
        Ok(Self {
            config,
            db,
            clock: Box::new(SystemClock),
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The profile picked with `user switch`
    pub fn current_user(&self) -> Result<User> {
        let id = self.config.current_user.ok_or_else(|| {
            anyhow::anyhow!("No profile selected. Run 'quizwhiz user create' first.")
        })?;

        UserStore::new(&self.db).get(id)?.ok_or_else(|| {
            anyhow::anyhow!("Profile {} no longer exists. Run 'quizwhiz user switch'.", id)
        })
    }
}

/// Create a spinner for indeterminate progress
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Create a progress bar for determinate progress
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg} [{bar:30.cyan/dim}] {pos}/{len} ({percent}%)")
    {
        pb.set_style(style.progress_chars("━━─"));
    }
    pb.set_message(message.to_string());
    pb
}

/// Use the given ID or ask for one
pub fn prompt_id(given: Option<i64>, prompt: &str) -> Result<i64> {
    match given {
        Some(id) => Ok(id),
        None => {
            let input = Text::new(prompt).prompt()?;
            input
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid ID: '{}'", input.trim()))
        }
    }
}

pub fn confirm(question: &str) -> Result<bool> {
    let answer = Select::new(question, vec!["No", "Yes"]).prompt()?;
    Ok(answer == "Yes")
}

pub fn print_section(title: &str) {
    println!("\n{}", title.bold().cyan());
    println!("{}", "─".repeat(50).dimmed());
}

/// Treat Esc / Ctrl-C in a prompt as "go back" rather than an error
pub fn cancelled(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<inquire::InquireError>(),
        Some(inquire::InquireError::OperationCanceled)
            | Some(inquire::InquireError::OperationInterrupted)
    )
}

pub fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds().max(0);
    if secs >= 3600 {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(75)), "1:15");
        assert_eq!(format_duration(Duration::minutes(90)), "1h 30m");
        assert_eq!(format_duration(Duration::seconds(-5)), "0:00");
    }

    #[test]
    fn test_cancelled_detects_escape() {
        let err: anyhow::Error = inquire::InquireError::OperationCanceled.into();
        assert!(cancelled(&err));
        assert!(!cancelled(&anyhow::anyhow!("boom")));
    }
}
