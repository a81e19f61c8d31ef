use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::Colorize;
use std::io;

mod classroom;
mod clock;
mod commands;
mod config;
mod error;
mod generation;
mod ingest;
mod learning;
mod llm;
mod notifications;
mod quiz;
mod render;
mod storage;
mod users;

use commands::generate::GenerateArgs;

/// ASCII art banner for the application
const BANNER: &str = r#"
   ___        _    __        ___     _
  / _ \ _   _(_)___\ \      / / |__ (_)____
 | | | | | | | |_  /\ \ /\ / /| '_ \| |_  /
 | |_| | |_| | |/ /  \ V  V / | | | | |/ /
  \__\_\\__,_|_/___|  \_/\_/  |_| |_|_/___|
"#;

/// Print the application banner
fn print_banner() {
    println!("{}", BANNER.cyan().bold());
}

/// Print a styled status line
fn print_status(label: &str, value: &str, icon: &str) {
    println!(
        "  {} {} {}",
        icon,
        format!("{}:", label).dimmed(),
        value.cyan()
    );
}

#[derive(Parser)]
#[command(name = "quizwhiz")]
#[command(about = "Turn course material into quizzes, track confidence, and review what you got wrong")]
#[command(version)]
struct Cli {
    /// Show debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add course material (PDF, notes, recorded lectures, directories)
    Add {
        /// Path to add (skips interactive prompt if provided)
        path: Option<String>,
    },
    /// List all documents
    List,
    /// Search documents by content
    Search {
        /// Search query
        query: Option<String>,
    },
    /// Manage documents (view, delete)
    Docs,
    /// Delete a document by ID
    Delete {
        /// Document ID to delete
        id: Option<i64>,
    },
    /// Generate a quiz from your documents
    Generate {
        /// Topic to focus on
        #[arg(short, long)]
        topic: Option<String>,
        /// Number of questions
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// easy, medium or hard
        #[arg(short, long)]
        difficulty: Option<String>,
        /// Time limit in minutes (0 for none)
        #[arg(long)]
        time_limit: Option<u32>,
    },
    /// List saved quizzes
    Quizzes,
    /// Delete a saved quiz
    DeleteQuiz {
        /// Quiz ID to delete
        quiz_id: Option<i64>,
    },
    /// Take a quiz
    Take {
        /// Quiz ID (pick from a list if omitted)
        quiz_id: Option<i64>,
    },
    /// Review questions due for spaced repetition
    Review,
    /// Show learning analytics
    Insights,
    /// Manage profiles
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage classes
    Class {
        #[command(subcommand)]
        action: ClassAction,
    },
    /// Manage assignments
    Assign {
        #[command(subcommand)]
        action: AssignAction,
    },
    /// Show notifications
    Notifications {
        /// Include notifications already read
        #[arg(long)]
        all: bool,
        /// Mark everything as read afterwards
        #[arg(long)]
        read: bool,
        /// Mark one notification as read by ID
        #[arg(long, conflicts_with_all = ["all", "read"])]
        dismiss: Option<i64>,
    },
    /// Configure settings (API keys, quiz defaults)
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a profile and switch to it
    Create {
        name: Option<String>,
        /// student or teacher
        #[arg(short, long)]
        role: Option<String>,
    },
    /// Switch to another profile
    Switch { name: Option<String> },
    /// List profiles
    List,
    /// Show the current profile
    Whoami,
}

#[derive(Subcommand)]
enum ClassAction {
    /// Create a class (teachers)
    Create { name: Option<String> },
    /// Join a class with its code
    Join { code: Option<String> },
    /// List your classes
    List,
    /// Show the students in a class
    Roster { class_id: Option<i64> },
    /// Remove a student from a class
    Remove {
        class_id: Option<i64>,
        /// Student profile name
        student: Option<String>,
    },
    /// Class and assignment analytics
    Analytics { class_id: Option<i64> },
}

#[derive(Subcommand)]
enum AssignAction {
    /// Assign a quiz to a class (teachers)
    Create {
        #[arg(long)]
        class: Option<i64>,
        #[arg(long)]
        quiz: Option<i64>,
        #[arg(long)]
        title: Option<String>,
        /// YYYY-MM-DD or "YYYY-MM-DD HH:MM" (UTC)
        #[arg(long)]
        due: Option<String>,
    },
    /// List assignments
    List,
    /// Take an assigned quiz
    Take { assignment_id: Option<i64> },
    /// Delete an assignment (teachers)
    Delete { assignment_id: Option<i64> },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Add { path }) => commands::add::run(path).await?,
        Some(Commands::List) => commands::docs::list().await?,
        Some(Commands::Search { query }) => commands::docs::search(query).await?,
        Some(Commands::Docs) => commands::docs::run().await?,
        Some(Commands::Delete { id }) => commands::docs::delete(id).await?,
        Some(Commands::Generate {
            topic,
            count,
            difficulty,
            time_limit,
        }) => {
            let difficulty = difficulty.map(|d| d.parse::<quiz::Difficulty>()).transpose()?;
            commands::generate::run(GenerateArgs {
                topic,
                count,
                difficulty,
                time_limit,
            })
            .await?
        }
        Some(Commands::Quizzes) => commands::quiz::list().await?,
        Some(Commands::DeleteQuiz { quiz_id }) => commands::quiz::delete(quiz_id).await?,
        Some(Commands::Take { quiz_id }) => commands::quiz::take(quiz_id).await?,
        Some(Commands::Review) => commands::review::run().await?,
        Some(Commands::Insights) => commands::insights::run().await?,
        Some(Commands::User { action }) => match action {
            UserAction::Create { name, role } => {
                let role = role.map(|r| r.parse::<users::Role>()).transpose()?;
                commands::user::create(name, role).await?
            }
            UserAction::Switch { name } => commands::user::switch(name).await?,
            UserAction::List => commands::user::list().await?,
            UserAction::Whoami => commands::user::whoami().await?,
        },
        Some(Commands::Class { action }) => match action {
            ClassAction::Create { name } => commands::class::create(name).await?,
            ClassAction::Join { code } => commands::class::join(code).await?,
            ClassAction::List => commands::class::list().await?,
            ClassAction::Roster { class_id } => commands::class::roster(class_id).await?,
            ClassAction::Remove { class_id, student } => {
                commands::class::remove(class_id, student).await?
            }
            ClassAction::Analytics { class_id } => commands::class::analytics(class_id).await?,
        },
        Some(Commands::Assign { action }) => match action {
            AssignAction::Create {
                class,
                quiz,
                title,
                due,
            } => commands::assign::create(class, quiz, title, due).await?,
            AssignAction::List => commands::assign::list().await?,
            AssignAction::Take { assignment_id } => commands::assign::take(assignment_id).await?,
            AssignAction::Delete { assignment_id } => {
                commands::assign::delete(assignment_id).await?
            }
        },
        Some(Commands::Notifications { dismiss: Some(id), .. }) => {
            commands::notifications::dismiss(id).await?
        }
        Some(Commands::Notifications { all, read, .. }) => {
            commands::notifications::run(all, read).await?
        }
        Some(Commands::Config) => commands::config::run().await?,
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
        None => run_interactive().await?,
    }

    Ok(())
}

/// Profile, document count, due reviews and unread notifications
fn print_workspace_status() {
    let ws = match commands::Workspace::open() {
        Ok(ws) => ws,
        Err(e) => {
            log::warn!("Could not open workspace: {}", e);
            return;
        }
    };

    let api_status = if ws.config.has_api_key() {
        "Configured".green().to_string()
    } else {
        "Not set (run 'config')".red().to_string()
    };

    match ws.current_user() {
        Ok(user) => {
            let now = ws.now();
            let docs = storage::DocumentStore::new(&ws.db)
                .count(user.id)
                .unwrap_or(0);
            let due = storage::ReviewStore::new(&ws.db)
                .count_due(user.id, now)
                .unwrap_or(0);
            let notifier = notifications::Notifier::new(&ws.db);
            if let Err(e) = notifier.refresh_due_reminders(now) {
                log::warn!("Could not refresh reminders: {}", e);
            }
            if let Err(e) = notifier.reviews_due(user.id, now) {
                log::warn!("Could not check due reviews: {}", e);
            }
            let unread = storage::NotificationStore::new(&ws.db)
                .unread_count(user.id)
                .unwrap_or(0);

            print_status("Profile", &format!("{} ({})", user.name, user.role), "👤");
            print_status("Documents", &docs.to_string(), "📄");
            print_status("Due reviews", &due.to_string(), "🔁");
            print_status("Notifications", &unread.to_string(), "🔔");
        }
        Err(_) => print_status("Profile", "none (run 'user create')", "👤"),
    }
    print_status("API Key", &api_status, "🔑");
}

async fn run_interactive() -> Result<()> {
    use inquire::Select;

    print_banner();

    println!(
        "  {} {}",
        "Version:".dimmed(),
        env!("CARGO_PKG_VERSION").cyan()
    );
    println!("  {} {}\n", "Powered by:".dimmed(), "Groq LLM".green());

    println!("{}", "─".repeat(50).dimmed());
    print_workspace_status();
    println!("{}\n", "─".repeat(50).dimmed());

    let options = vec![
        "📥  Add course material",
        "📝  Generate a quiz",
        "🎯  Take a quiz",
        "🔁  Review due questions",
        "📊  Learning insights",
        "📚  Assignments",
        "🔔  Notifications",
        "📂  Manage documents",
        "👤  Switch profile",
        "⚙️   Configure settings",
        "🚪  Exit",
    ];

    let selection = Select::new("What would you like to do?", options)
        .with_help_message("Use arrow keys to navigate, Enter to select")
        .prompt()?;

    println!();

    match selection {
        s if s.contains("Add course") => commands::add::run(None).await?,
        s if s.contains("Generate a quiz") => {
            commands::generate::run(GenerateArgs::default()).await?
        }
        s if s.contains("Take a quiz") => commands::quiz::take(None).await?,
        s if s.contains("Review due") => commands::review::run().await?,
        s if s.contains("insights") => commands::insights::run().await?,
        s if s.contains("Assignments") => commands::assign::list().await?,
        s if s.contains("Notifications") => commands::notifications::run(false, false).await?,
        s if s.contains("Manage documents") => commands::docs::run().await?,
        s if s.contains("Switch profile") => commands::user::switch(None).await?,
        s if s.contains("Configure") => commands::config::run().await?,
        _ => {
            println!("{}", "👋 Thanks for using QuizWhiz! Happy learning!".cyan());
        }
    }

    Ok(())
}
