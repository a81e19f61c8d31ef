use anyhow::Result;
use colored::Colorize;
use inquire::{Select, Text};
use std::path::{Path, PathBuf};

use super::{Workspace, create_progress_bar, create_spinner};
use crate::ingest::{self, ContentType};
use crate::storage::{DocumentStore, NewDocument};

pub async fn run(path: Option<String>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;

    let source = match path {
        Some(p) => p,
        None => prompt_for_source()?,
    };

    println!("\n{} {}", "Processing:".dimmed(), source);

    let path = Path::new(source.trim());
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", source);
    }

    if path.is_dir() {
        process_directory(&ws, user.id, path).await
    } else {
        process_file(&ws, user.id, path).await
    }
}

fn prompt_for_source() -> Result<String> {
    let options = vec!["File", "Directory", "Recorded lecture (audio/video)"];

    let source_type = Select::new("What would you like to add?", options).prompt()?;

    let help_text = match source_type {
        "Directory" => "Every supported file inside is added",
        "Recorded lecture (audio/video)" => "mp3, m4a, wav, mp4, mov... transcribed with Whisper",
        _ => "PDF, text or markdown notes",
    };

    let path = Text::new("Enter path:")
        .with_help_message(help_text)
        .prompt()?;

    Ok(path)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Outcome of adding one file
enum Added {
    New { id: i64, chars: usize },
    Duplicate,
}

async fn ingest_file(ws: &Workspace, owner_id: i64, path: &Path) -> Result<(Added, String)> {
    let abs_path = tokio::fs::canonicalize(path).await?;
    let source_path = abs_path.to_string_lossy().to_string();
    let store = DocumentStore::new(&ws.db);

    if store.exists_by_path(owner_id, &source_path)? {
        return Ok((Added::Duplicate, String::new()));
    }

    let content = ingest::extract_from_file(path).await?;
    log::debug!(
        "Extracted {} chars of {} from {}",
        content.text.len(),
        content.content_type.as_str(),
        content.source
    );
    let filename = file_name(path);
    let id = store.insert(
        owner_id,
        &NewDocument {
            source_path: &source_path,
            filename: &filename,
            content_type: content.content_type.as_str(),
            content: &content.text,
            tags: None,
        },
        ws.now(),
    )?;

    Ok((
        Added::New {
            id,
            chars: content.text.chars().count(),
        },
        content.text,
    ))
}

async fn process_file(ws: &Workspace, owner_id: i64, path: &Path) -> Result<()> {
    let spinner = if ContentType::from_path(path).is_recording() {
        create_spinner("Transcribing recording...")
    } else {
        create_spinner("Extracting content...")
    };

    let result = ingest_file(ws, owner_id, path).await;
    spinner.finish_and_clear();

    match result? {
        (Added::Duplicate, _) => {
            println!(
                "{} Document already exists: {}",
                "⚠".yellow(),
                path.display()
            );
        }
        (Added::New { id, chars }, text) => {
            let preview: String = text.chars().take(200).collect();

            println!("{}", "─".repeat(50).dimmed());
            println!("{} {}", "Type:".bold(), ContentType::from_path(path).as_str());
            println!("{} {} chars", "Length:".bold(), chars);
            println!("{} {}", "ID:".bold(), id);
            println!("{}", "Preview:".bold());
            println!(
                "{}{}",
                preview.dimmed(),
                if chars > 200 { "..." } else { "" }
            );
            println!("{}", "─".repeat(50).dimmed());

            println!("\n{} Added {} (id: {})", "✓".green(), file_name(path), id);
            println!(
                "Run {} to build a quiz from it.",
                "quizwhiz generate".cyan()
            );
        }
    }

    Ok(())
}

async fn process_directory(ws: &Workspace, owner_id: i64, path: &Path) -> Result<()> {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut entries = tokio::fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_path = entry.path();
        let metadata = tokio::fs::metadata(&file_path).await?;
        if metadata.is_file() && ContentType::from_path(&file_path) != ContentType::Unknown {
            files.push(file_path);
        }
    }
    files.sort();

    if files.is_empty() {
        println!("{} No supported files found in directory", "⚠".yellow());
        return Ok(());
    }

    println!("Found {} files\n", files.len());
    let pb = create_progress_bar(files.len() as u64, "Processing files");

    let mut results: Vec<(String, Result<Added, String>)> = Vec::new();
    for file_path in &files {
        let name = file_name(file_path);
        pb.set_message(format!("Processing: {}", name));

        let result = ingest_file(ws, owner_id, file_path)
            .await
            .map(|(added, _)| added)
            .map_err(|e| e.to_string());
        results.push((name, result));
        pb.inc(1);
    }
    pb.finish_and_clear();

    let (mut added, mut skipped, mut errors) = (0, 0, 0);

    println!("\n{}", "Results:".bold());
    println!("{}", "─".repeat(60).dimmed());
    for (filename, result) in &results {
        match result {
            Ok(Added::New { chars, .. }) => {
                added += 1;
                println!("  {} {} ({} chars)", "✓".green(), filename, chars);
            }
            Ok(Added::Duplicate) => {
                skipped += 1;
                println!("  {} {} (already exists)", "⊘".yellow(), filename);
            }
            Err(e) => {
                errors += 1;
                println!("  {} {} ({})", "✗".red(), filename, e);
            }
        }
    }
    println!("{}", "─".repeat(60).dimmed());
    println!(
        "\n{} {} added, {} skipped, {} errors",
        "Summary:".bold(),
        added,
        skipped,
        errors
    );

    Ok(())
}
