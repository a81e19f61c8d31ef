use anyhow::Result;
use colored::Colorize;
use inquire::{Select, Text};

use super::{Workspace, confirm, prompt_id};
use crate::storage::{Document, DocumentStore};

/// Interactive document management
pub async fn run() -> Result<()> {
    println!("{}", "Document Management".bold().cyan());
    println!("{}", "─".repeat(40).dimmed());

    let options = vec![
        "List all documents",
        "Search documents",
        "View document",
        "Delete document",
        "Back",
    ];

    loop {
        let selection = Select::new("What would you like to do?", options.clone()).prompt()?;

        match selection {
            "List all documents" => list().await?,
            "Search documents" => search(None).await?,
            "View document" => view(None).await?,
            "Delete document" => delete(None).await?,
            _ => break,
        }

        println!();
    }

    Ok(())
}

/// List the current profile's documents
pub async fn list() -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let documents = DocumentStore::new(&ws.db).list(user.id)?;

    if documents.is_empty() {
        println!("{}", "No documents found.".dimmed());
        println!("Use {} to add course material.", "quizwhiz add".cyan());
        return Ok(());
    }

    println!(
        "\n{} ({} documents)\n",
        "Documents".bold(),
        documents.len()
    );

    for doc in &documents {
        print_document_summary(doc);
    }

    Ok(())
}

pub async fn search(query: Option<String>) -> Result<()> {
    let query = match query {
        Some(q) => q,
        None => Text::new("Search query:")
            .with_help_message("Full-text search over your documents")
            .prompt()?,
    };

    if query.trim().is_empty() {
        println!("{}", "Empty query.".dimmed());
        return Ok(());
    }

    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let documents = DocumentStore::new(&ws.db).search(user.id, query.trim())?;

    if documents.is_empty() {
        println!("{} No documents found for '{}'", "⊘".yellow(), query);
        return Ok(());
    }

    println!(
        "\n{} {} results for '{}'\n",
        "Search:".bold(),
        documents.len(),
        query.cyan()
    );

    for doc in &documents {
        print_document_summary(doc);
    }

    Ok(())
}

async fn view(id: Option<i64>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let id = prompt_id(id, "Document ID:")?;

    match DocumentStore::new(&ws.db).get(id)? {
        Some(doc) if doc.owner_id == user.id => {
            println!("\n{}", "─".repeat(50).dimmed());
            println!("{} {}", "ID:".bold(), doc.id);
            println!("{} {}", "Filename:".bold(), doc.filename);
            println!("{} {}", "Type:".bold(), doc.content_type);
            println!("{} {}", "Source:".bold(), doc.source_path.dimmed());
            println!(
                "{} {}",
                "Tags:".bold(),
                doc.tags.as_deref().unwrap_or("none")
            );
            println!("{} {}", "Added:".bold(), doc.created_at.format("%Y-%m-%d %H:%M"));
            println!("{} {} chars", "Length:".bold(), doc.content.chars().count());
            println!("{}", "─".repeat(50).dimmed());

            let preview: String = doc.content.chars().take(500).collect();
            println!("\n{}", "Content preview:".bold());
            println!("{}", preview);
            let remaining = doc.content.chars().count().saturating_sub(500);
            if remaining > 0 {
                println!("{}", format!("... ({} more chars)", remaining).dimmed());
            }
        }
        _ => println!("{} Document not found: {}", "✗".red(), id),
    }

    Ok(())
}

pub async fn delete(id: Option<i64>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let store = DocumentStore::new(&ws.db);
    let id = prompt_id(id, "Document ID to delete:")?;

    let Some(doc) = store.get(id)?.filter(|d| d.owner_id == user.id) else {
        println!("{} Document not found: {}", "✗".red(), id);
        return Ok(());
    };

    println!(
        "\n{} {} ({})",
        "Document:".bold(),
        doc.filename,
        doc.content_type
    );

    if !confirm(&format!("Delete document {} '{}'?", id, doc.filename))? {
        println!("{}", "Cancelled.".dimmed());
        return Ok(());
    }

    if store.delete(user.id, id)? {
        println!("{} Deleted document {}", "✓".green(), id);
    } else {
        println!("{} Failed to delete document {}", "✗".red(), id);
    }

    Ok(())
}

fn print_document_summary(doc: &Document) {
    let tags_display = match doc.tags.as_deref() {
        Some(tags) if !tags.is_empty() => format!(" [{}]", tags.cyan()),
        _ => String::new(),
    };

    println!(
        "  {} {} {}{} ({} chars)",
        format!("[{}]", doc.id).dimmed(),
        doc.filename.bold(),
        doc.content_type.dimmed(),
        tags_display,
        doc.content.chars().count()
    );
}
