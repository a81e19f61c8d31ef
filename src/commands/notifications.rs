use anyhow::Result;
use colored::Colorize;

use super::Workspace;
use crate::notifications::{NotificationKind, Notifier};
use crate::storage::NotificationStore;

/// Show the inbox; `all` includes read items, `mark_read` clears the unread flag afterwards
pub async fn run(all: bool, mark_read: bool) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let now = ws.now();

    let notifier = Notifier::new(&ws.db);
    notifier.refresh_due_reminders(now)?;
    notifier.reviews_due(user.id, now)?;

    let store = NotificationStore::new(&ws.db);
    let notifications = store.list(user.id, all)?;

    if notifications.is_empty() {
        println!("{}", "No new notifications.".dimmed());
        return Ok(());
    }

    println!(
        "\n{} ({} unread)\n",
        "Notifications".bold(),
        store.unread_count(user.id)?
    );
    for notification in &notifications {
        let label = match notification.kind {
            NotificationKind::DueSoon => notification.kind.label().yellow().bold(),
            NotificationKind::ReviewsDue => notification.kind.label().blue().bold(),
            _ => notification.kind.label().cyan().bold(),
        };
        let text = if notification.read {
            notification.message.dimmed()
        } else {
            notification.message.normal()
        };
        println!(
            "  {} {} {} {} {}",
            if notification.read { " ".normal() } else { "●".green() },
            format!("[{}]", notification.id).dimmed(),
            notification.created_at.format("%m-%d %H:%M").to_string().dimmed(),
            label,
            text
        );
        if !notification.read
            && matches!(
                notification.kind,
                NotificationKind::AssignmentCreated | NotificationKind::DueSoon
            )
            && let Some(id) = notification.assignment_id()
        {
            println!(
                "      {}",
                format!("quizwhiz assign take {}", id).cyan()
            );
        }
    }

    if mark_read {
        let cleared = store.mark_all_read(user.id)?;
        println!("\n{} Marked {} as read", "✓".green(), cleared);
    } else {
        println!(
            "\n{}",
            "Run 'quizwhiz notifications --read' to mark them as read.".dimmed()
        );
    }

    Ok(())
}

/// Mark a single notification as read
pub async fn dismiss(id: i64) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;

    if NotificationStore::new(&ws.db).mark_read(user.id, id)? {
        println!("{} Notification {} marked as read", "✓".green(), id);
    } else {
        println!("{} No notification {}", "⊘".yellow(), id);
    }
    Ok(())
}
