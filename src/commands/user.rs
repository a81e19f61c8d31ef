use anyhow::Result;
use colored::Colorize;
use inquire::{Select, Text};

use super::Workspace;
use crate::storage::UserStore;
use crate::users::Role;

/// Create a profile and make it the current one
pub async fn create(name: Option<String>, role: Option<Role>) -> Result<()> {
    let mut ws = Workspace::open()?;

    let name = match name {
        Some(n) => n,
        None => Text::new("Profile name:").prompt()?,
    };
    let role = match role {
        Some(r) => r,
        None => Select::new("Role:", vec![Role::Student, Role::Teacher]).prompt()?,
    };

    let id = UserStore::new(&ws.db).create(&name, role, ws.now())?;
    ws.config.current_user = Some(id);
    ws.config.save()?;

    println!(
        "{} Created {} profile '{}' and switched to it",
        "✓".green(),
        role,
        name.trim().bold()
    );
    Ok(())
}

pub async fn switch(name: Option<String>) -> Result<()> {
    let mut ws = Workspace::open()?;
    let store = UserStore::new(&ws.db);

    let user = match name {
        Some(name) => store
            .get_by_name(&name)?
            .ok_or_else(|| anyhow::anyhow!("No profile named '{}'", name.trim()))?,
        None => {
            let users = store.list()?;
            if users.is_empty() {
                anyhow::bail!("No profiles yet. Run 'quizwhiz user create' first.");
            }
            let labels: Vec<String> = users
                .iter()
                .map(|u| format!("{} ({})", u.name, u.role))
                .collect();
            let picked = Select::new("Switch to:", labels.clone()).prompt()?;
            let index = labels.iter().position(|l| *l == picked).unwrap_or(0);
            users[index].clone()
        }
    };

    ws.config.current_user = Some(user.id);
    ws.config.save()?;
    println!("{} Now using '{}' ({})", "✓".green(), user.name.bold(), user.role);
    Ok(())
}

pub async fn list() -> Result<()> {
    let ws = Workspace::open()?;
    let users = UserStore::new(&ws.db).list()?;

    if users.is_empty() {
        println!("{}", "No profiles yet.".dimmed());
        println!("Use {} to create one.", "quizwhiz user create".cyan());
        return Ok(());
    }

    for user in &users {
        let marker = if ws.config.current_user == Some(user.id) {
            "●".green()
        } else {
            " ".normal()
        };
        println!(
            "  {} {} {} {}",
            marker,
            format!("[{}]", user.id).dimmed(),
            user.name.bold(),
            user.role.to_string().dimmed()
        );
    }

    Ok(())
}

pub async fn whoami() -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    println!(
        "{} ({}), profile since {}",
        user.name.bold(),
        user.role,
        user.created_at.format("%Y-%m-%d")
    );
    Ok(())
}
