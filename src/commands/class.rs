use anyhow::Result;
use colored::Colorize;
use inquire::{Select, Text};

use super::{Workspace, confirm, print_section, prompt_id};
use crate::classroom::analytics::{AssignmentReport, StudentReport};
use crate::classroom::{load_assignment_report, load_student_reports};
use crate::storage::{AssignmentStore, Class, ClassStore, UserStore};
use crate::users::User;

pub async fn create(name: Option<String>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    user.require_teacher("create classes")?;

    let name = match name {
        Some(n) => n,
        None => Text::new("Class name:").prompt()?,
    };
    if name.trim().is_empty() {
        anyhow::bail!("Class name cannot be empty");
    }

    let class = ClassStore::new(&ws.db).create(user.id, name.trim(), ws.now())?;
    println!("{} Created class '{}'", "✓".green(), class.name.bold());
    println!(
        "  Students join with {}",
        format!("quizwhiz class join {}", class.join_code).cyan().bold()
    );
    Ok(())
}

pub async fn join(code: Option<String>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;

    let code = match code {
        Some(c) => c,
        None => Text::new("Join code:").prompt()?,
    };

    let store = ClassStore::new(&ws.db);
    let Some(class) = store.by_code(&code)? else {
        println!("{} No class with code '{}'", "✗".red(), code.trim());
        return Ok(());
    };

    if store.enroll(class.id, user.id, ws.now())? {
        println!("{} Joined '{}'", "✓".green(), class.name.bold());
    } else {
        println!("{} Already a member of '{}'", "⊘".yellow(), class.name);
    }
    Ok(())
}

pub async fn list() -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let store = ClassStore::new(&ws.db);

    let classes = if user.is_teacher() {
        store.list_for_teacher(user.id)?
    } else {
        store.list_for_student(user.id)?
    };

    if classes.is_empty() {
        println!("{}", "No classes yet.".dimmed());
        if user.is_teacher() {
            println!("Use {} to start one.", "quizwhiz class create".cyan());
        } else {
            println!("Ask your teacher for a join code.");
        }
        return Ok(());
    }

    println!("\n{} ({})\n", "Classes".bold(), classes.len());
    for class in &classes {
        let code = if user.is_teacher() {
            format!(" code {}", class.join_code.cyan())
        } else {
            String::new()
        };
        println!(
            "  {} {} {}{}",
            format!("[{}]", class.id).dimmed(),
            class.name.bold(),
            format!("({} students)", class.student_count).dimmed(),
            code
        );
    }
    Ok(())
}

/// Load a class the current teacher owns, or explain why not
fn owned_class(ws: &Workspace, teacher: &User, id: Option<i64>) -> Result<Class> {
    teacher.require_teacher("manage classes")?;
    let store = ClassStore::new(&ws.db);

    let id = match id {
        Some(id) => id,
        None => {
            let classes = store.list_for_teacher(teacher.id)?;
            if classes.is_empty() {
                anyhow::bail!("You have no classes. Run 'quizwhiz class create' first.");
            }
            let labels: Vec<String> = classes
                .iter()
                .map(|c| format!("[{}] {}", c.id, c.name))
                .collect();
            let picked = Select::new("Class:", labels.clone()).prompt()?;
            let index = labels.iter().position(|l| *l == picked).unwrap_or(0);
            classes[index].id
        }
    };

    store
        .get(id)?
        .filter(|c| c.teacher_id == teacher.id)
        .ok_or_else(|| anyhow::anyhow!("Class {} not found among your classes", id))
}

pub async fn roster(class_id: Option<i64>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let class = owned_class(&ws, &user, class_id)?;
    let students = ClassStore::new(&ws.db).roster(class.id)?;

    print_section(&format!(
        "{} (code {}, created {})",
        class.name,
        class.join_code,
        class.created_at.format("%Y-%m-%d")
    ));
    if students.is_empty() {
        println!("  {}", "No students yet.".dimmed());
    }
    for student in &students {
        println!("  {} {}", format!("[{}]", student.id).dimmed(), student.name);
    }
    Ok(())
}

pub async fn remove(class_id: Option<i64>, student: Option<String>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let class = owned_class(&ws, &user, class_id)?;

    let student = match student {
        Some(name) => UserStore::new(&ws.db)
            .get_by_name(&name)?
            .ok_or_else(|| anyhow::anyhow!("No profile named '{}'", name.trim()))?,
        None => {
            let id = prompt_id(None, "Student ID to remove:")?;
            UserStore::new(&ws.db)
                .get(id)?
                .ok_or_else(|| anyhow::anyhow!("No profile with ID {}", id))?
        }
    };

    if !confirm(&format!("Remove {} from '{}'?", student.name, class.name))? {
        println!("{}", "Cancelled.".dimmed());
        return Ok(());
    }

    if ClassStore::new(&ws.db).remove_student(class.id, student.id)? {
        println!("{} Removed {} from '{}'", "✓".green(), student.name, class.name);
    } else {
        println!("{} {} is not in '{}'", "⊘".yellow(), student.name, class.name);
    }
    Ok(())
}

/// Class dashboard: student standing, then every assignment
pub async fn analytics(class_id: Option<i64>) -> Result<()> {
    let ws = Workspace::open()?;
    let user = ws.current_user()?;
    let class = owned_class(&ws, &user, class_id)?;

    println!();
    println!(
        "    {}",
        "╭──────────────────────────────────────────────────────╮".cyan()
    );
    println!(
        "    {}   {} {}",
        "│".cyan(),
        "📊 CLASS ANALYTICS:".bold().white(),
        class.name.bold().white()
    );
    println!(
        "    {}",
        "╰──────────────────────────────────────────────────────╯".cyan()
    );

    let students = load_student_reports(&ws.db, class.id)?;
    print_section("Students");
    if students.is_empty() {
        println!("  {}", "No students enrolled.".dimmed());
    }
    for report in &students {
        print_student(report);
    }

    let assignments = AssignmentStore::new(&ws.db).list_for_class(class.id)?;
    for assignment in &assignments {
        let report = load_assignment_report(&ws.db, assignment)?;
        let due = assignment
            .due_at
            .map(|d| format!(" due {}", d.format("%Y-%m-%d %H:%M")))
            .unwrap_or_default();
        print_section(&format!("{}{}", assignment.title, due));
        print_assignment(&report);
    }

    Ok(())
}

fn print_student(report: &StudentReport) {
    let flag = if report.at_risk {
        "at risk".red().bold()
    } else {
        "on track".green()
    };
    let average = report
        .average_score
        .map(|a| format!("{:.0}%", a))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  {:<20} {}/{} done  avg {:>4}  {} misconception(s)  {}",
        report.name,
        report.completed,
        report.assigned,
        average,
        report.misconceptions,
        flag
    );
}

fn print_assignment(report: &AssignmentReport) {
    let score = |s: Option<f64>| {
        s.map(|v| format!("{:.0}%", v))
            .unwrap_or_else(|| "-".to_string())
    };
    println!(
        "  Submitted {}/{} ({:.0}%), {} late",
        report.submitted,
        report.enrolled,
        report.completion_rate() * 100.0,
        report.late
    );
    println!(
        "  Scores: avg {}  min {}  max {}",
        score(report.average_score),
        score(report.min_score),
        score(report.max_score)
    );

    if !report.questions.is_empty() {
        println!("  {}", "Hardest questions:".bold());
        for stat in report.questions.iter().take(3) {
            println!(
                "    {:>3.0}% correct  {} {}",
                stat.accuracy() * 100.0,
                stat.prompt,
                format!("({})", stat.concept).dimmed()
            );
        }
    }

    for misconception in &report.misconceptions {
        println!(
            "  {} {:.0}% of the class was sure about a wrong answer to: {}",
            "‼".red().bold(),
            misconception.share * 100.0,
            misconception.prompt
        );
    }
}
