//! The `quizgrade scores` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use quizgrade_core::model::Course;
use quizgrade_core::rollup::{course_summary, module_summaries, record_score, NewScore};
use quizgrade_core::store::{MemoryStore, QuizStore};

fn load_log(path: &Path) -> Result<Vec<NewScore>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read score log: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse score log: {}", path.display()))
}

fn load_course(path: &Path) -> Result<Course> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read course: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse course: {}", path.display()))
}

pub async fn execute(log_path: PathBuf, user: i64, course_path: Option<PathBuf>) -> Result<()> {
    let entries = load_log(&log_path)?;
    let store = MemoryStore::new();

    let mut skipped = 0;
    for entry in entries {
        if let Err(e) = record_score(&store, entry).await {
            tracing::warn!("skipping score entry: {e}");
            skipped += 1;
        }
    }
    if skipped > 0 {
        eprintln!("Skipped {skipped} invalid score entries.");
    }

    let modules = module_summaries(&store, user).await?;
    if modules.is_empty() {
        println!("No module scores for user {user}.");
    } else {
        print_modules(&modules);
    }

    if let Some(path) = course_path {
        let course = load_course(&path)?;
        let course_id = course.id;
        store.put_course(course).await?;
        let summary = course_summary(&store, user, course_id).await?;
        println!();
        println!(
            "Course: {} [{}] total {:.4} ({})",
            summary.course_name, summary.course_id, summary.total_score, summary.grade
        );
        println!(
            "  completion {:.4}, evaluation {:.4} ({} entries), conversation {:.4} ({} entries)",
            summary.question_completion_score,
            summary.evaluation_score,
            summary.evaluation_count,
            summary.conversation_score,
            summary.conversation_count
        );
    }

    Ok(())
}

fn print_modules(modules: &[quizgrade_core::rollup::ModuleScoreSummary]) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "Module",
        "Total",
        "Grade",
        "Completion",
        "Evaluation",
        "Conversation",
        "Entries",
    ]);

    for m in modules {
        table.add_row(vec![
            Cell::new(m.module_id),
            Cell::new(format!("{:.4}", m.total_score)),
            Cell::new(m.grade),
            Cell::new(format!("{:.2}", m.question_completion_score)),
            Cell::new(format!("{:.4}", m.evaluation_score)),
            Cell::new(format!("{:.4}", m.conversation_score)),
            Cell::new(format!("{}/{}", m.evaluation_count, m.conversation_count)),
        ]);
    }

    println!("{table}");
}
