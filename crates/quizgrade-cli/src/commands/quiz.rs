//! The `quizgrade quiz` command.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use quizgrade_core::aggregation::Dimension;
use quizgrade_core::engine::{QuizEngine, SubmitRequest};
use quizgrade_core::parser::{load_banks, QuestionBank};
use quizgrade_core::results::{QuizOutcome, QuizReport};
use quizgrade_core::store::{MemoryStore, QuizStore};
use quizgrade_core::subjective::SubjectiveEvaluator;
use quizgrade_providers::{create_provider, load_config_from};

pub struct QuizArgs {
    pub bank: PathBuf,
    pub module: Option<Uuid>,
    pub answers: PathBuf,
    pub user: i64,
    pub offline: bool,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct AnswerFile {
    #[serde(default)]
    answers: Vec<AnswerEntry>,
}

#[derive(Debug, Deserialize)]
struct AnswerEntry {
    question_id: Uuid,
    answer: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    5.0
}

fn load_answers(path: &Path) -> Result<HashMap<Uuid, AnswerEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers: {}", path.display()))?;
    let parsed: AnswerFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse answers: {}", path.display()))?;
    Ok(parsed
        .answers
        .into_iter()
        .map(|a| (a.question_id, a))
        .collect())
}

fn pick_module(banks: &[QuestionBank], module: Option<Uuid>) -> Result<Uuid> {
    match module {
        Some(id) => {
            anyhow::ensure!(
                banks.iter().any(|b| b.module_id == id),
                "module {id} not found in the loaded banks"
            );
            Ok(id)
        }
        None => match banks {
            [bank] => Ok(bank.module_id),
            [] => anyhow::bail!("no question banks loaded"),
            _ => anyhow::bail!(
                "{} modules loaded; pick one with --module",
                banks.len()
            ),
        },
    }
}

fn build_evaluator(config_path: Option<&Path>) -> Result<SubjectiveEvaluator> {
    let config = load_config_from(config_path)?;
    let provider_config = config
        .providers
        .get(&config.default_provider)
        .with_context(|| {
            format!(
                "provider '{}' not found in config (use --offline to grade without a model)",
                config.default_provider
            )
        })?;
    let provider = create_provider(provider_config)?;
    Ok(SubjectiveEvaluator::new(
        Arc::from(provider),
        config.evaluator_config(),
    ))
}

pub async fn execute(args: QuizArgs) -> Result<()> {
    let banks = load_banks(&args.bank)?;
    let module_id = pick_module(&banks, args.module)?;
    let answers = load_answers(&args.answers)?;

    let store = Arc::new(MemoryStore::new());
    for bank in &banks {
        store.put_module_content(bank.module_content()).await?;
        for question in &bank.questions {
            store.insert_question(question.clone()).await?;
        }
    }

    let evaluator = if args.offline {
        None
    } else {
        Some(build_evaluator(args.config.as_deref())?)
    };
    if let Some(evaluator) = &evaluator {
        tracing::info!(provider = evaluator.provider_name(), "grading subjective answers");
    }

    let engine = QuizEngine::new(store, evaluator);
    let started = engine.start(args.user, module_id).await?;
    eprintln!(
        "quizgrade v{} - {} questions in session {}",
        env!("CARGO_PKG_VERSION"),
        started.questions.len(),
        started.session_id
    );

    for question in &started.questions {
        let (user_answer, confidence) = match answers.get(&question.id) {
            Some(entry) => (entry.answer.clone(), entry.confidence),
            None => {
                eprintln!("  [{}] no answer provided, submitting blank", question.id);
                (String::new(), default_confidence())
            }
        };
        let outcome = engine
            .submit(
                args.user,
                SubmitRequest {
                    session_id: started.session_id,
                    question_id: question.id,
                    user_answer,
                    confidence,
                },
            )
            .await?;
        eprintln!(
            "  [{}] {} {}",
            question.id, question.question_type, outcome.message
        );
    }

    let outcome = engine.result(args.user, started.session_id).await?;
    match &outcome {
        QuizOutcome::InProgress(progress) => {
            println!(
                "Quiz in progress: {}/{} answered, {} still needed.",
                progress.total_attempted, progress.total_questions, progress.questions_needed
            );
        }
        QuizOutcome::Complete(report) => print_report(report),
    }

    if let Some(output) = &args.output {
        std::fs::create_dir_all(output)?;
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
        let path = output.join(format!("quiz-{timestamp}.json"));
        let json = serde_json::to_string_pretty(&outcome)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write report: {}", path.display()))?;
        eprintln!("Results saved to: {}", path.display());
    }

    Ok(())
}

fn score_cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn print_report(report: &QuizReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "Question",
        "Type",
        "Answer",
        "Correctness",
        "Depth",
        "Reasoning",
        "Confidence",
        "Feedback",
    ]);

    for row in &report.per_question {
        let answer: String = row
            .user_answer
            .as_deref()
            .unwrap_or("-")
            .chars()
            .take(40)
            .collect();
        table.add_row(vec![
            Cell::new(row.question_id),
            Cell::new(row.question_type),
            Cell::new(answer),
            Cell::new(score_cell(row.scores.correctness)),
            Cell::new(score_cell(row.scores.conceptual_depth)),
            Cell::new(score_cell(row.scores.reasoning_quality)),
            Cell::new(score_cell(row.scores.confidence_alignment)),
            Cell::new(row.feedback.as_deref().unwrap_or("")),
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "Correctness: {:.2}% over {} questions",
        report.correctness_percentage, report.total_questions
    );
    for dimension in Dimension::ALL {
        println!(
            "  {:<22} {:.4}",
            dimension.label(),
            report.aggregated_scores.get(dimension)
        );
    }
    println!("  {:<22} {:.4}", "Composite", report.aggregated_scores.composite);

    if !report.insights.strengths.is_empty() {
        println!("Strengths: {}", report.insights.strengths.join(", "));
    }
    if !report.insights.weak_areas.is_empty() {
        println!("Weak areas: {}", report.insights.weak_areas.join(", "));
    }
}
