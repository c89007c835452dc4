//! TOML question bank parser.
//!
//! Loads question banks from TOML files and directories, and validates them.
//! One file holds the bank of one module.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::bank::check_question;
use crate::model::{CorrectAnswer, Difficulty, ModuleContent, Question, QuestionType};

/// A parsed question bank for one module.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    pub module_id: Uuid,
    pub title: Option<String>,
    /// Study material passed to the model as context.
    pub context: Option<String>,
    pub questions: Vec<Question>,
}

impl QuestionBank {
    pub fn module_content(&self) -> ModuleContent {
        ModuleContent {
            module_id: self.module_id,
            title: self.title.clone(),
            content: self.context.clone(),
        }
    }

    pub fn type_counts(&self) -> BTreeMap<QuestionType, usize> {
        let mut counts = BTreeMap::new();
        for q in &self.questions {
            *counts.entry(q.question_type).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    module_id: Uuid,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    /// Generated when absent.
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(rename = "type")]
    question_type: String,
    #[serde(default)]
    difficulty: Difficulty,
    text: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct_answer: Option<CorrectAnswer>,
    #[serde(default)]
    rubric: Option<serde_json::Value>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "default_weight")]
    weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Parse a single TOML file into a `QuestionBank`.
pub fn parse_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank`.
///
/// Questions that fail [`check_question`] reject the whole bank.
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let module_id = parsed.bank.module_id;
    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(index, q)| {
            let question_type: QuestionType = q
                .question_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{}", e))?;

            let question = Question {
                id: q.id.unwrap_or_else(Uuid::new_v4),
                module_id,
                question_type,
                difficulty: q.difficulty,
                text: q.text,
                options: q.options,
                correct_answer: q.correct_answer,
                evaluation_rubric: q.rubric,
                concept_tags: q.tags,
                weight: q.weight,
            };
            check_question(&question).with_context(|| {
                format!(
                    "invalid question #{} in {}",
                    index + 1,
                    source_path.display()
                )
            })?;
            Ok(question)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QuestionBank {
        module_id,
        title: parsed.bank.title,
        context: parsed.bank.context,
        questions,
    })
}

/// Recursively load all `.toml` question banks from a directory.
///
/// Files that fail to parse are skipped with a warning.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => tracing::warn!("skipping {}: {:#}", path.display(), e),
            }
        }
    }

    Ok(banks)
}

/// Load one bank file, or every bank under a directory.
pub fn load_banks(path: &Path) -> Result<Vec<QuestionBank>> {
    if path.is_dir() {
        load_bank_directory(path)
    } else {
        Ok(vec![parse_bank(path)?])
    }
}

/// A warning from bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub question_id: Option<Uuid>,
    pub message: String,
}

impl ValidationWarning {
    fn question(id: Uuid, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id),
            message: message.into(),
        }
    }
}

/// Validate a bank for authoring mistakes that parsing lets through.
///
/// Structural problems never get this far: the parser rejects them.
pub fn validate_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if bank.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "bank has no questions".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for q in &bank.questions {
        if !seen_ids.insert(q.id) {
            warnings.push(ValidationWarning::question(
                q.id,
                format!("duplicate question ID: {}", q.id),
            ));
        }

        if q.question_type.is_objective() {
            if let Some(answer) = &q.correct_answer {
                for value in answer.values() {
                    if !q.options.iter().any(|o| o == value) {
                        warnings.push(ValidationWarning::question(
                            q.id,
                            format!("correct answer '{value}' is not one of the options"),
                        ));
                    }
                }
            }
            if q.evaluation_rubric.is_some() {
                warnings.push(ValidationWarning::question(
                    q.id,
                    "rubric is ignored for objective questions",
                ));
            }
        } else {
            if q.evaluation_rubric.is_none() {
                warnings.push(ValidationWarning::question(
                    q.id,
                    "SUBJECTIVE question has no rubric",
                ));
            }
            if q.correct_answer.is_some() {
                warnings.push(ValidationWarning::question(
                    q.id,
                    "correct_answer is ignored for SUBJECTIVE questions",
                ));
            }
        }
    }

    warnings
}
