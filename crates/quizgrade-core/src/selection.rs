//! Question selection for new quiz sessions.
//!
//! The bank size of a module decides how many questions a session gets; a
//! fixed 40/30/30 split across types decides how many of each. The draw is
//! random per type and the combined list is shuffled once, after which the
//! session keeps that order for good.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::model::QuestionType;
use crate::store::{self, QuizStore};

/// Share of a quiz given to each question type. Sums to 1.0.
pub const TYPE_DISTRIBUTION: [(QuestionType, f64); 3] = [
    (QuestionType::Mcq, 0.40),
    (QuestionType::DoubleMcq, 0.30),
    (QuestionType::Subjective, 0.30),
];

/// Per-type question counts.
pub type TypeCounts = BTreeMap<QuestionType, usize>;

/// Size class of a module, derived from how many questions its bank holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleSize {
    Small,
    Medium,
    Large,
}

impl ModuleSize {
    /// Under 10 questions is small, up to 25 medium, anything above large.
    pub fn from_question_count(count: usize) -> Self {
        if count < 10 {
            ModuleSize::Small
        } else if count <= 25 {
            ModuleSize::Medium
        } else {
            ModuleSize::Large
        }
    }

    /// Inclusive range of questions a quiz of this size should have.
    pub fn question_range(self) -> RangeInclusive<usize> {
        match self {
            ModuleSize::Small => 3..=5,
            ModuleSize::Medium => 6..=10,
            ModuleSize::Large => 10..=15,
        }
    }

    /// Midpoint of the range, rounded down.
    pub fn target_count(self) -> usize {
        let range = self.question_range();
        (range.start() + range.end()) / 2
    }
}

/// Desired counts per type for a quiz of `total` questions.
///
/// Each share is rounded on its own, so the sum can overshoot `total`; the
/// overshoot is taken back from MCQ first, then DOUBLE_MCQ, then SUBJECTIVE,
/// keeping at least one of each while possible.
pub fn desired_counts(total: usize) -> TypeCounts {
    let mut counts: TypeCounts = TYPE_DISTRIBUTION
        .iter()
        .map(|&(qtype, share)| (qtype, (total as f64 * share).round_ties_even() as usize))
        .collect();

    for floor in [1, 0] {
        while counts.values().sum::<usize>() > total {
            let Some(count) = counts.values_mut().find(|c| **c > floor) else {
                break;
            };
            *count -= 1;
        }
    }
    counts
}

/// How many questions of each type to draw, given what the bank holds.
///
/// Returns an empty map when nothing is available.
pub fn plan_counts(available: &TypeCounts) -> TypeCounts {
    let available_of = |qtype: QuestionType| available.get(&qtype).copied().unwrap_or(0);
    let total_available: usize = QuestionType::ALL.iter().map(|&t| available_of(t)).sum();
    if total_available == 0 {
        return TypeCounts::new();
    }

    let size = ModuleSize::from_question_count(total_available);
    let target = size.target_count().min(total_available);

    let mut take: TypeCounts = desired_counts(target)
        .into_iter()
        .map(|(qtype, want)| (qtype, want.min(available_of(qtype))))
        .collect();

    let mut current: usize = take.values().sum();
    for qtype in QuestionType::ALL {
        if current >= target {
            break;
        }
        let entry = take.entry(qtype).or_insert(0);
        let spare = available_of(qtype).saturating_sub(*entry);
        let add = spare.min(target - current);
        *entry += add;
        current += add;
    }

    tracing::debug!(?size, target, ?take, "planned quiz composition");
    take
}

/// Pick the question ids for a new session of `module_id`.
///
/// An empty result means the module has no questions; the caller reports
/// that as not-found.
pub async fn select_questions(store: &dyn QuizStore, module_id: Uuid) -> store::Result<Vec<Uuid>> {
    let available = store.count_questions_by_type(module_id).await?;
    let plan = plan_counts(&available);

    let mut selected = Vec::with_capacity(plan.values().sum());
    for (&qtype, &count) in &plan {
        if count == 0 {
            continue;
        }
        selected.extend(store.sample_question_ids(module_id, qtype, count).await?);
    }

    selected.shuffle(&mut rand::thread_rng());
    Ok(selected)
}
