//! Module and course rollups over the score log.
//!
//! Rollups are pure reads: group a user's score entries by module, split
//! them into an evaluation bucket and a conversation bucket, take a
//! weight-weighted mean per bucket, and blend the buckets with a fixed
//! completion contribution.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QuizError;
use crate::model::{Course, Score, UnitScore, UserId};
use crate::store::QuizStore;

/// Score type of entries that land in the evaluation bucket.
pub const EVALUATION_SCORE_TYPE: &str = "evaluation_engine";

/// Score types that land in the conversation bucket.
pub const CONVERSATION_SCORE_TYPES: [&str; 2] = ["conversation_evaluation", "question_depth"];

/// Fixed contribution of question completion to a module total.
pub const COMPLETION_CONTRIBUTION: f64 = 0.5;
pub const EVALUATION_WEIGHT: f64 = 0.35;
pub const CONVERSATION_WEIGHT: f64 = 0.15;

/// Discrete grade for a module or course total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBand {
    /// Below 0.25. Also the band of an empty course.
    #[default]
    Yellow,
    /// 0.25 up to 0.50.
    Blue,
    /// 0.50 up to 0.75.
    Orange,
    /// 0.75 and above.
    Red,
}

impl GradeBand {
    pub fn from_total(total: f64) -> Self {
        if total < 0.25 {
            GradeBand::Yellow
        } else if total < 0.50 {
            GradeBand::Blue
        } else if total < 0.75 {
            GradeBand::Orange
        } else {
            GradeBand::Red
        }
    }
}

impl fmt::Display for GradeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GradeBand::Yellow => "yellow",
            GradeBand::Blue => "blue",
            GradeBand::Orange => "orange",
            GradeBand::Red => "red",
        };
        f.write_str(name)
    }
}

/// Derived summary of one module for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleScoreSummary {
    pub module_id: Uuid,
    pub total_score: f64,
    pub grade: GradeBand,
    pub question_completion_score: f64,
    pub evaluation_score: f64,
    pub conversation_score: f64,
    pub evaluation_count: usize,
    pub conversation_count: usize,
}

/// Derived summary of a course: module summaries averaged over every
/// module in the course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseScoreSummary {
    pub course_id: Uuid,
    pub course_name: String,
    pub total_score: f64,
    pub grade: GradeBand,
    pub question_completion_score: f64,
    pub evaluation_score: f64,
    pub conversation_score: f64,
    /// Summed over modules, not averaged.
    pub evaluation_count: usize,
    pub conversation_count: usize,
}

#[derive(Default)]
struct Bucket {
    weighted_sum: f64,
    weight_sum: f64,
    count: usize,
}

impl Bucket {
    fn push(&mut self, value: f64, weight: f64) {
        self.weighted_sum += value * weight;
        self.weight_sum += weight;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.weight_sum > 0.0 {
            self.weighted_sum / self.weight_sum
        } else {
            0.0
        }
    }
}

#[derive(Default)]
struct ModuleBuckets {
    evaluation: Bucket,
    conversation: Bucket,
}

/// Summaries for every module the entries reference, ordered by module id.
///
/// Entries without a module are ignored. A module whose entries all have
/// other score types still gets a summary carrying only the completion
/// contribution.
pub fn summarize_modules(scores: &[Score]) -> Vec<ModuleScoreSummary> {
    let mut modules: BTreeMap<Uuid, ModuleBuckets> = BTreeMap::new();
    for score in scores {
        let Some(module_id) = score.module_id else {
            continue;
        };
        let buckets = modules.entry(module_id).or_default();
        let value = score.dimension_mean();
        if score.score_type == EVALUATION_SCORE_TYPE {
            buckets.evaluation.push(value, score.weight);
        } else if CONVERSATION_SCORE_TYPES.contains(&score.score_type.as_str()) {
            buckets.conversation.push(value, score.weight);
        }
    }

    modules
        .into_iter()
        .map(|(module_id, buckets)| {
            let evaluation_score = buckets.evaluation.mean();
            let conversation_score = buckets.conversation.mean();
            let total_score = COMPLETION_CONTRIBUTION
                + EVALUATION_WEIGHT * evaluation_score
                + CONVERSATION_WEIGHT * conversation_score;
            ModuleScoreSummary {
                module_id,
                total_score,
                grade: GradeBand::from_total(total_score),
                question_completion_score: COMPLETION_CONTRIBUTION,
                evaluation_score,
                conversation_score,
                evaluation_count: buckets.evaluation.count,
                conversation_count: buckets.conversation.count,
            }
        })
        .collect()
}

/// Average module summaries over all modules of a course.
///
/// Modules without a summary count as all zero, so unattempted modules pull
/// the average down. A module listed twice counts once. An empty course is
/// all zero with the default band.
pub fn summarize_course(course: &Course, modules: &[ModuleScoreSummary]) -> CourseScoreSummary {
    let mut summary = CourseScoreSummary {
        course_id: course.id,
        course_name: course.name.clone(),
        total_score: 0.0,
        grade: GradeBand::default(),
        question_completion_score: 0.0,
        evaluation_score: 0.0,
        conversation_score: 0.0,
        evaluation_count: 0,
        conversation_count: 0,
    };
    let mut seen = HashSet::new();
    let module_ids: Vec<Uuid> = course
        .module_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();
    if module_ids.is_empty() {
        return summary;
    }

    for module_id in &module_ids {
        let Some(module) = modules.iter().find(|m| m.module_id == *module_id) else {
            continue;
        };
        summary.total_score += module.total_score;
        summary.question_completion_score += module.question_completion_score;
        summary.evaluation_score += module.evaluation_score;
        summary.conversation_score += module.conversation_score;
        summary.evaluation_count += module.evaluation_count;
        summary.conversation_count += module.conversation_count;
    }

    let n = module_ids.len() as f64;
    summary.total_score /= n;
    summary.question_completion_score /= n;
    summary.evaluation_score /= n;
    summary.conversation_score /= n;
    summary.grade = GradeBand::from_total(summary.total_score);
    summary
}

/// A score entry to append to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScore {
    pub user_id: UserId,
    #[serde(default)]
    pub module_id: Option<Uuid>,
    pub score_type: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub correctness: f64,
    pub conceptual_depth: f64,
    pub reasoning_quality: f64,
    pub confidence_alignment: f64,
    #[serde(default)]
    pub misconceptions: Vec<String>,
    #[serde(default)]
    pub feedback: Option<String>,
}

fn default_weight() -> f64 {
    1.0
}

/// Append an entry to the score log. Dimensions are clamped to `[0, 1]`.
pub async fn record_score(store: &dyn QuizStore, new: NewScore) -> Result<Score, QuizError> {
    if !new.weight.is_finite() || new.weight <= 0.0 {
        return Err(QuizError::Validation(format!(
            "score weight must be positive, got {}",
            new.weight
        )));
    }
    if new.score_type.trim().is_empty() {
        return Err(QuizError::Validation("score_type is empty".into()));
    }

    let score = Score {
        id: Uuid::new_v4(),
        user_id: new.user_id,
        module_id: new.module_id,
        score_type: new.score_type,
        weight: new.weight,
        correctness: UnitScore::from_f64(new.correctness),
        conceptual_depth: UnitScore::from_f64(new.conceptual_depth),
        reasoning_quality: UnitScore::from_f64(new.reasoning_quality),
        confidence_alignment: UnitScore::from_f64(new.confidence_alignment),
        misconceptions: new.misconceptions,
        feedback: new.feedback,
        created_at: Utc::now(),
    };
    store.append_score(score.clone()).await?;
    tracing::debug!(score_id = %score.id, score_type = %score.score_type, "recorded score");
    Ok(score)
}

/// Module summaries for a user, read from the store.
pub async fn module_summaries(
    store: &dyn QuizStore,
    user_id: UserId,
) -> Result<Vec<ModuleScoreSummary>, QuizError> {
    let scores = store.scores_for_user(user_id).await?;
    Ok(summarize_modules(&scores))
}

/// Course summary for a user. Unknown courses are not found.
pub async fn course_summary(
    store: &dyn QuizStore,
    user_id: UserId,
    course_id: Uuid,
) -> Result<CourseScoreSummary, QuizError> {
    let course = store
        .get_course(course_id)
        .await?
        .ok_or_else(|| QuizError::NotFound(format!("course {course_id}")))?;
    let modules = module_summaries(store, user_id).await?;
    Ok(summarize_course(&course, &modules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn entry(module_id: Option<Uuid>, score_type: &str, weight: f64, value: f64) -> Score {
        let v = UnitScore::from_f64(value);
        Score {
            id: Uuid::new_v4(),
            user_id: 1,
            module_id,
            score_type: score_type.into(),
            weight,
            correctness: v,
            conceptual_depth: v,
            reasoning_quality: v,
            confidence_alignment: v,
            misconceptions: vec![],
            feedback: None,
            created_at: Utc::now(),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rollup_weights_sum_to_one() {
        assert!(close(
            COMPLETION_CONTRIBUTION + EVALUATION_WEIGHT + CONVERSATION_WEIGHT,
            1.0
        ));
    }

    #[test]
    fn bands_cover_the_range() {
        assert_eq!(GradeBand::from_total(0.0), GradeBand::Yellow);
        assert_eq!(GradeBand::from_total(0.2499), GradeBand::Yellow);
        assert_eq!(GradeBand::from_total(0.25), GradeBand::Blue);
        assert_eq!(GradeBand::from_total(0.5), GradeBand::Orange);
        assert_eq!(GradeBand::from_total(0.75), GradeBand::Red);
        assert_eq!(GradeBand::from_total(1.0), GradeBand::Red);
        assert_eq!(GradeBand::Orange.to_string(), "orange");
    }

    #[test]
    fn weighted_means_per_bucket() {
        let module = Uuid::new_v4();
        let scores = vec![
            entry(Some(module), EVALUATION_SCORE_TYPE, 1.0, 1.0),
            entry(Some(module), EVALUATION_SCORE_TYPE, 3.0, 0.2),
            entry(Some(module), "question_depth", 1.0, 0.4),
            entry(Some(module), "conversation_evaluation", 1.0, 0.8),
            entry(None, EVALUATION_SCORE_TYPE, 1.0, 1.0),
            entry(Some(module), "unrelated", 1.0, 1.0),
        ];
        let summaries = summarize_modules(&scores);
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert!(close(s.evaluation_score, (1.0 + 0.6) / 4.0));
        assert!(close(s.conversation_score, 0.6));
        assert_eq!(s.evaluation_count, 2);
        assert_eq!(s.conversation_count, 2);
        assert!(close(s.total_score, 0.5 + 0.35 * 0.4 + 0.15 * 0.6));
        assert_eq!(s.grade, GradeBand::Orange);
    }

    #[test]
    fn module_with_only_other_entries_gets_completion_only() {
        let module = Uuid::new_v4();
        let summaries = summarize_modules(&[entry(Some(module), "unrelated", 1.0, 1.0)]);
        assert_eq!(summaries[0].total_score, COMPLETION_CONTRIBUTION);
        assert_eq!(summaries[0].evaluation_count, 0);
    }

    #[test]
    fn empty_course_is_zero_with_default_band() {
        let course = Course {
            id: Uuid::new_v4(),
            name: "Empty".into(),
            module_ids: vec![],
        };
        let summary = summarize_course(&course, &[]);
        assert_eq!(summary.total_score, 0.0);
        assert_eq!(summary.grade, GradeBand::Yellow);
    }

    #[test]
    fn unattempted_modules_drag_course_average() {
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let modules = summarize_modules(&[entry(Some(m1), EVALUATION_SCORE_TYPE, 1.0, 1.0)]);
        let course = Course {
            id: Uuid::new_v4(),
            name: "Data structures".into(),
            module_ids: vec![m1, m2],
        };
        let summary = summarize_course(&course, &modules);
        assert!(close(summary.total_score, 0.85 / 2.0));
        assert!(close(summary.question_completion_score, 0.25));
        assert_eq!(summary.evaluation_count, 1);
        assert_eq!(summary.grade, GradeBand::Blue);
    }

    #[test]
    fn repeated_course_module_counts_once() {
        let (m1, m2) = (Uuid::new_v4(), Uuid::new_v4());
        let modules = summarize_modules(&[entry(Some(m1), EVALUATION_SCORE_TYPE, 1.0, 1.0)]);
        let course = Course {
            id: Uuid::new_v4(),
            name: "Data structures".into(),
            module_ids: vec![m1, m2, m1],
        };
        let summary = summarize_course(&course, &modules);
        assert!(close(summary.total_score, 0.85 / 2.0));
        assert_eq!(summary.evaluation_count, 1);
        assert_eq!(summary.grade, GradeBand::Blue);
    }

    #[tokio::test]
    async fn record_and_summarize_through_store() {
        let store = MemoryStore::new();
        let module = Uuid::new_v4();
        let new = NewScore {
            user_id: 1,
            module_id: Some(module),
            score_type: EVALUATION_SCORE_TYPE.into(),
            weight: 1.0,
            correctness: 1.4,
            conceptual_depth: 1.0,
            reasoning_quality: 1.0,
            confidence_alignment: 1.0,
            misconceptions: vec![],
            feedback: None,
        };
        let stored = record_score(&store, new.clone()).await.unwrap();
        assert_eq!(stored.correctness, UnitScore::ONE);

        let err = record_score(&store, NewScore { weight: 0.0, ..new }).await.unwrap_err();
        assert!(matches!(err, QuizError::Validation(_)));

        let summaries = module_summaries(&store, 1).await.unwrap();
        assert!(close(summaries[0].total_score, 0.85));
        assert!(module_summaries(&store, 2).await.unwrap().is_empty());

        let err = course_summary(&store, 1, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, QuizError::NotFound(_)));

        let course = Course {
            id: Uuid::new_v4(),
            name: "Lists".into(),
            module_ids: vec![module],
        };
        store.put_course(course.clone()).await.unwrap();
        let summary = course_summary(&store, 1, course.id).await.unwrap();
        assert_eq!(summary.grade, GradeBand::Red);
    }
}
