//! Session-level aggregation: per-dimension means, the weighted composite,
//! and rule-based strengths and weak areas.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::EvaluationResult;

/// One of the four scored dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Correctness,
    ConceptualDepth,
    ReasoningQuality,
    ConfidenceAlignment,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Correctness,
        Dimension::ConceptualDepth,
        Dimension::ReasoningQuality,
        Dimension::ConfidenceAlignment,
    ];

    /// Label used in strengths and weak areas.
    pub fn label(self) -> &'static str {
        match self {
            Dimension::Correctness => "Correctness",
            Dimension::ConceptualDepth => "Conceptual depth",
            Dimension::ReasoningQuality => "Reasoning quality",
            Dimension::ConfidenceAlignment => "Confidence alignment",
        }
    }

    /// Weight of this dimension in the composite score.
    pub fn weight(self) -> f64 {
        match self {
            Dimension::Correctness => 0.40,
            Dimension::ConceptualDepth => 0.30,
            Dimension::ReasoningQuality => 0.20,
            Dimension::ConfidenceAlignment => 0.10,
        }
    }

    /// A mean at or above this (and at or above the composite) is a strength.
    fn strength_floor(self) -> f64 {
        match self {
            Dimension::Correctness => 0.6,
            _ => 0.5,
        }
    }

    /// A mean below this is a weak area.
    fn weak_ceiling(self) -> f64 {
        match self {
            Dimension::Correctness => 0.5,
            _ => 0.4,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Dimension values of one question's result. `None` means not reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub correctness: Option<f64>,
    pub conceptual_depth: Option<f64>,
    pub reasoning_quality: Option<f64>,
    pub confidence_alignment: Option<f64>,
}

impl DimensionScores {
    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        match dimension {
            Dimension::Correctness => self.correctness,
            Dimension::ConceptualDepth => self.conceptual_depth,
            Dimension::ReasoningQuality => self.reasoning_quality,
            Dimension::ConfidenceAlignment => self.confidence_alignment,
        }
    }
}

impl From<&EvaluationResult> for DimensionScores {
    fn from(result: &EvaluationResult) -> Self {
        Self {
            correctness: Some(result.correctness.as_f64()),
            conceptual_depth: Some(result.conceptual_depth.as_f64()),
            reasoning_quality: Some(result.reasoning_quality.as_f64()),
            confidence_alignment: Some(result.confidence_alignment.as_f64()),
        }
    }
}

/// Published session aggregate. Every figure is rounded to four decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedScores {
    pub correctness: f64,
    pub conceptual_depth: f64,
    pub reasoning_quality: f64,
    pub confidence_alignment: f64,
    pub composite: f64,
}

impl AggregatedScores {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Correctness => self.correctness,
            Dimension::ConceptualDepth => self.conceptual_depth,
            Dimension::ReasoningQuality => self.reasoning_quality,
            Dimension::ConfidenceAlignment => self.confidence_alignment,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insights {
    pub strengths: Vec<String>,
    pub weak_areas: Vec<String>,
}

/// Round to four decimals.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Weighted blend of the four dimension values.
pub fn composite(values: impl Fn(Dimension) -> f64) -> f64 {
    Dimension::ALL.iter().map(|&d| d.weight() * values(d)).sum()
}

/// Mean of one dimension over all questions; unreported values count as 0.
fn mean(results: &[DimensionScores], dimension: Dimension) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results.iter().map(|r| r.get(dimension).unwrap_or(0.0)).sum();
    total / results.len() as f64
}

/// Per-dimension means and the composite over a session's results.
pub fn aggregate(results: &[DimensionScores]) -> AggregatedScores {
    if results.is_empty() {
        return AggregatedScores::default();
    }
    let blended = composite(|d| mean(results, d));
    AggregatedScores {
        correctness: round4(mean(results, Dimension::Correctness)),
        conceptual_depth: round4(mean(results, Dimension::ConceptualDepth)),
        reasoning_quality: round4(mean(results, Dimension::ReasoningQuality)),
        confidence_alignment: round4(mean(results, Dimension::ConfidenceAlignment)),
        composite: round4(blended),
    }
}

/// Label strengths and weak areas against the published composite.
///
/// Correctness is always judged. The other dimensions are only called weak
/// when at least one question actually reported them.
pub fn infer_insights(results: &[DimensionScores], composite: f64) -> Insights {
    let mut insights = Insights::default();
    if results.is_empty() {
        return insights;
    }

    for dimension in Dimension::ALL {
        let mean = mean(results, dimension);
        let reported = dimension == Dimension::Correctness
            || results.iter().any(|r| r.get(dimension).is_some());

        if mean >= composite && mean >= dimension.strength_floor() {
            insights.strengths.push(dimension.label().to_string());
        } else if mean < dimension.weak_ceiling() && reported {
            insights.weak_areas.push(dimension.label().to_string());
        }
    }
    insights
}
