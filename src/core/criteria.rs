//! Weighted quality scoring for judge evaluations.
//!
//! A `JudgeCriteria` holds ten 0-100 sub-scores. The scalar quality score
//! is a dot product with a category-specific weight profile; each profile
//! sums to 1.0 so totals stay on the 0-100 scale.

use crate::core::task::Category;
use serde::{Deserialize, Serialize};

/// Sub-scores assigned by a judge to one worker output.
///
/// All scores are on a 0-100 scale. Code-oriented fields (edge cases,
/// security, code quality, performance) and prose-oriented fields
/// (clarity, structure, accuracy, relevance) coexist; the weight profile
/// decides which ones matter for a given category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct JudgeCriteria {
    pub correctness: f64,
    pub completeness: f64,
    pub edge_cases: f64,
    pub security: f64,
    pub code_quality: f64,
    pub performance: f64,
    pub clarity: f64,
    pub structure: f64,
    pub accuracy: f64,
    pub relevance: f64,
}

/// One weight profile: weights over the ten sub-scores, summing to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct WeightProfile {
    pub correctness: f64,
    pub completeness: f64,
    pub edge_cases: f64,
    pub security: f64,
    pub code_quality: f64,
    pub performance: f64,
    pub clarity: f64,
    pub structure: f64,
    pub accuracy: f64,
    pub relevance: f64,
}

impl WeightProfile {
    /// Sum of all weights; must be 1.0 within floating-point tolerance.
    pub fn sum(&self) -> f64 {
        self.correctness
            + self.completeness
            + self.edge_cases
            + self.security
            + self.code_quality
            + self.performance
            + self.clarity
            + self.structure
            + self.accuracy
            + self.relevance
    }
}

/// Weights for code and review outputs: correctness and adversarial
/// qualities dominate.
pub const WEIGHTS_CODE: WeightProfile = WeightProfile {
    correctness: 0.30,
    completeness: 0.05,
    edge_cases: 0.20,
    security: 0.20,
    code_quality: 0.15,
    performance: 0.10,
    clarity: 0.0,
    structure: 0.0,
    accuracy: 0.0,
    relevance: 0.0,
};

/// Weights for writing, creative, and translation outputs.
pub const WEIGHTS_WRITING: WeightProfile = WeightProfile {
    correctness: 0.10,
    completeness: 0.15,
    edge_cases: 0.0,
    security: 0.0,
    code_quality: 0.0,
    performance: 0.0,
    clarity: 0.25,
    structure: 0.20,
    accuracy: 0.15,
    relevance: 0.15,
};

/// Weights for analysis, qa, and planning outputs.
pub const WEIGHTS_ANALYSIS: WeightProfile = WeightProfile {
    correctness: 0.25,
    completeness: 0.20,
    edge_cases: 0.15,
    security: 0.0,
    code_quality: 0.0,
    performance: 0.0,
    clarity: 0.0,
    structure: 0.10,
    accuracy: 0.20,
    relevance: 0.10,
};

/// Weights for everything else.
pub const WEIGHTS_GENERAL: WeightProfile = WeightProfile {
    correctness: 0.30,
    completeness: 0.25,
    edge_cases: 0.0,
    security: 0.0,
    code_quality: 0.0,
    performance: 0.0,
    clarity: 0.20,
    structure: 0.0,
    accuracy: 0.15,
    relevance: 0.10,
};

/// Select the weight profile for a task category.
pub fn weights_for(category: Category) -> WeightProfile {
    match category {
        Category::Code | Category::Review => WEIGHTS_CODE,
        Category::Writing | Category::Creative | Category::Translation => WEIGHTS_WRITING,
        Category::Analysis | Category::Qa | Category::Planning => WEIGHTS_ANALYSIS,
        Category::General => WEIGHTS_GENERAL,
    }
}

impl JudgeCriteria {
    /// Criteria with every sub-score set to the same value.
    ///
    /// Used for conservative defaults when a judge response cannot be
    /// parsed.
    pub fn uniform(score: f64) -> Self {
        Self {
            correctness: score,
            completeness: score,
            edge_cases: score,
            security: score,
            code_quality: score,
            performance: score,
            clarity: score,
            structure: score,
            accuracy: score,
            relevance: score,
        }
    }

    /// Weighted total on the 0-100 scale for the given category.
    pub fn total(&self, category: Category) -> f64 {
        let w = weights_for(category);
        self.correctness * w.correctness
            + self.completeness * w.completeness
            + self.edge_cases * w.edge_cases
            + self.security * w.security
            + self.code_quality * w.code_quality
            + self.performance * w.performance
            + self.clarity * w.clarity
            + self.structure * w.structure
            + self.accuracy * w.accuracy
            + self.relevance * w.relevance
    }
}
