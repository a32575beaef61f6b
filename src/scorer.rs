//! Heuristic text scorer: deterministic, lexicon-based, no I/O.
//!
//! Weights are additive across matched categories, clamped to 1.0 and
//! rounded to 2 decimals. Same input always yields the same output; this is
//! both the fast pre-filter and the fallback when the external classifier
//! is unavailable.

use crate::assessment::{clamp01, round2, EscalationLevel, RiskAssessment, Severity};
use crate::config::EscalationThresholds;
use crate::lexicon::{matched_categories, normalize};

/// Score one message with explicit thresholds.
pub fn score_with_thresholds(text: &str, thresholds: &EscalationThresholds) -> RiskAssessment {
    let normalized = normalize(text);
    let labels = matched_categories(&normalized);
    let sum: f32 = labels.iter().map(|c| c.weight()).sum();
    let score = round2(clamp01(sum));
    RiskAssessment {
        score,
        labels,
        escalation: EscalationLevel::for_score(score, thresholds.important, thresholds.urgent),
    }
}

/// Score with the default thresholds (important 0.6, urgent 0.8).
pub fn score(text: &str) -> RiskAssessment {
    score_with_thresholds(text, &EscalationThresholds::default())
}

/// Alert severity for a heuristic assessment that crossed the alert line.
/// Below the urgent threshold a heuristic match is medium-severity only;
/// the lexicon is a pre-filter, not a confirmed classification.
pub fn alert_severity(assessment: &RiskAssessment, thresholds: &EscalationThresholds) -> Severity {
    if assessment.score >= thresholds.urgent {
        Severity::Urgent
    } else {
        Severity::Medium
    }
}
