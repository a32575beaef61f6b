//! assessment.rs — Shared result types for the risk policy.
//!
//! Every entry point (heuristic scorer, situational analyzer, message
//! moderator) speaks these types so that thresholds and severities stay
//! consistent across the engine instead of being re-derived per call site.

use serde::{Deserialize, Serialize};

/// Risk category detected by the lexicon matchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Deprime,
    Harcelement,
    Isolement,
    Danger,
    Addiction,
}

impl RiskCategory {
    /// All categories, in matcher evaluation order.
    pub fn all() -> &'static [RiskCategory] {
        &[
            RiskCategory::Deprime,
            RiskCategory::Harcelement,
            RiskCategory::Isolement,
            RiskCategory::Danger,
            RiskCategory::Addiction,
        ]
    }

    /// Additive severity weight of this category.
    pub fn weight(self) -> f32 {
        match self {
            RiskCategory::Deprime => 0.2,
            RiskCategory::Harcelement => 0.3,
            RiskCategory::Isolement => 0.2,
            RiskCategory::Danger => 0.6,
            RiskCategory::Addiction => 0.3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::Deprime => "deprime",
            RiskCategory::Harcelement => "harcelement",
            RiskCategory::Isolement => "isolement",
            RiskCategory::Danger => "danger",
            RiskCategory::Addiction => "addiction",
        }
    }
}

/// Ordinal escalation level of an assessment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    #[default]
    Ok,
    Vigilance,
    Important,
    Urgent,
}

impl EscalationLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            EscalationLevel::Ok => 0,
            EscalationLevel::Vigilance => 1,
            EscalationLevel::Important => 2,
            EscalationLevel::Urgent => 3,
        }
    }

    /// Clamp an untrusted integer (e.g. classifier output) into a level.
    pub fn from_clamped(raw: i64) -> Self {
        match raw {
            i64::MIN..=0 => EscalationLevel::Ok,
            1 => EscalationLevel::Vigilance,
            2 => EscalationLevel::Important,
            _ => EscalationLevel::Urgent,
        }
    }

    /// Band a normalized score into a level.
    ///
    /// `important` and `urgent` come from the engine config; the vigilance
    /// floor at 0.2 is fixed.
    pub fn for_score(score: f32, important: f32, urgent: f32) -> Self {
        if score >= urgent {
            EscalationLevel::Urgent
        } else if score >= important {
            EscalationLevel::Important
        } else if score >= 0.2 {
            EscalationLevel::Vigilance
        } else {
            EscalationLevel::Ok
        }
    }

    /// Whether this level requires human attention (an Alert).
    pub fn needs_alert(self) -> bool {
        self >= EscalationLevel::Important
    }
}

/// Severity attached to alerts and flags, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    Important,
    High,
    Urgent,
    Critical,
}

impl Severity {
    /// Alert severity for a situational escalation level (>= Important).
    pub fn for_escalation(level: EscalationLevel) -> Self {
        if level >= EscalationLevel::Urgent {
            Severity::Urgent
        } else {
            Severity::Important
        }
    }
}

/// The result of scoring one unit of text. Created fresh per message or
/// check-in, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Normalized risk score in [0, 1], rounded to 2 decimals.
    pub score: f32,
    /// Matched categories, deduplicated, in category order.
    pub labels: Vec<RiskCategory>,
    /// Level derived from the score and the configured thresholds.
    pub escalation: EscalationLevel,
}

/// Clamp to the unit interval.
pub fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Round to 2 decimals (scores are reported at this precision everywhere).
pub fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}
