//! Structured situational analyzer: build prompt -> call the completion
//! collaborator -> validate/clamp -> persist -> conditionally alert.
//!
//! Authorization is checked before any classification work so unauthorized
//! callers neither trigger side effects nor learn how the classifier
//! behaves. A provider failure is surfaced as `ClassificationUnavailable`
//! with zero rows written; the heuristic fallback is a separate, explicit
//! path the caller opts into.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::alerts::{truncate_chars, AlertDispatcher};
use crate::assessment::{clamp01, round2, EscalationLevel, Severity};
use crate::completion::DynCompletionClient;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::scorer;
use crate::store::{CheckinRecord, NewAlert, NewCheckin, RiskStore};

/// One check-in to analyze: numeric self-ratings plus optional free text.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckinInput {
    pub person_id: String,
    pub group_id: String,
    pub mood_score: u8,
    pub stress_score: u8,
    #[serde(default)]
    pub free_text: Option<String>,
}

/// Structured analysis of one check-in. Scores are normalized to [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinAnalysis {
    pub emotion_labels: Vec<String>,
    pub score: f32,
    pub escalation: EscalationLevel,
    pub recommended_actions: Vec<String>,
    pub summary: String,
    pub keywords: Vec<String>,
    /// "classifier" for the completion path, "heuristic" for the fallback.
    pub source: String,
}

/// Result of a fully-run check-in analysis, including side effects.
#[derive(Debug, Clone, Serialize)]
pub struct CheckinOutcome {
    pub checkin: CheckinRecord,
    pub analysis: CheckinAnalysis,
    pub alert_id: Option<Uuid>,
    /// Warnings for secondary side effects that failed after the primary
    /// write succeeded (partial success, not an error).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partial: Vec<String>,
}

/// Untrusted shape expected back from the completion provider.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    emotion_labels: Vec<String>,
    risk_score: f64,
    escalation_level: i64,
    #[serde(default)]
    recommended_actions: Vec<String>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    keywords: Vec<String>,
}

const SYSTEM_PROMPT: &str = "You are a wellbeing risk assessor for a family/HR support application. \
Given self-reported mood and stress ratings (0-10) and optional free text, \
return ONE JSON object, nothing else, with exactly these fields: \
emotion_labels (array of strings), risk_score (number 0-100), \
escalation_level (integer 0-3: 0=ok, 1=vigilance, 2=important, 3=urgent), \
recommended_actions (array of strings), summary (one short paragraph), \
keywords (array of strings). Be conservative: prefer a higher escalation \
level when self-harm or danger signals are present.";

pub struct Analyzer {
    completion: DynCompletionClient,
}

impl Analyzer {
    pub fn new(completion: DynCompletionClient) -> Self {
        Self { completion }
    }

    /// Full entry point: authorize, classify, persist, alert.
    pub async fn run(
        &self,
        store: &dyn RiskStore,
        dispatcher: &AlertDispatcher,
        config: &EngineConfig,
        principal: &str,
        input: &CheckinInput,
    ) -> Result<CheckinOutcome> {
        validate_input(input, config)?;
        authorize(store, principal, input).await?;

        let analysis = self.classify(input).await?;
        record_outcome(store, dispatcher, config, input, analysis).await
    }

    /// Degraded entry point used when the classifier is unavailable and the
    /// caller opted into the heuristic fallback. Same authorization and
    /// persistence path, lexicon-only assessment.
    pub async fn run_heuristic(
        &self,
        store: &dyn RiskStore,
        dispatcher: &AlertDispatcher,
        config: &EngineConfig,
        principal: &str,
        input: &CheckinInput,
    ) -> Result<CheckinOutcome> {
        validate_input(input, config)?;
        authorize(store, principal, input).await?;

        let text = input.free_text.as_deref().unwrap_or("");
        let assessment = scorer::score_with_thresholds(text, &config.escalation);
        let analysis = CheckinAnalysis {
            emotion_labels: assessment.labels.iter().map(|c| c.label().to_string()).collect(),
            score: assessment.score,
            escalation: assessment.escalation,
            recommended_actions: Vec::new(),
            summary: "Heuristic assessment (classifier unavailable).".to_string(),
            keywords: Vec::new(),
            source: "heuristic".to_string(),
        };
        record_outcome(store, dispatcher, config, input, analysis).await
    }

    /// Prompt + completion + validation. No side effects.
    async fn classify(&self, input: &CheckinInput) -> Result<CheckinAnalysis> {
        let user_prompt = build_user_prompt(input);
        let raw = self
            .completion
            .complete(SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(|e| {
                counter!("veilleur_classification_failures_total").increment(1);
                EngineError::ClassificationUnavailable(e.to_string())
            })?;
        parse_analysis(&raw)
    }
}

fn validate_input(input: &CheckinInput, config: &EngineConfig) -> Result<()> {
    if input.person_id.trim().is_empty() || input.group_id.trim().is_empty() {
        return Err(EngineError::BadInput(
            "person_id and group_id are required".to_string(),
        ));
    }
    if input.mood_score > 10 || input.stress_score > 10 {
        return Err(EngineError::BadInput(
            "mood_score and stress_score must be within 0..=10".to_string(),
        ));
    }
    if let Some(text) = &input.free_text {
        if text.chars().count() > config.max_text_chars {
            return Err(EngineError::BadInput(format!(
                "free_text exceeds {} characters",
                config.max_text_chars
            )));
        }
    }
    Ok(())
}

async fn authorize(store: &dyn RiskStore, principal: &str, input: &CheckinInput) -> Result<()> {
    if principal != input.person_id {
        return Err(EngineError::Unauthorized);
    }
    if !store.is_group_member(&input.person_id, &input.group_id).await? {
        return Err(EngineError::Forbidden);
    }
    Ok(())
}

fn build_user_prompt(input: &CheckinInput) -> String {
    match input.free_text.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(text) => format!(
            "mood: {}/10\nstress: {}/10\nmessage: {}",
            input.mood_score, input.stress_score, text
        ),
        None => format!(
            "mood: {}/10\nstress: {}/10\nmessage: (none)",
            input.mood_score, input.stress_score
        ),
    }
}

/// Validate and clamp the untrusted provider output. Any shape problem is
/// `ClassificationUnavailable` — no partial recovery.
fn parse_analysis(raw: &str) -> Result<CheckinAnalysis> {
    let trimmed = strip_code_fences(raw);
    let parsed: RawAnalysis = serde_json::from_str(trimmed).map_err(|e| {
        counter!("veilleur_classification_failures_total").increment(1);
        EngineError::ClassificationUnavailable(format!("malformed classifier output: {e}"))
    })?;

    let score = round2(clamp01((parsed.risk_score.clamp(0.0, 100.0) / 100.0) as f32));
    Ok(CheckinAnalysis {
        emotion_labels: parsed.emotion_labels,
        score,
        escalation: EscalationLevel::from_clamped(parsed.escalation_level),
        recommended_actions: parsed.recommended_actions,
        summary: parsed.summary,
        keywords: parsed.keywords,
        source: "classifier".to_string(),
    })
}

/// Providers occasionally wrap JSON in markdown fences despite instructions.
fn strip_code_fences(raw: &str) -> &str {
    let t = raw.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t).trim()
}

/// Persist the checkin (fatal on failure) and raise the alert if the level
/// crossed the line (partial on failure).
async fn record_outcome(
    store: &dyn RiskStore,
    dispatcher: &AlertDispatcher,
    config: &EngineConfig,
    input: &CheckinInput,
    analysis: CheckinAnalysis,
) -> Result<CheckinOutcome> {
    let checkin = store
        .insert_checkin(NewCheckin {
            person_id: input.person_id.clone(),
            group_id: input.group_id.clone(),
            mood_score: input.mood_score,
            stress_score: input.stress_score,
            analysis: analysis.clone(),
        })
        .await?;
    counter!("veilleur_checkins_recorded_total").increment(1);

    let mut alert_id = None;
    let mut partial = Vec::new();
    if analysis.escalation.needs_alert() {
        let alert = NewAlert {
            severity: Severity::for_escalation(analysis.escalation),
            subject_ref: format!("person:{}", input.person_id),
            summary: truncate_chars(&analysis.summary, config.summary_max_chars),
        };
        match dispatcher.raise(alert).await {
            Ok(raised) => alert_id = raised.map(|a| a.id),
            Err(e) => {
                warn!(error = %e, person = %input.person_id, "alert insert failed after checkin write");
                partial.push("alert_not_recorded".to_string());
            }
        }
    }

    Ok(CheckinOutcome {
        checkin,
        analysis,
        alert_id,
        partial,
    })
}
