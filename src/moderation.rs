//! Interpersonal message moderator: the gatekeeper in front of any
//! moderated two-party conversation.
//!
//! Classification is pure pattern matching (`decide`); only the persistence
//! step suspends. One pass per message, terminal: allow-and-store,
//! block-and-flag (PII, nothing stored), or mask-and-flag (high risk,
//! placeholder stored). PII blocks outright because the harm is the leak
//! itself; high-risk content is masked, not dropped, because the fact that
//! it was sent must survive for human review.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::alerts::AlertDispatcher;
use crate::assessment::Severity;
use crate::config::EngineConfig;
use crate::detectors::{first_trigger, TriggerCategory};
use crate::error::{EngineError, Result};
use crate::store::{ModerationMarker, NewAlert, NewFlag, NewMessage, RiskStore};

/// Terminal outcome of screening one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationOutcome {
    Allow,
    BlockPii,
    MaskHighRisk,
}

/// `outcome == Allow` iff no detector fired; `category` is present exactly
/// when the outcome is not Allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationDecision {
    pub outcome: ModerationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TriggerCategory>,
}

/// What the caller is told. Block/mask are policy behavior, not errors, so
/// they ride a 2xx response with these markers set.
#[derive(Debug, Clone, Serialize)]
pub struct ModerationReceipt {
    pub blocked: bool,
    pub masked: bool,
    pub message_id: Option<Uuid>,
    pub flag_id: Option<Uuid>,
    pub alert_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partial: Vec<String>,
}

/// Inbound request shape for the moderation entry point.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerateRequest {
    pub session_id: Uuid,
    pub sender_id: String,
    pub content: String,
}

/// Pure classification: ordered gate walk, first match wins.
pub fn decide(text: &str, pii_enabled: bool) -> ModerationDecision {
    match first_trigger(text, pii_enabled) {
        Some(TriggerCategory::Pii) => ModerationDecision {
            outcome: ModerationOutcome::BlockPii,
            category: Some(TriggerCategory::Pii),
        },
        Some(cat) => ModerationDecision {
            outcome: ModerationOutcome::MaskHighRisk,
            category: Some(cat),
        },
        None => ModerationDecision {
            outcome: ModerationOutcome::Allow,
            category: None,
        },
    }
}

pub struct Moderator;

impl Moderator {
    /// Authorize, classify, persist, flag/alert. One pass, no retries.
    pub async fn handle(
        store: &dyn RiskStore,
        dispatcher: &AlertDispatcher,
        config: &EngineConfig,
        principal: &str,
        req: &ModerateRequest,
    ) -> Result<ModerationReceipt> {
        if req.content.trim().is_empty() {
            return Err(EngineError::BadInput("content is required".to_string()));
        }
        if req.content.chars().count() > config.max_text_chars {
            return Err(EngineError::BadInput(format!(
                "content exceeds {} characters",
                config.max_text_chars
            )));
        }
        if principal != req.sender_id {
            return Err(EngineError::Unauthorized);
        }
        let session = store
            .session(req.session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("session {}", req.session_id)))?;
        if !session.has_participant(&req.sender_id) {
            return Err(EngineError::Forbidden);
        }

        let decision = decide(&req.content, config.pii_detection_enabled);
        match decision.outcome {
            ModerationOutcome::Allow => {
                let msg = store
                    .insert_message(NewMessage {
                        session_id: session.id,
                        author: req.sender_id.clone(),
                        content: req.content.clone(),
                        marker: ModerationMarker::Allowed,
                    })
                    .await?;
                Ok(ModerationReceipt {
                    blocked: false,
                    masked: false,
                    message_id: Some(msg.id),
                    flag_id: None,
                    alert_id: None,
                    partial: Vec::new(),
                })
            }
            ModerationOutcome::BlockPii => {
                // The leaked content is never persisted, not even masked.
                counter!("veilleur_messages_blocked_total").increment(1);
                let mut partial = Vec::new();
                let flag_id = insert_flag_soft(
                    store,
                    NewFlag {
                        category: TriggerCategory::Pii,
                        severity: Severity::Medium,
                        session_id: session.id,
                        message_id: None,
                    },
                    &mut partial,
                )
                .await;
                let alert_id = raise_alert_soft(
                    dispatcher,
                    NewAlert {
                        severity: Severity::Medium,
                        subject_ref: format!("session:{}", session.id),
                        summary: "Contact-info sharing blocked in a moderated session."
                            .to_string(),
                    },
                    &mut partial,
                )
                .await;
                Ok(ModerationReceipt {
                    blocked: true,
                    masked: false,
                    message_id: None,
                    flag_id,
                    alert_id,
                    partial,
                })
            }
            ModerationOutcome::MaskHighRisk => {
                counter!("veilleur_messages_masked_total").increment(1);
                let category = decision
                    .category
                    .expect("non-allow decision carries a category");
                // Primary write: the masked message row. Failure here fails the call.
                let msg = store
                    .insert_message(NewMessage {
                        session_id: session.id,
                        author: req.sender_id.clone(),
                        content: config.mask_placeholder.clone(),
                        marker: ModerationMarker::Masked,
                    })
                    .await?;
                let mut partial = Vec::new();
                let flag_id = insert_flag_soft(
                    store,
                    NewFlag {
                        category,
                        severity: Severity::High,
                        session_id: session.id,
                        message_id: Some(msg.id),
                    },
                    &mut partial,
                )
                .await;
                let alert_id = raise_alert_soft(
                    dispatcher,
                    NewAlert {
                        severity: Severity::Critical,
                        subject_ref: format!("session:{}", session.id),
                        summary: format!(
                            "High-risk content ({}) masked in a moderated session.",
                            category.label()
                        ),
                    },
                    &mut partial,
                )
                .await;
                Ok(ModerationReceipt {
                    blocked: false,
                    masked: true,
                    message_id: Some(msg.id),
                    flag_id,
                    alert_id,
                    partial,
                })
            }
        }
    }
}

async fn insert_flag_soft(
    store: &dyn RiskStore,
    flag: NewFlag,
    partial: &mut Vec<String>,
) -> Option<Uuid> {
    match store.insert_flag(flag).await {
        Ok(f) => Some(f.id),
        Err(e) => {
            warn!(error = %e, "flag insert failed after moderation decision");
            partial.push("flag_not_recorded".to_string());
            None
        }
    }
}

async fn raise_alert_soft(
    dispatcher: &AlertDispatcher,
    alert: NewAlert,
    partial: &mut Vec<String>,
) -> Option<Uuid> {
    match dispatcher.raise(alert).await {
        Ok(raised) => raised.map(|a| a.id),
        Err(e) => {
            warn!(error = %e, "alert insert failed after moderation decision");
            partial.push("alert_not_recorded".to_string());
            None
        }
    }
}
