//! Alert dispatch: durable alert rows plus optional webhook fan-out.
//!
//! The dispatcher is the single path through which every entry point raises
//! an alert, so truncation, duplicate suppression and fan-out behave the
//! same for heuristic scores, check-in analyses and moderation events.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use metrics::counter;
use tracing::warn;

use crate::assessment::Severity;
use crate::config::EngineConfig;
use crate::notify::antiflutter::AlertCooldown;
use crate::notify::webhook::WebhookNotifier;
use crate::notify::AlertNotice;
use crate::store::{AlertRecord, NewAlert, RiskStore, StoreError};

pub struct AlertDispatcher {
    store: Arc<dyn RiskStore>,
    cooldown: Mutex<AlertCooldown>,
    webhook: Option<WebhookNotifier>,
    summary_max: usize,
}

impl AlertDispatcher {
    pub fn new(store: Arc<dyn RiskStore>, config: &EngineConfig) -> Self {
        let webhook = config.alerts.webhook_url.as_ref().map(|url| {
            WebhookNotifier::new(url.clone())
                .with_timeout(config.alerts.webhook_timeout_secs)
                .with_retries(config.alerts.webhook_retries)
        });
        Self {
            store,
            cooldown: Mutex::new(AlertCooldown::new(config.alerts.cooldown_secs)),
            webhook,
            summary_max: config.summary_max_chars,
        }
    }

    /// Insert an alert row, suppressing duplicates for the same subject
    /// inside the cooldown window. Critical alerts always pass the gate.
    /// Returns `Ok(None)` when suppressed.
    pub async fn raise(&self, mut alert: NewAlert) -> Result<Option<AlertRecord>, StoreError> {
        let now = Utc::now();

        if alert.severity < Severity::Critical {
            let window = {
                let gate = self.cooldown.lock().expect("poisoned cooldown");
                if !gate.should_alert(&alert.subject_ref, now) {
                    counter!("veilleur_alerts_suppressed_total").increment(1);
                    tracing::debug!(subject = %alert.subject_ref, "alert suppressed by cooldown");
                    return Ok(None);
                }
                gate.window()
            };
            // The in-memory gate starts empty after a restart; the durable
            // alert rows carry the last alert time across processes.
            if let Some(last) = self.store.last_alert_at(&alert.subject_ref).await? {
                if now.signed_duration_since(last) < window {
                    counter!("veilleur_alerts_suppressed_total").increment(1);
                    tracing::debug!(subject = %alert.subject_ref, "alert suppressed by cooldown");
                    return Ok(None);
                }
            }
        }

        alert.summary = truncate_chars(&alert.summary, self.summary_max);
        let record = self.store.insert_alert(alert).await?;

        {
            let mut gate = self.cooldown.lock().expect("poisoned cooldown");
            gate.record_alert(&record.subject_ref, now);
        }
        counter!("veilleur_alerts_raised_total").increment(1);

        if let Some(webhook) = &self.webhook {
            let notice = AlertNotice {
                severity: format!("{:?}", record.severity).to_uppercase(),
                subject_ref: record.subject_ref.clone(),
                summary: record.summary.clone(),
                timestamp_iso: record.created_at.to_rfc3339(),
            };
            if let Err(e) = webhook.send(&notice).await {
                // The row is durable; fan-out is best-effort.
                warn!(error = %e, alert_id = %record.id, "alert webhook delivery failed");
            }
        }

        Ok(Some(record))
    }
}

/// Truncate on a char boundary; summaries are bounded, not split mid-glyph.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}
