// src/notify/antiflutter.rs
use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Per-subject cooldown gate to prevent duplicate alerts.
/// - First alert for a subject always allowed.
/// - Inside cooldown, further alerts for the same subject are suppressed.
/// - Different subjects never interfere.
/// - State is updated explicitly via `record_alert` after a successful insert.
#[derive(Debug, Clone, Default)]
pub struct AlertCooldown {
    cooldown: ChronoDuration,
    last_alert_ts: HashMap<String, DateTime<Utc>>,
}

impl AlertCooldown {
    /// `cooldown_secs` < 0 is treated as 0 (no cooldown).
    pub fn new(cooldown_secs: i64) -> Self {
        let secs = cooldown_secs.max(0);
        Self {
            cooldown: ChronoDuration::seconds(secs),
            last_alert_ts: HashMap::new(),
        }
    }

    /// Length of the suppression window.
    pub fn window(&self) -> ChronoDuration {
        self.cooldown
    }

    /// Check if we may alert at `now` for `subject`. Does NOT mutate state.
    pub fn should_alert(&self, subject: &str, now: DateTime<Utc>) -> bool {
        match self.last_alert_ts.get(subject) {
            None => true,
            Some(ts) => now.signed_duration_since(*ts) >= self.cooldown,
        }
    }

    /// Record that an alert was inserted at `now` for `subject`.
    pub fn record_alert(&mut self, subject: &str, now: DateTime<Utc>) {
        self.last_alert_ts.insert(subject.to_string(), now);
    }
}
