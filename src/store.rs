//! Persistence collaborator boundary.
//!
//! The engine treats storage as an ordered-insert, point-read store with no
//! cross-table transactions: a missed alert insert after a successful
//! message insert is a loggable inconsistency, not a fatal error. All
//! history is append-only; the only mutation is the open -> resolved status
//! transition driven by a human operator.
//!
//! `MemoryStore` backs tests and local runs; production deployments plug a
//! relational store behind the same trait.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::analyzer::CheckinAnalysis;
use crate::assessment::Severity;
use crate::detectors::TriggerCategory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("write failed: {0}")]
    Write(String),
    #[error("read failed: {0}")]
    Read(String),
    #[error("{kind} {id} already resolved")]
    AlreadyResolved { kind: &'static str, id: Uuid },
    #[error("{kind} {id} not found")]
    MissingRecord { kind: &'static str, id: Uuid },
}

/// open -> resolved, exactly once, by a human operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Open,
    Resolved,
}

/// How a stored message left moderation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationMarker {
    Allowed,
    Masked,
}

/// A moderated two-party session (e.g. mentor/mentee support chat).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub participant_a: String,
    pub participant_b: String,
}

impl SessionRecord {
    pub fn has_participant(&self, person: &str) -> bool {
        self.participant_a == person || self.participant_b == person
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: Uuid,
    pub author: String,
    pub content: String,
    pub marker: ModerationMarker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub author: String,
    pub content: String,
    pub marker: ModerationMarker,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCheckin {
    pub person_id: String,
    pub group_id: String,
    pub mood_score: u8,
    pub stress_score: u8,
    pub analysis: CheckinAnalysis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub id: Uuid,
    pub person_id: String,
    pub group_id: String,
    pub mood_score: u8,
    pub stress_score: u8,
    pub analysis: CheckinAnalysis,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub severity: Severity,
    /// Person or session the alert concerns; never raw message content.
    pub subject_ref: String,
    /// Bounded, truncated summary.
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub severity: Severity,
    pub subject_ref: String,
    pub summary: String,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFlag {
    pub category: TriggerCategory,
    pub severity: Severity,
    pub session_id: Uuid,
    /// Absent when the message was blocked and never stored.
    pub message_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRecord {
    pub id: Uuid,
    pub category: TriggerCategory,
    pub severity: Severity,
    pub session_id: Uuid,
    pub message_id: Option<Uuid>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait RiskStore: Send + Sync {
    async fn session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError>;
    async fn is_group_member(&self, person: &str, group: &str) -> Result<bool, StoreError>;

    async fn insert_message(&self, msg: NewMessage) -> Result<MessageRecord, StoreError>;
    async fn insert_checkin(&self, checkin: NewCheckin) -> Result<CheckinRecord, StoreError>;
    async fn insert_alert(&self, alert: NewAlert) -> Result<AlertRecord, StoreError>;
    async fn insert_flag(&self, flag: NewFlag) -> Result<FlagRecord, StoreError>;

    async fn open_alerts(&self) -> Result<Vec<AlertRecord>, StoreError>;
    async fn open_flags(&self) -> Result<Vec<FlagRecord>, StoreError>;
    async fn resolve_alert(&self, id: Uuid) -> Result<AlertRecord, StoreError>;
    async fn resolve_flag(&self, id: Uuid) -> Result<FlagRecord, StoreError>;

    /// Most recent alert timestamp for a subject (cooldown support).
    async fn last_alert_at(&self, subject_ref: &str) -> Result<Option<DateTime<Utc>>, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    sessions: HashMap<Uuid, SessionRecord>,
    groups: HashMap<String, Vec<String>>,
    messages: Vec<MessageRecord>,
    checkins: Vec<CheckinRecord>,
    alerts: Vec<AlertRecord>,
    flags: Vec<FlagRecord>,
}

/// In-memory store for tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a two-party session, returning its id.
    pub fn add_session(&self, participant_a: &str, participant_b: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut g = self.inner.lock().expect("poisoned store");
        g.sessions.insert(
            id,
            SessionRecord {
                id,
                participant_a: participant_a.to_string(),
                participant_b: participant_b.to_string(),
            },
        );
        id
    }

    /// Seed group/family membership.
    pub fn add_group_member(&self, group: &str, person: &str) {
        let mut g = self.inner.lock().expect("poisoned store");
        g.groups
            .entry(group.to_string())
            .or_default()
            .push(person.to_string());
    }

    pub fn messages(&self) -> Vec<MessageRecord> {
        self.inner.lock().expect("poisoned store").messages.clone()
    }

    pub fn checkins(&self) -> Vec<CheckinRecord> {
        self.inner.lock().expect("poisoned store").checkins.clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.inner.lock().expect("poisoned store").alerts.clone()
    }

    pub fn flags(&self) -> Vec<FlagRecord> {
        self.inner.lock().expect("poisoned store").flags.clone()
    }
}

#[async_trait]
impl RiskStore for MemoryStore {
    async fn session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("poisoned store")
            .sessions
            .get(&id)
            .cloned())
    }

    async fn is_group_member(&self, person: &str, group: &str) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("poisoned store")
            .groups
            .get(group)
            .is_some_and(|members| members.iter().any(|m| m == person)))
    }

    async fn insert_message(&self, msg: NewMessage) -> Result<MessageRecord, StoreError> {
        let rec = MessageRecord {
            id: Uuid::new_v4(),
            session_id: msg.session_id,
            author: msg.author,
            content: msg.content,
            marker: msg.marker,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .expect("poisoned store")
            .messages
            .push(rec.clone());
        Ok(rec)
    }

    async fn insert_checkin(&self, checkin: NewCheckin) -> Result<CheckinRecord, StoreError> {
        let rec = CheckinRecord {
            id: Uuid::new_v4(),
            person_id: checkin.person_id,
            group_id: checkin.group_id,
            mood_score: checkin.mood_score,
            stress_score: checkin.stress_score,
            analysis: checkin.analysis,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .expect("poisoned store")
            .checkins
            .push(rec.clone());
        Ok(rec)
    }

    async fn insert_alert(&self, alert: NewAlert) -> Result<AlertRecord, StoreError> {
        let rec = AlertRecord {
            id: Uuid::new_v4(),
            severity: alert.severity,
            subject_ref: alert.subject_ref,
            summary: alert.summary,
            status: RecordStatus::Open,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .expect("poisoned store")
            .alerts
            .push(rec.clone());
        Ok(rec)
    }

    async fn insert_flag(&self, flag: NewFlag) -> Result<FlagRecord, StoreError> {
        let rec = FlagRecord {
            id: Uuid::new_v4(),
            category: flag.category,
            severity: flag.severity,
            session_id: flag.session_id,
            message_id: flag.message_id,
            status: RecordStatus::Open,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .expect("poisoned store")
            .flags
            .push(rec.clone());
        Ok(rec)
    }

    async fn open_alerts(&self) -> Result<Vec<AlertRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("poisoned store")
            .alerts
            .iter()
            .filter(|a| a.status == RecordStatus::Open)
            .cloned()
            .collect())
    }

    async fn open_flags(&self) -> Result<Vec<FlagRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("poisoned store")
            .flags
            .iter()
            .filter(|f| f.status == RecordStatus::Open)
            .cloned()
            .collect())
    }

    async fn resolve_alert(&self, id: Uuid) -> Result<AlertRecord, StoreError> {
        let mut g = self.inner.lock().expect("poisoned store");
        let alert = g
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::MissingRecord { kind: "alert", id })?;
        if alert.status == RecordStatus::Resolved {
            return Err(StoreError::AlreadyResolved { kind: "alert", id });
        }
        alert.status = RecordStatus::Resolved;
        Ok(alert.clone())
    }

    async fn resolve_flag(&self, id: Uuid) -> Result<FlagRecord, StoreError> {
        let mut g = self.inner.lock().expect("poisoned store");
        let flag = g
            .flags
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(StoreError::MissingRecord { kind: "flag", id })?;
        if flag.status == RecordStatus::Resolved {
            return Err(StoreError::AlreadyResolved { kind: "flag", id });
        }
        flag.status = RecordStatus::Resolved;
        Ok(flag.clone())
    }

    async fn last_alert_at(&self, subject_ref: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .inner
            .lock()
            .expect("poisoned store")
            .alerts
            .iter()
            .filter(|a| a.subject_ref == subject_ref)
            .map(|a| a.created_at)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_alert_is_exactly_once() {
        let store = MemoryStore::new();
        let alert = store
            .insert_alert(NewAlert {
                severity: Severity::Medium,
                subject_ref: "person:lea".into(),
                summary: "test".into(),
            })
            .await
            .unwrap();

        let resolved = store.resolve_alert(alert.id).await.unwrap();
        assert_eq!(resolved.status, RecordStatus::Resolved);
        assert!(matches!(
            store.resolve_alert(alert.id).await,
            Err(StoreError::AlreadyResolved { .. })
        ));
    }

    #[tokio::test]
    async fn open_alerts_excludes_resolved() {
        let store = MemoryStore::new();
        let a = store
            .insert_alert(NewAlert {
                severity: Severity::Critical,
                subject_ref: "session:x".into(),
                summary: "one".into(),
            })
            .await
            .unwrap();
        store
            .insert_alert(NewAlert {
                severity: Severity::Medium,
                subject_ref: "person:y".into(),
                summary: "two".into(),
            })
            .await
            .unwrap();
        store.resolve_alert(a.id).await.unwrap();

        let open = store.open_alerts().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].summary, "two");
    }

    #[tokio::test]
    async fn membership_lookup() {
        let store = MemoryStore::new();
        store.add_group_member("famille:martin", "lea");
        assert!(store.is_group_member("lea", "famille:martin").await.unwrap());
        assert!(!store.is_group_member("max", "famille:martin").await.unwrap());
        assert!(!store.is_group_member("lea", "famille:durand").await.unwrap());
    }
}
