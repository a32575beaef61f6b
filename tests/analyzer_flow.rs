// tests/analyzer_flow.rs
//
// Situational analyzer orchestration with a mock completion client:
// authorization order, alert thresholding, failure atomicity, and the
// explicit heuristic fallback path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use veilleur::alerts::AlertDispatcher;
use veilleur::analyzer::{Analyzer, CheckinInput};
use veilleur::assessment::{EscalationLevel, Severity};
use veilleur::completion::MockCompletion;
use veilleur::config::EngineConfig;
use veilleur::error::EngineError;
use veilleur::store::{
    AlertRecord, CheckinRecord, FlagRecord, MemoryStore, MessageRecord, NewAlert, NewCheckin,
    NewFlag, NewMessage, RiskStore, SessionRecord, StoreError,
};

fn setup(mock: MockCompletion) -> (Arc<MemoryStore>, AlertDispatcher, EngineConfig, Analyzer, Arc<MockCompletion>) {
    let store = Arc::new(MemoryStore::new());
    store.add_group_member("famille:martin", "lea");
    let config = EngineConfig::default();
    let dispatcher = AlertDispatcher::new(store.clone(), &config);
    let mock = Arc::new(mock);
    let analyzer = Analyzer::new(mock.clone());
    (store, dispatcher, config, analyzer, mock)
}

fn checkin(free_text: Option<&str>) -> CheckinInput {
    CheckinInput {
        person_id: "lea".to_string(),
        group_id: "famille:martin".to_string(),
        mood_score: 3,
        stress_score: 8,
        free_text: free_text.map(str::to_string),
    }
}

/// Store whose alert inserts fail while check-in rows still land.
struct AlertsDown {
    inner: MemoryStore,
}

#[async_trait]
impl RiskStore for AlertsDown {
    async fn session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        self.inner.session(id).await
    }
    async fn is_group_member(&self, person: &str, group: &str) -> Result<bool, StoreError> {
        self.inner.is_group_member(person, group).await
    }
    async fn insert_message(&self, msg: NewMessage) -> Result<MessageRecord, StoreError> {
        self.inner.insert_message(msg).await
    }
    async fn insert_checkin(&self, checkin: NewCheckin) -> Result<CheckinRecord, StoreError> {
        self.inner.insert_checkin(checkin).await
    }
    async fn insert_alert(&self, _alert: NewAlert) -> Result<AlertRecord, StoreError> {
        Err(StoreError::Write("alerts table unavailable".to_string()))
    }
    async fn insert_flag(&self, flag: NewFlag) -> Result<FlagRecord, StoreError> {
        self.inner.insert_flag(flag).await
    }
    async fn open_alerts(&self) -> Result<Vec<AlertRecord>, StoreError> {
        self.inner.open_alerts().await
    }
    async fn open_flags(&self) -> Result<Vec<FlagRecord>, StoreError> {
        self.inner.open_flags().await
    }
    async fn resolve_alert(&self, id: Uuid) -> Result<AlertRecord, StoreError> {
        self.inner.resolve_alert(id).await
    }
    async fn resolve_flag(&self, id: Uuid) -> Result<FlagRecord, StoreError> {
        self.inner.resolve_flag(id).await
    }
    async fn last_alert_at(&self, subject_ref: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.inner.last_alert_at(subject_ref).await
    }
}

#[tokio::test]
async fn urgent_analysis_persists_checkin_and_raises_one_alert() {
    let payload = r#"{"emotion_labels":["detresse","epuisement"],"risk_score":85,
        "escalation_level":3,"recommended_actions":["contacter un professionnel"],
        "summary":"Signes de detresse aigue.","keywords":["detresse"]}"#;
    let (store, dispatcher, config, analyzer, _) = setup(MockCompletion::ok(payload));

    let out = analyzer
        .run(store.as_ref(), &dispatcher, &config, "lea", &checkin(Some("semaine tres dure")))
        .await
        .unwrap();

    assert_eq!(out.analysis.score, 0.85);
    assert_eq!(out.analysis.escalation, EscalationLevel::Urgent);
    assert_eq!(out.analysis.source, "classifier");
    assert!(out.alert_id.is_some());
    assert!(out.partial.is_empty());

    assert_eq!(store.checkins().len(), 1);
    let alerts = store.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Urgent);
    assert_eq!(alerts[0].subject_ref, "person:lea");
    assert_eq!(alerts[0].summary, "Signes de detresse aigue.");
}

#[tokio::test]
async fn low_escalation_produces_zero_alerts() {
    let payload = r#"{"risk_score":20,"escalation_level":1,"summary":"Fatigue passagere."}"#;
    let (store, dispatcher, config, analyzer, _) = setup(MockCompletion::ok(payload));

    let out = analyzer
        .run(store.as_ref(), &dispatcher, &config, "lea", &checkin(None))
        .await
        .unwrap();

    assert!(out.alert_id.is_none());
    assert_eq!(store.checkins().len(), 1);
    assert!(store.alerts().is_empty());
}

#[tokio::test]
async fn provider_failure_leaves_no_rows_behind() {
    let (store, dispatcher, config, analyzer, _) = setup(MockCompletion::failing());

    let err = analyzer
        .run(store.as_ref(), &dispatcher, &config, "lea", &checkin(Some("ca va pas")))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ClassificationUnavailable(_)));
    assert!(store.checkins().is_empty());
    assert!(store.alerts().is_empty());
}

#[tokio::test]
async fn malformed_provider_output_is_classification_unavailable() {
    let (store, dispatcher, config, analyzer, _) =
        setup(MockCompletion::ok("desole, je ne peux pas repondre en JSON"));

    let err = analyzer
        .run(store.as_ref(), &dispatcher, &config, "lea", &checkin(None))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ClassificationUnavailable(_)));
    assert!(store.checkins().is_empty());
}

#[tokio::test]
async fn identity_mismatch_fails_before_any_classification() {
    let (store, dispatcher, config, analyzer, mock) = setup(MockCompletion::ok("{}"));

    let err = analyzer
        .run(store.as_ref(), &dispatcher, &config, "autre", &checkin(None))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Unauthorized));
    assert_eq!(mock.calls(), 0);
    assert!(store.checkins().is_empty());
}

#[tokio::test]
async fn non_member_fails_before_any_classification() {
    let (store, dispatcher, config, analyzer, mock) = setup(MockCompletion::ok("{}"));
    let mut input = checkin(None);
    input.group_id = "famille:durand".to_string();

    let err = analyzer
        .run(store.as_ref(), &dispatcher, &config, "lea", &input)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Forbidden));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn out_of_range_ratings_are_rejected() {
    let (store, dispatcher, config, analyzer, mock) = setup(MockCompletion::ok("{}"));
    let mut input = checkin(None);
    input.mood_score = 11;

    let err = analyzer
        .run(store.as_ref(), &dispatcher, &config, "lea", &input)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::BadInput(_)));
    assert_eq!(mock.calls(), 0);
    assert!(store.checkins().is_empty());
}

#[tokio::test]
async fn heuristic_fallback_uses_the_lexicon_policy() {
    let (store, dispatcher, config, analyzer, _) = setup(MockCompletion::failing());

    let out = analyzer
        .run_heuristic(
            store.as_ref(),
            &dispatcher,
            &config,
            "lea",
            &checkin(Some("je me sens triste et seul")),
        )
        .await
        .unwrap();

    assert_eq!(out.analysis.source, "heuristic");
    assert_eq!(out.analysis.score, 0.4);
    assert_eq!(out.analysis.escalation, EscalationLevel::Vigilance);
    assert!(out.alert_id.is_none());
    assert_eq!(store.checkins().len(), 1);
}

#[tokio::test]
async fn alert_write_failure_after_checkin_is_partial_success() {
    let payload = r#"{"risk_score":90,"escalation_level":3,"summary":"Detresse."}"#;
    let inner = MemoryStore::new();
    inner.add_group_member("famille:martin", "lea");
    let store = Arc::new(AlertsDown { inner });
    let config = EngineConfig::default();
    let dispatcher = AlertDispatcher::new(store.clone(), &config);
    let analyzer = Analyzer::new(Arc::new(MockCompletion::ok(payload)));

    let out = analyzer
        .run(
            store.as_ref(),
            &dispatcher,
            &config,
            "lea",
            &checkin(Some("semaine tres dure")),
        )
        .await
        .unwrap();

    // The check-in row landed; the failed alert is a warning, not an error.
    assert!(out.alert_id.is_none());
    assert_eq!(out.partial, vec!["alert_not_recorded"]);
    assert_eq!(store.inner.checkins().len(), 1);
    assert!(store.inner.alerts().is_empty());
}

#[tokio::test]
async fn duplicate_urgent_checkins_do_not_duplicate_alerts() {
    let payload = r#"{"risk_score":90,"escalation_level":3,"summary":"Detresse."}"#;
    let (store, dispatcher, config, analyzer, _) = setup(MockCompletion::ok(payload));

    let first = analyzer
        .run(store.as_ref(), &dispatcher, &config, "lea", &checkin(None))
        .await
        .unwrap();
    let second = analyzer
        .run(store.as_ref(), &dispatcher, &config, "lea", &checkin(None))
        .await
        .unwrap();

    assert!(first.alert_id.is_some());
    // Same subject inside the cooldown window: suppressed, not duplicated.
    assert!(second.alert_id.is_none());
    assert_eq!(store.checkins().len(), 2);
    assert_eq!(store.alerts().len(), 1);
}
