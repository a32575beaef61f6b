//! HTTP surface: one route per engine entry point plus the supervision
//! endpoints. Authentication itself is delegated to the upstream identity
//! layer, which injects the verified principal as the `x-user-id` header;
//! this module only checks that the principal is present and entitled.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::warn;
use uuid::Uuid;

use crate::alerts::{truncate_chars, AlertDispatcher};
use crate::analyzer::{Analyzer, CheckinInput, CheckinOutcome};
use crate::assessment::RiskAssessment;
use crate::completion::DynCompletionClient;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::moderation::{ModerateRequest, ModerationReceipt, Moderator};
use crate::scorer;
use crate::store::{AlertRecord, FlagRecord, NewAlert, RiskStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    config: Arc<EngineConfig>,
    store: Arc<dyn RiskStore>,
    analyzer: Arc<Analyzer>,
    dispatcher: Arc<AlertDispatcher>,
}

impl AppState {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn RiskStore>,
        completion: DynCompletionClient,
    ) -> Self {
        let dispatcher = Arc::new(AlertDispatcher::new(store.clone(), &config));
        Self {
            config: Arc::new(config),
            store,
            analyzer: Arc::new(Analyzer::new(completion)),
            dispatcher,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/score", post(score))
        .route("/checkins", post(analyze_checkin))
        .route("/messages", post(moderate_message))
        .route("/alerts", get(list_alerts))
        .route("/alerts/{id}/resolve", post(resolve_alert))
        .route("/flags", get(list_flags))
        .route("/flags/{id}/resolve", post(resolve_flag))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Verified identity injected by the upstream identity layer.
fn principal(headers: &HeaderMap) -> Result<String> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or(EngineError::Unauthorized)
}

fn require_admin(config: &EngineConfig, who: &str) -> Result<()> {
    if config.is_admin(who) {
        Ok(())
    } else {
        Err(EngineError::Forbidden)
    }
}

// ---- Heuristic scorer entry point ----

#[derive(Deserialize)]
struct ScoreReq {
    author_id: String,
    text: String,
}

#[derive(Serialize)]
struct ScoreResp {
    assessment: RiskAssessment,
    alert_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    partial: Vec<String>,
}

/// Score one message with the lexicon scorer. Deterministic and local; the
/// only side effect is an alert when the score crosses the threshold.
async fn score(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ScoreReq>,
) -> Result<Json<ScoreResp>> {
    let who = principal(&headers)?;
    if who != body.author_id {
        return Err(EngineError::Unauthorized);
    }
    if body.text.chars().count() > state.config.max_text_chars {
        return Err(EngineError::BadInput(format!(
            "text exceeds {} characters",
            state.config.max_text_chars
        )));
    }

    let assessment = scorer::score_with_thresholds(&body.text, &state.config.escalation);
    metrics::counter!("veilleur_messages_scored_total").increment(1);

    let mut alert_id = None;
    let mut partial = Vec::new();
    if assessment.escalation.needs_alert() {
        let labels = assessment
            .labels
            .iter()
            .map(|c| c.label())
            .collect::<Vec<_>>()
            .join(", ");
        let alert = NewAlert {
            severity: scorer::alert_severity(&assessment, &state.config.escalation),
            subject_ref: format!("person:{}", body.author_id),
            summary: truncate_chars(
                &format!("Heuristic risk signals: {labels}."),
                state.config.summary_max_chars,
            ),
        };
        match state.dispatcher.raise(alert).await {
            Ok(raised) => alert_id = raised.map(|a| a.id),
            Err(e) => {
                warn!(error = %e, "alert insert failed after heuristic score");
                partial.push("alert_not_recorded".to_string());
            }
        }
    }

    Ok(Json(ScoreResp {
        assessment,
        alert_id,
        partial,
    }))
}

// ---- Situational analyzer entry point ----

#[derive(Deserialize)]
struct CheckinReq {
    #[serde(flatten)]
    input: CheckinInput,
    /// Opt-in degradation to the heuristic scorer when the external
    /// classifier is unavailable.
    #[serde(default)]
    allow_fallback: bool,
}

async fn analyze_checkin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CheckinReq>,
) -> Result<Json<CheckinOutcome>> {
    let who = principal(&headers)?;
    let run = state
        .analyzer
        .run(
            state.store.as_ref(),
            &state.dispatcher,
            &state.config,
            &who,
            &body.input,
        )
        .await;

    let outcome = match run {
        Err(EngineError::ClassificationUnavailable(reason)) if body.allow_fallback => {
            warn!(%reason, "classifier unavailable, degrading to heuristic scorer");
            state
                .analyzer
                .run_heuristic(
                    state.store.as_ref(),
                    &state.dispatcher,
                    &state.config,
                    &who,
                    &body.input,
                )
                .await?
        }
        other => other?,
    };
    Ok(Json(outcome))
}

// ---- Message moderator entry point ----

async fn moderate_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ModerateRequest>,
) -> Result<Json<ModerationReceipt>> {
    let who = principal(&headers)?;
    let receipt = Moderator::handle(
        state.store.as_ref(),
        &state.dispatcher,
        &state.config,
        &who,
        &body,
    )
    .await?;
    Ok(Json(receipt))
}

// ---- Supervision surface ----

async fn list_alerts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AlertRecord>>> {
    let who = principal(&headers)?;
    require_admin(&state.config, &who)?;
    Ok(Json(state.store.open_alerts().await.map_err(EngineError::Persistence)?))
}

async fn list_flags(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<FlagRecord>>> {
    let who = principal(&headers)?;
    require_admin(&state.config, &who)?;
    Ok(Json(state.store.open_flags().await.map_err(EngineError::Persistence)?))
}

async fn resolve_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AlertRecord>> {
    let who = principal(&headers)?;
    require_admin(&state.config, &who)?;
    state
        .store
        .resolve_alert(id)
        .await
        .map(Json)
        .map_err(map_resolve_err)
}

async fn resolve_flag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<FlagRecord>> {
    let who = principal(&headers)?;
    require_admin(&state.config, &who)?;
    state
        .store
        .resolve_flag(id)
        .await
        .map(Json)
        .map_err(map_resolve_err)
}

/// Status transitions are exactly-once; a second resolve is a caller error,
/// not a server fault.
fn map_resolve_err(e: StoreError) -> EngineError {
    match e {
        StoreError::MissingRecord { kind, id } => EngineError::NotFound(format!("{kind} {id}")),
        StoreError::AlreadyResolved { kind, id } => {
            EngineError::BadInput(format!("{kind} {id} already resolved"))
        }
        other => EngineError::Persistence(other),
    }
}
