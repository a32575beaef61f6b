// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod alerts;
pub mod analyzer;
pub mod api;
pub mod assessment;
pub mod completion;
pub mod config;
pub mod detectors;
pub mod error;
pub mod lexicon;
pub mod metrics;
pub mod moderation;
pub mod notify;
pub mod scorer;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::assessment::{EscalationLevel, RiskAssessment, RiskCategory, Severity};
pub use crate::config::EngineConfig;
pub use crate::error::EngineError;
pub use crate::moderation::{ModerationDecision, ModerationOutcome};
