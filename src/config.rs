//! Engine configuration, loaded once at startup from `config/engine.toml`.
//!
//! The path can be overridden via `VEILLEUR_CONFIG_PATH`. A missing or
//! unreadable file falls back to defaults with a warning; a present but
//! malformed file is a startup error (silently ignoring a bad policy file
//! would be worse than refusing to boot).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/engine.toml";
pub const ENV_CONFIG_PATH: &str = "VEILLEUR_CONFIG_PATH";

/// Normalized-score thresholds for escalation banding.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EscalationThresholds {
    pub important: f32,
    pub urgent: f32,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            important: 0.6,
            urgent: 0.8,
        }
    }
}

impl EscalationThresholds {
    /// Keep a usable interval even if the file contains nonsense.
    fn sanitize(&mut self) {
        if !(0.0..=1.0).contains(&self.important) {
            self.important = 0.6;
        }
        if !(0.0..=1.0).contains(&self.urgent) {
            self.urgent = 0.8;
        }
        if self.important > self.urgent {
            std::mem::swap(&mut self.important, &mut self.urgent);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Per-subject cooldown for duplicate alert suppression (seconds).
    pub cooldown_secs: i64,
    /// Optional guardian/HR webhook notified on every raised alert.
    pub webhook_url: Option<String>,
    pub webhook_timeout_secs: u64,
    /// Delivery attempts before giving up on the webhook.
    pub webhook_retries: u8,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 900,
            webhook_url: None,
            webhook_timeout_secs: 5,
            webhook_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identities allowed on the supervision surface (list/resolve).
    pub admin_allowlist: HashSet<String>,
    /// Deployments without the contact-info policy can turn the gate off.
    pub pii_detection_enabled: bool,
    pub escalation: EscalationThresholds,
    /// Replacement content stored for masked messages.
    pub mask_placeholder: String,
    /// Upper bound on the summary carried by an alert.
    pub summary_max_chars: usize,
    /// Reject free text / messages longer than this.
    pub max_text_chars: usize,
    pub alerts: AlertsConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin_allowlist: HashSet::new(),
            pii_detection_enabled: true,
            escalation: EscalationThresholds::default(),
            mask_placeholder: "[message masked for safety]".to_string(),
            summary_max_chars: 500,
            max_text_chars: 4000,
            alerts: AlertsConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let mut cfg: EngineConfig = toml::from_str(raw)?;
        cfg.escalation.sanitize();
        if cfg.summary_max_chars == 0 {
            cfg.summary_max_chars = 500;
        }
        Ok(cfg)
    }

    /// Load from `VEILLEUR_CONFIG_PATH` or the default path.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "engine config missing, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn is_admin(&self, identity: &str) -> bool {
        self.admin_allowlist.contains(identity)
    }
}
