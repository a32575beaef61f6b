//! Moderation detectors: contact-information leakage and high-risk content.
//!
//! Gate order is a documented policy, not an accident of layout: PII is
//! checked first and short-circuits everything else, because leaking contact
//! info is the harm to prevent outright. Self-harm is checked before
//! abuse/violence so the more acute signal names the flag category.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::lexicon::{matches_any, normalize};

/// Specific trigger behind a non-allow moderation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCategory {
    Pii,
    SelfHarm,
    AbuseViolence,
}

impl TriggerCategory {
    pub fn label(self) -> &'static str {
        match self {
            TriggerCategory::Pii => "pii",
            TriggerCategory::SelfHarm => "self_harm",
            TriggerCategory::AbuseViolence => "abuse_violence",
        }
    }
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}").expect("valid email regex")
});

// 9+ digits allowing separators, with an optional international prefix.
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+|00)?\d(?:[ .\-]?\d){8,}").expect("valid phone regex"));

/// Keywords inviting the conversation onto an identifiable social account.
const SOCIAL_HANDLE: &[&str] = &[
    "instagram",
    "insta",
    "snapchat",
    "mon snap",
    "whatsapp",
    "tiktok",
    "telegram",
    "mon numero",
    "mon numéro",
];

/// Self-harm phrasing screened in two-party chat.
const SELF_HARM: &[&str] = &[
    "me faire du mal",
    "me tuer",
    "suicide",
    "en finir",
    "disparaitre",
    "disparaître",
    "scarification",
    "plus envie de vivre",
];

/// Abuse and violence phrasing screened in two-party chat.
const ABUSE_VIOLENCE: &[&str] = &[
    "me frappe",
    "me bat",
    "violence",
    "coups",
    "menace de mort",
    "abuse de moi",
    "agression",
];

/// True if the text leaks contact information (email, phone, social handle).
pub fn detect_pii(normalized: &str) -> bool {
    EMAIL_RE.is_match(normalized)
        || PHONE_RE.is_match(normalized)
        || matches_any(normalized, SOCIAL_HANDLE)
}

/// High-risk content category, if any. Self-harm wins over abuse/violence.
pub fn detect_high_risk(normalized: &str) -> Option<TriggerCategory> {
    if matches_any(normalized, SELF_HARM) {
        Some(TriggerCategory::SelfHarm)
    } else if matches_any(normalized, ABUSE_VIOLENCE) {
        Some(TriggerCategory::AbuseViolence)
    } else {
        None
    }
}

/// Ordered gate walk over raw text: first firing detector wins.
/// `pii_enabled` lets deployments without the PII policy skip that gate.
pub fn first_trigger(text: &str, pii_enabled: bool) -> Option<TriggerCategory> {
    let n = normalize(text);
    if pii_enabled && detect_pii(&n) {
        return Some(TriggerCategory::Pii);
    }
    detect_high_risk(&n)
}
