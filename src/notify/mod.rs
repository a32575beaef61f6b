pub mod antiflutter;
pub mod webhook;

/// Payload pushed to the guardian/HR webhook when an alert is raised.
/// Carries the bounded summary only, never raw message content.
#[derive(Debug, Clone)]
pub struct AlertNotice {
    pub severity: String,
    pub subject_ref: String,
    pub summary: String,
    pub timestamp_iso: String,
}
