use super::AlertNotice;
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Generic webhook notifier for guardian/HR channels. Failures here never
/// fail the calling operation; the durable alert row is the primary record.
#[derive(Clone)]
pub struct WebhookNotifier {
    url: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    pub async fn send(&self, notice: &AlertNotice) -> Result<()> {
        let payload = WebhookPayload {
            severity: &notice.severity,
            subject: &notice.subject_ref,
            summary: &notice.summary,
            at: &notice.timestamp_iso,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("alert webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("alert webhook request failed: {e}"));
                }
            }
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    severity: &'a str,
    subject: &'a str,
    summary: &'a str,
    at: &'a str,
}
