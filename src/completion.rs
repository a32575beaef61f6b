//! Text-completion collaborator: provider abstraction for the external LLM.
//!
//! One operation: `complete(system, user) -> JSON string`. Anything other
//! than a successful, non-empty response is an error the caller maps to
//! `ClassificationUnavailable` — there is no partial recovery here.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider returned HTTP {0}")]
    Status(u16),
    #[error("provider returned an empty completion")]
    Empty,
    #[error("no completion provider configured")]
    Disabled,
}

/// Trait object used by the analyzer (and swapped for a mock in tests).
pub trait CompletionClient: Send + Sync {
    /// Ask the provider for a single JSON object answering `user` under the
    /// `system` instruction.
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynCompletionClient = Arc<dyn CompletionClient>;

/// Build a client from the environment:
/// * `VEILLEUR_COMPLETION=mock` returns a deterministic mock;
/// * `OPENAI_API_KEY` set returns the OpenAI provider;
/// * otherwise a disabled client (every call fails, callers may fall back
///   to the heuristic scorer).
pub fn build_client_from_env(timeout: Duration) -> DynCompletionClient {
    if std::env::var("VEILLEUR_COMPLETION")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockCompletion::ok(
            r#"{"emotion_labels":["calme"],"risk_score":5,"escalation_level":0,"recommended_actions":[],"summary":"Situation stable (mock).","keywords":[]}"#,
        ));
    }
    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return Arc::new(OpenAiCompletion::new(None, timeout));
    }
    Arc::new(DisabledCompletion)
}

/// OpenAI Chat Completions provider with JSON response format.
pub struct OpenAiCompletion {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiCompletion {
    /// `model_override`: pass Some("gpt-4o-mini") to override; that is also
    /// the default. `timeout` bounds the whole request (caller-supplied).
    pub fn new(model_override: Option<&str>, timeout: Duration) -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("veilleur/0.1 (+github.com/veilleur/veilleur)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        let model = model_override.unwrap_or("gpt-4o-mini").to_string();
        Self {
            http,
            api_key,
            model,
        }
    }
}

impl CompletionClient for OpenAiCompletion {
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(CompletionError::Disabled);
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Format {
                #[serde(rename = "type")]
                kind: &'static str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
                response_format: Format,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: String,
            }

            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: system,
                    },
                    Msg {
                        role: "user",
                        content: user,
                    },
                ],
                temperature: 0.2,
                max_tokens: 400,
                response_format: Format { kind: "json_object" },
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(|e| CompletionError::Transport(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(CompletionError::Status(resp.status().as_u16()));
            }
            let body: Resp = resp
                .json()
                .await
                .map_err(|e| CompletionError::Transport(e.to_string()))?;
            let content = body
                .choices
                .first()
                .map(|c| c.message.content.trim())
                .unwrap_or("");
            if content.is_empty() {
                return Err(CompletionError::Empty);
            }
            Ok(content.to_string())
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Fails every call; used when no provider is configured.
pub struct DisabledCompletion;

impl CompletionClient for DisabledCompletion {
    fn complete<'a>(
        &'a self,
        _system: &'a str,
        _user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        Box::pin(async { Err(CompletionError::Disabled) })
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic mock for tests. Counts calls so authorization tests can
/// assert the provider was never reached.
pub struct MockCompletion {
    fixed: Result<String, ()>,
    calls: AtomicUsize,
}

impl MockCompletion {
    pub fn ok(payload: &str) -> Self {
        Self {
            fixed: Ok(payload.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fixed: Err(()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CompletionClient for MockCompletion {
    fn complete<'a>(
        &'a self,
        _system: &'a str,
        _user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out = self.fixed.clone();
        Box::pin(async move {
            match out {
                Ok(s) => Ok(s),
                Err(()) => Err(CompletionError::Transport("mock timeout".to_string())),
            }
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
