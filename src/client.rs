use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CompletionError, EmptyCompletion};
use crate::config::ResolvedConfig;
use crate::session::Turn;

// ── Contract ──────────────────────────────────────────────────────────────────

/// Given the full turn sequence, produce the next assistant turn.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, turns: &[Turn]) -> Result<Turn, CompletionError>;
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

/// The reply's `role` is not read: whatever the server says, the turn is
/// stored as the assistant's so the log keeps alternating.
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatResponse {
    /// Reduce the response to a single turn. The last choice wins.
    pub fn into_turn(self) -> Result<Turn, EmptyCompletion> {
        let choice = match self.choices.and_then(|mut c| c.pop()) {
            Some(choice) => choice,
            None => return Err(EmptyCompletion::NoChoices),
        };
        let message = match choice.message {
            Some(message) => message,
            None => return Err(EmptyCompletion::NoMessage),
        };
        match message.content {
            Some(content) if !content.is_empty() => Ok(Turn::assistant(content)),
            _ => Err(EmptyCompletion::NoContent),
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

/// OpenAI-compatible chat completion client (non-streaming).
pub struct ChatClient {
    http: reqwest::Client,
    pub endpoint: String,
    pub model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
}

impl ChatClient {
    pub fn new(endpoint: String, model: String, timeout: Duration) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            model,
            api_key: None,
            temperature: None,
        })
    }

    /// Client for the resolved profile: endpoint, model, timeout, key and
    /// temperature.
    pub fn from_config(resolved: &ResolvedConfig) -> Result<Self, CompletionError> {
        let mut client = Self::new(
            resolved.endpoint.clone(),
            resolved.model.clone(),
            Duration::from_secs(resolved.timeout_secs),
        )?;
        if let Some(key) = &resolved.api_key {
            client.set_api_key(key.clone());
        }
        if let Some(t) = resolved.temperature {
            client.set_temperature(t);
        }
        Ok(client)
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(key);
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = Some(temperature);
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionClient for ChatClient {
    async fn complete(&self, turns: &[Turn]) -> Result<Turn, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: turns,
            temperature: self.temperature,
        };

        let mut req = self
            .http
            .post(self.url())
            .header("Content-Type", "application/json")
            .json(&body);

        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        tracing::debug!(model = %self.model, turns = turns.len(), "sending completion request");
        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Api { status, body });
        }

        let raw = resp.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&raw)?;
        let turn = parsed.into_turn()?;
        tracing::debug!(chars = turn.content.chars().count(), "completion received");
        Ok(turn)
    }
}

// ── Scripted client for tests ─────────────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    pub enum Reply {
        Content(String),
        Empty(EmptyCompletion),
    }

    /// Replays canned replies in order and records every request it sees.
    #[derive(Default)]
    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Reply>>,
        pub seen: Mutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedClient {
        pub fn replying(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn content(text: &str) -> Self {
            Self::replying([Reply::Content(text.to_string())])
        }

        pub fn last_request(&self) -> Vec<Turn> {
            self.seen.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, turns: &[Turn]) -> Result<Turn, CompletionError> {
            self.seen.lock().unwrap().push(turns.to_vec());
            match self.replies.lock().unwrap().pop_front() {
                Some(Reply::Content(text)) => Ok(Turn::assistant(text)),
                Some(Reply::Empty(kind)) => Err(kind.into()),
                None => Err(EmptyCompletion::NoChoices.into()),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
