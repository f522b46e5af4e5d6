//! Narrative service client: phrases the Core Truth sentence
//!
//! Defines the client trait and request types for the external narrative
//! service. Two implementations:
//! - `HttpNarrativeClient`: OpenAI-compatible chat completions over HTTP
//! - `MockClient`: returns preconfigured responses (testing)
//!
//! Clients return the raw response text. Nothing here trusts it; the
//! synthesizer sanitizes and validates before use.

use crate::config::NarrativeConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Ranked driver as sent to the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverDescriptor {
    #[serde(rename = "type")]
    pub node_type: String,
    pub label: String,
    pub summary: String,
    pub weight: f64,
    pub severity: Option<f64>,
    pub cross_domain_count: usize,
    pub centrality: f64,
}

/// Everything the service sees for one Core Truth.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeRequest {
    pub drivers: Vec<DriverDescriptor>,
    pub quotes: Vec<String>,
}

/// Errors from narrative client operations.
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("narrative service not available: {0}")]
    Unavailable(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("service returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("response parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for NarrativeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NarrativeError::Timeout
        } else {
            NarrativeError::Http(err.to_string())
        }
    }
}

/// Client trait for the narrative service.
///
/// Abstracts over transport so the synthesizer does not depend on how the
/// service is reached.
#[async_trait]
pub trait NarrativeClient: Send + Sync {
    /// Whether a call is worth attempting at all.
    async fn is_available(&self) -> bool;

    /// Ask for one causal sentence. Returns the raw response text.
    async fn compose(&self, request: &NarrativeRequest) -> Result<String, NarrativeError>;
}

const SYSTEM_PROMPT: &str = "You distil organisational discovery interviews into one causal statement. \
Reply with JSON {\"coreTruth\": \"...\"} only. The statement is exactly one sentence of 16 to 28 words, \
uses an explicit causal connective such as 'because', 'leads to' or 'is driving', has no bullet points \
or lists, and never mentions drivers, nodes or graphs.";

/// Chat-completion messages for a request.
pub fn build_messages(request: &NarrativeRequest) -> Vec<Value> {
    let mut user = String::from("Ranked themes (most central first):\n");
    for (i, d) in request.drivers.iter().enumerate() {
        user.push_str(&format!(
            "{}. [{}] {} | {} | weight {:.1}, severity {}, phases {}, centrality {:.2}\n",
            i + 1,
            d.node_type,
            d.label,
            d.summary,
            d.weight,
            d.severity.map_or_else(|| "n/a".to_string(), |s| format!("{:.1}", s)),
            d.cross_domain_count,
            d.centrality,
        ));
    }
    if !request.quotes.is_empty() {
        user.push_str("\nParticipant quotes:\n");
        for quote in &request.quotes {
            user.push_str(&format!("- \"{}\"\n", quote));
        }
    }
    vec![
        json!({"role": "system", "content": SYSTEM_PROMPT}),
        json!({"role": "user", "content": user}),
    ]
}

fn response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "core_truth",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {"coreTruth": {"type": "string"}},
                "required": ["coreTruth"],
                "additionalProperties": false
            }
        }
    })
}

/// OpenAI-compatible chat-completions client.
pub struct HttpNarrativeClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
}

impl HttpNarrativeClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        temperature: f64,
    ) -> Result<Self, NarrativeError> {
        let client = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            temperature,
        })
    }

    /// Build from config; the API key comes from the named environment
    /// variable.
    pub fn from_config(config: &NarrativeConfig) -> Result<Self, NarrativeError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            api_key,
            config.timeout(),
            config.temperature,
        )
    }
}

#[async_trait]
impl NarrativeClient for HttpNarrativeClient {
    async fn is_available(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    async fn compose(&self, request: &NarrativeRequest) -> Result<String, NarrativeError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": build_messages(request),
            "response_format": response_format(),
        });

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NarrativeError::Status {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| NarrativeError::Parse(e.to_string()))?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| NarrativeError::Parse("missing choices[0].message.content".to_string()))
    }
}

/// What the mock answers with.
#[derive(Debug, Clone)]
enum MockReply {
    Raw(String),
    Fail(String),
}

/// Mock client for testing. Returns a preconfigured reply.
pub struct MockClient {
    available: bool,
    reply: Option<MockReply>,
    delay: Option<Duration>,
}

impl MockClient {
    /// A mock that reports as available.
    pub fn available() -> Self {
        Self {
            available: true,
            reply: None,
            delay: None,
        }
    }

    /// A mock that reports as unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            reply: None,
            delay: None,
        }
    }

    /// Reply with `{"coreTruth": sentence}`.
    pub fn with_sentence(self, sentence: &str) -> Self {
        self.with_raw(json!({ "coreTruth": sentence }).to_string())
    }

    /// Reply with the given text verbatim.
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.reply = Some(MockReply::Raw(raw.into()));
        self
    }

    /// Fail every call with an HTTP error carrying `message`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.reply = Some(MockReply::Fail(message.into()));
        self
    }

    /// Sleep before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl NarrativeClient for MockClient {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn compose(&self, _request: &NarrativeRequest) -> Result<String, NarrativeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.available {
            return Err(NarrativeError::Unavailable(
                "mock client configured as unavailable".to_string(),
            ));
        }
        match &self.reply {
            Some(MockReply::Raw(raw)) => Ok(raw.clone()),
            Some(MockReply::Fail(message)) => Err(NarrativeError::Http(message.clone())),
            None => Err(NarrativeError::Parse("no mock reply configured".to_string())),
        }
    }
}
