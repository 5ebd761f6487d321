//! Chat-completions backend.
//!
//! [`ChatExtractionService`] implements [`ExtractionService`] over any
//! OpenAI-compatible `POST {base_url}/chat/completions` endpoint with bearer
//! authentication (Moonshot by default).
//!
//! # Retry Strategy
//!
//! Retries are off unless `llm.max_retries` is set. When enabled:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! # Response handling
//!
//! Models wrap JSON in code fences or put prose in front of it, so
//! [`json_payload`] locates the payload before decoding. A reply carrying
//! [`SENTINEL`](crate::gate::SENTINEL) becomes
//! [`ExtractionResult::InsufficientInformation`] here and never travels
//! further as text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, LlmConfig};
use crate::gate::SENTINEL;
use crate::layout::KnowledgeBaseLayout;
use crate::models::{
    ClientProfile, ClientTopic, DocumentAnalysis, ExtractionResult, GuideRequest, ParsedDocument,
    CLIENT_TOPICS,
};
use crate::prompts::PromptBuilder;
use crate::traits::ExtractionService;

/// Operational failures of the extraction backend.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("API key not set: export {0} or add it to .env")]
    MissingApiKey(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("could not decode response: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Thin client for one chat-completions endpoint.
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    temperature: f32,
    max_retries: u32,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ServiceError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ServiceError::MissingApiKey(config.api_key_env.clone()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    /// Send one user message and return the assistant's text.
    pub async fn complete(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<String, ServiceError> {
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens,
            stream: false,
        };

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying chat completion");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: ChatResponse = response
                            .json()
                            .await
                            .map_err(|e| ServiceError::Decode(e.to_string()))?;
                        return parsed
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.message.content)
                            .ok_or_else(|| {
                                ServiceError::Decode("response has no message content".into())
                            });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = ServiceError::Api {
                        status: status.as_u16(),
                        body: body_text,
                    };
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(status = status.as_u16(), model, "chat completion failed");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    warn!(error = %e, model, "chat completion request failed");
                    last_err = Some(ServiceError::Transport(e));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ServiceError::Decode("no attempt was made".into())))
    }
}

/// [`ExtractionService`] backed by a [`ChatClient`].
///
/// Discovery and client extraction use the fast model; product articles and
/// document guides use the smart one. `model_override` replaces both.
pub struct ChatExtractionService {
    client: ChatClient,
    prompts: PromptBuilder,
    model_fast: String,
    model_smart: String,
}

impl ChatExtractionService {
    pub fn new(config: &Config, model_override: Option<&str>) -> Result<Self, ServiceError> {
        let client = ChatClient::new(&config.llm)?;
        let (model_fast, model_smart) = match model_override {
            Some(m) => (m.to_string(), m.to_string()),
            None => (config.llm.model_fast.clone(), config.llm.model_smart.clone()),
        };
        Ok(Self {
            client,
            prompts: PromptBuilder::new(config.company.clone(), config.limits.clone()),
            model_fast,
            model_smart,
        })
    }

    /// One tiny completion to check the endpoint, key and model.
    pub async fn ping(&self) -> Result<String, ServiceError> {
        self.client
            .complete(&self.model_fast, "Say 'OK' if you can read this.", Some(10))
            .await
    }

    pub fn models(&self) -> (&str, &str) {
        (&self.model_fast, &self.model_smart)
    }
}

#[async_trait]
impl ExtractionService for ChatExtractionService {
    fn name(&self) -> &str {
        &self.model_smart
    }

    async fn analyze_document(
        &self,
        doc: &ParsedDocument,
        layout: &KnowledgeBaseLayout,
    ) -> Result<DocumentAnalysis, ServiceError> {
        let prompt = self.prompts.discovery(doc, &layout.describe());
        let reply = self.client.complete(&self.model_fast, &prompt, None).await?;
        parse_analysis(&reply)
    }

    async fn extract_product_knowledge(
        &self,
        doc: &ParsedDocument,
        product: &str,
        layout: &KnowledgeBaseLayout,
    ) -> Result<ExtractionResult, ServiceError> {
        let prompt = self.prompts.product(doc, product, &layout.describe());
        let reply = self.client.complete(&self.model_smart, &prompt, None).await?;
        Ok(text_result(reply))
    }

    async fn extract_client_profile(
        &self,
        doc: &ParsedDocument,
        client: &str,
        layout: &KnowledgeBaseLayout,
    ) -> Result<ExtractionResult<ClientProfile>, ServiceError> {
        let prompt = self.prompts.client(doc, client, &layout.describe());
        let reply = self.client.complete(&self.model_fast, &prompt, None).await?;
        if reply.contains(SENTINEL) {
            return Ok(ExtractionResult::InsufficientInformation);
        }
        let value = decode_json(&reply)?;
        Ok(ExtractionResult::Content(parse_client_profile(&value)?))
    }

    async fn extract_document_guide(
        &self,
        doc: &ParsedDocument,
        request: &GuideRequest,
        analysis: &DocumentAnalysis,
    ) -> Result<ExtractionResult, ServiceError> {
        let prompt = self.prompts.guide(doc, request, analysis);
        let reply = self.client.complete(&self.model_smart, &prompt, None).await?;
        Ok(text_result(reply))
    }
}

/// Map a free-text reply onto the tagged result.
pub fn text_result(reply: String) -> ExtractionResult {
    if reply.contains(SENTINEL) {
        ExtractionResult::InsufficientInformation
    } else {
        ExtractionResult::Content(reply.trim().to_string())
    }
}

/// Locate the JSON payload in a model reply.
///
/// Handles ```` ```json ```` fences, bare ```` ``` ```` fences and prose
/// before the first `{` or `[`.
pub fn json_payload(reply: &str) -> Option<&str> {
    let mut cleaned = reply.trim();
    if let Some(start) = cleaned.find("```json") {
        let rest = &cleaned[start + "```json".len()..];
        cleaned = match rest.find("```") {
            Some(end) => &rest[..end],
            None => rest,
        }
        .trim();
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        let rest = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest,
        };
        cleaned = rest.trim_end().trim_end_matches("```").trim();
    }
    if cleaned.starts_with('{') || cleaned.starts_with('[') {
        return Some(cleaned);
    }
    let start = cleaned.find(['{', '['])?;
    Some(&cleaned[start..])
}

fn decode_json(reply: &str) -> Result<Value, ServiceError> {
    let payload = json_payload(reply).ok_or_else(|| {
        let head: String = reply.chars().take(100).collect();
        ServiceError::Decode(format!("no JSON found in response: {}", head))
    })?;
    serde_json::from_str(payload).map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Decode a discovery reply.
pub fn parse_analysis(reply: &str) -> Result<DocumentAnalysis, ServiceError> {
    let mut value = decode_json(reply)?;
    if let Some(obj) = value.as_object_mut() {
        if obj.get("products").is_some_and(Value::is_null) {
            obj.insert("products".into(), Value::Array(Vec::new()));
        }
        for key in ["document_type", "document_category"] {
            if obj.get(key).is_some_and(Value::is_null) {
                obj.remove(key);
            }
        }
    }
    serde_json::from_value(value).map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Decode a client reply: an object of topic → text or list.
///
/// Well-known topics come first in their fixed order; other topics follow.
/// Null and empty values are dropped.
pub fn parse_client_profile(value: &Value) -> Result<ClientProfile, ServiceError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ServiceError::Decode("client information is not a JSON object".into()))?;

    let mut keys: Vec<&String> = CLIENT_TOPICS
        .iter()
        .filter_map(|t| obj.get_key_value(*t).map(|(k, _)| k))
        .collect();
    keys.extend(obj.keys().filter(|k| !CLIENT_TOPICS.contains(&k.as_str())));

    let mut profile = ClientProfile::default();
    for key in keys {
        if let Some(topic) = obj.get(key).and_then(topic_from_value) {
            profile.topics.push((key.clone(), topic));
        }
    }
    Ok(profile)
}

fn topic_from_value(value: &Value) -> Option<ClientTopic> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(ClientTopic::Text(s.clone())),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().filter_map(item_text).collect();
            (!items.is_empty()).then_some(ClientTopic::Items(items))
        }
        Value::Object(map) => {
            let items: Vec<String> = map
                .iter()
                .filter_map(|(k, v)| item_text(v).map(|t| format!("{}: {}", k, t)))
                .collect();
            (!items.is_empty()).then_some(ClientTopic::Items(items))
        }
        other => Some(ClientTopic::Text(other.to_string())),
    }
}

fn item_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
