//! Chat-model backed Cognition.
//!
//! `ChatCognition` drives any `ChatClient` with three prompts and parses the
//! structured replies. Response schemas are written out by hand in
//! [`schemas`] so the wire contract is visible in one place.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::cognition::Cognition;
use super::types::{CandidateMemory, MemoryRecord};
use crate::config::{CognitionConfig, ConfigValidationError};
use crate::{MemoryError, MemoryResult};

/// JSON schema a reply must follow
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: serde_json::Value,
}

/// One system + user exchange
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub schema: Option<ResponseSchema>,
}

/// Chat-completion collaborator
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send the request and return the raw assistant message
    async fn complete(&self, request: ChatRequest) -> MemoryResult<String>;
}

/// Hand-written response schemas
pub mod schemas {
    use super::*;

    /// `{"result": [{category, content, importance}]}`
    pub fn candidates() -> ResponseSchema {
        ResponseSchema {
            name: "candidate_memories",
            schema: json!({
                "type": "object",
                "properties": {
                    "result": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "category": { "type": "string" },
                                "content": { "type": "string" },
                                "importance": { "type": "integer" }
                            },
                            "required": ["category", "content", "importance"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["result"],
                "additionalProperties": false
            }),
        }
    }

    /// `{"context": string}`
    pub fn hot_context() -> ResponseSchema {
        ResponseSchema {
            name: "hot_context",
            schema: json!({
                "type": "object",
                "properties": {
                    "context": { "type": "string" }
                },
                "required": ["context"],
                "additionalProperties": false
            }),
        }
    }

    /// `{"stale_ids": [string]}`
    pub fn stale_ids() -> ResponseSchema {
        ResponseSchema {
            name: "stale_memories",
            schema: json!({
                "type": "object",
                "properties": {
                    "stale_ids": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "required": ["stale_ids"],
                "additionalProperties": false
            }),
        }
    }
}

const SUMMARIZE_PROMPT: &str = "You maintain the long-term memory of a software agent. \
Extract the durable facts from the observation: decisions, conventions, architecture, \
people, open problems. Skip chatter and anything trivially re-derivable. Give each fact a \
short category and an importance from 1 (minor) to 10 (critical). Return an empty list when \
nothing is worth keeping.";

const CONSOLIDATE_PROMPT: &str = "You maintain the working context of a software agent. \
Rewrite the current context so it reflects the new memories. Keep what is still true, \
replace what the new memories contradict, and fold in related memories only where they add \
something. Answer with the complete new context as concise prose or bullet points.";

const SELECT_STALE_PROMPT: &str = "You prune the long-term memory of a software agent. \
Given existing memories and newly learned ones, list the ids of existing memories that are \
now wrong, duplicated, or fully superseded. Only use ids from the existing list. Return an \
empty list when nothing should be removed.";

#[derive(Deserialize)]
struct CandidateEnvelope {
    result: Vec<CandidateMemory>,
}

#[derive(Deserialize)]
struct ContextEnvelope {
    context: String,
}

#[derive(Deserialize)]
struct StaleEnvelope {
    stale_ids: Vec<String>,
}

#[derive(Serialize)]
struct ExistingMemory<'a> {
    id: &'a str,
    category: &'a str,
    content: &'a str,
    importance: i32,
    created_at: String,
}

impl<'a> From<&'a MemoryRecord> for ExistingMemory<'a> {
    fn from(record: &'a MemoryRecord) -> Self {
        Self {
            id: &record.id,
            category: &record.category,
            content: &record.content,
            importance: record.importance,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Cognition implemented with prompts against a chat model
pub struct ChatCognition<C: ChatClient> {
    client: C,
}

impl<C: ChatClient> ChatCognition<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    async fn ask<T: DeserializeOwned>(
        &self,
        system: &str,
        user: String,
        schema: ResponseSchema,
    ) -> MemoryResult<T> {
        let what = schema.name;
        let raw = self
            .client
            .complete(ChatRequest {
                system: system.to_string(),
                user,
                schema: Some(schema),
            })
            .await?;
        parse_reply(&raw, what)
    }
}

fn parse_reply<T: DeserializeOwned>(raw: &str, what: &str) -> MemoryResult<T> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim())
        .map_err(|e| MemoryError::cognition(format!("invalid {} reply: {}", what, e)))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> MemoryResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[async_trait]
impl<C: ChatClient> Cognition for ChatCognition<C> {
    async fn summarize(&self, observation: &str) -> MemoryResult<Vec<CandidateMemory>> {
        let envelope: CandidateEnvelope = self
            .ask(SUMMARIZE_PROMPT, observation.to_string(), schemas::candidates())
            .await?;

        Ok(envelope
            .result
            .into_iter()
            .filter(|c| !c.content.trim().is_empty())
            .collect())
    }

    async fn consolidate(
        &self,
        prior_context: &str,
        candidates: &[CandidateMemory],
        related: &[MemoryRecord],
    ) -> MemoryResult<String> {
        let prior = if prior_context.trim().is_empty() {
            "(empty)"
        } else {
            prior_context
        };
        let related: Vec<ExistingMemory<'_>> = related.iter().map(ExistingMemory::from).collect();

        let user = format!(
            "Current context:\n{}\n\nNew memories:\n{}\n\nRelated memories:\n{}",
            prior,
            to_json(candidates)?,
            to_json(&related)?
        );

        let envelope: ContextEnvelope = self
            .ask(CONSOLIDATE_PROMPT, user, schemas::hot_context())
            .await?;
        Ok(envelope.context)
    }

    async fn select_stale(
        &self,
        old: &[MemoryRecord],
        new: &[CandidateMemory],
    ) -> MemoryResult<Vec<String>> {
        if old.is_empty() {
            return Ok(Vec::new());
        }

        let existing: Vec<ExistingMemory<'_>> = old.iter().map(ExistingMemory::from).collect();
        let user = format!(
            "Existing memories:\n{}\n\nNew memories:\n{}",
            to_json(&existing)?,
            to_json(new)?
        );

        let envelope: StaleEnvelope = self
            .ask(SELECT_STALE_PROMPT, user, schemas::stale_ids())
            .await?;

        let known: HashSet<&str> = old.iter().map(|r| r.id.as_str()).collect();
        let mut seen = HashSet::new();
        Ok(envelope
            .stale_ids
            .into_iter()
            .filter(|id| {
                let keep = known.contains(id.as_str());
                if !keep {
                    tracing::debug!("Ignoring unknown stale id {}", id);
                }
                keep
            })
            .filter(|id| seen.insert(id.clone()))
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI chat completions
// ─────────────────────────────────────────────────────────────────────────────

/// `ChatClient` for OpenAI-compatible `/chat/completions`
pub struct OpenAiChatClient {
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiChatClient {
    pub fn new(api_key: String, model: String, temperature: f32, base_url: String) -> Self {
        Self {
            api_key,
            model,
            temperature,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Build from configuration, resolving the API key
    pub fn from_config(config: &CognitionConfig) -> MemoryResult<Self> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| ConfigValidationError::MissingApiKey {
                backend: "cognition".into(),
            })?;

        Ok(Self::new(
            api_key,
            config.model.clone(),
            config.temperature,
            config.base_url.clone(),
        ))
    }

    fn body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user }
            ]
        });

        if let Some(schema) = &request.schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema.name,
                    "strict": true,
                    "schema": schema.schema
                }
            });
        }

        body
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, request: ChatRequest) -> MemoryResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| MemoryError::cognition(format!("HTTP error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::cognition(format!(
                "chat API error {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::cognition(format!("JSON parse error: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| MemoryError::cognition("chat API returned no content"))
    }
}
