//! LLM completion service: abstract `complete(prompt) → text` contract with
//! OpenAI-compatible and Ollama HTTP providers.

use async_trait::async_trait;
use repograph_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Opaque completion service consumed by feature extraction and routing.
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String>;

    /// Complete and parse the response as JSON. Code fences around the
    /// payload are tolerated.
    async fn complete_json(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<serde_json::Value> {
        let text = self.complete(prompt, system).await?;
        parse_json_response(&text)
    }
}

/// Strip optional markdown fences and parse the remainder as JSON.
pub fn parse_json_response(text: &str) -> Result<serde_json::Value> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map_or(trimmed, |rest| rest.trim_start_matches('\n'));
    let body = body.strip_suffix("```").unwrap_or(body).trim();
    serde_json::from_str(body)
        .map_err(|e| Error::External(format!("LLM returned invalid JSON: {e}")))
}

#[derive(Debug, Clone)]
enum LlmProvider {
    OpenAi { api_key: String, model: String },
    Ollama { base_url: String, model: String },
}

/// HTTP-backed completion provider.
pub struct HttpLlm {
    provider: LlmProvider,
    http: reqwest::Client,
    timeout: std::time::Duration,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl HttpLlm {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAi {
                api_key: api_key.into(),
                model: model.into(),
            },
            http: reqwest::Client::new(),
            timeout: std::time::Duration::from_secs(120),
        }
    }

    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Ollama {
                base_url: base_url.into(),
                model: model.into(),
            },
            http: reqwest::Client::new(),
            timeout: std::time::Duration::from_secs(120),
        }
    }

    async fn request(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        match &self.provider {
            LlmProvider::OpenAi { api_key, model } => {
                let mut messages = Vec::new();
                if let Some(system) = system {
                    messages.push(ChatMessage {
                        role: "system",
                        content: system.to_string(),
                    });
                }
                messages.push(ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                });
                let req = ChatRequest {
                    model: model.clone(),
                    messages,
                };
                let resp = self
                    .http
                    .post("https://api.openai.com/v1/chat/completions")
                    .header("Authorization", format!("Bearer {api_key}"))
                    .json(&req)
                    .send()
                    .await
                    .map_err(|e| Error::External(format!("openai completion: {e}")))?;
                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(Error::External(format!(
                        "openai completion returned {status}: {body}"
                    )));
                }
                let body: ChatResponse = resp
                    .json()
                    .await
                    .map_err(|e| Error::External(format!("openai completion body: {e}")))?;
                body.choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| Error::External("empty completion response".to_string()))
            }
            LlmProvider::Ollama { base_url, model } => {
                let req = OllamaGenerateRequest {
                    model: model.clone(),
                    prompt: prompt.to_string(),
                    system: system.map(String::from),
                    stream: false,
                };
                let url = format!("{base_url}/api/generate");
                let resp = self
                    .http
                    .post(&url)
                    .json(&req)
                    .send()
                    .await
                    .map_err(|e| {
                        Error::External(format!("ollama generate at {url}: {e}"))
                    })?;
                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(Error::External(format!(
                        "ollama generate returned {status}: {body}"
                    )));
                }
                let body: OllamaGenerateResponse = resp
                    .json()
                    .await
                    .map_err(|e| Error::External(format!("ollama generate body: {e}")))?;
                Ok(body.response)
            }
        }
    }
}

#[async_trait]
impl LlmService for HttpLlm {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        tokio::time::timeout(self.timeout, self.request(prompt, system))
            .await
            .map_err(|_| Error::Timeout("LLM completion".to_string()))?
    }
}
