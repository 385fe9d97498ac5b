//! Reasoning services
//!
//! A reasoning service turns a `(system, user)` message pair into free
//! text. Any failure is an `Err`; the advisor decides what to do with it.
//!
//! | Provider     | Endpoint                                   |
//! |--------------|--------------------------------------------|
//! | `ollama`     | `POST {base}/api/chat` (local, default)     |
//! | `openrouter` | `POST {base}/chat/completions` (bearer key) |
//! | `offline`    | none, always fails                          |

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::HintSettings;
use crate::util::{CONNECT_TIMEOUT, INFER_TIMEOUT};

pub const OLLAMA_DEFAULT_URL: &str = "http://127.0.0.1:11434";
pub const OPENROUTER_DEFAULT_URL: &str = "https://openrouter.ai/api/v1";

/// External natural-language advice endpoint
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Send one system + user exchange and return the reply text
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Provider name (for logging)
    fn name(&self) -> &str;
}

fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(INFER_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("sensei/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

fn messages(system: &str, user: &str) -> Value {
    json!([
        { "role": "system", "content": system },
        { "role": "user", "content": user }
    ])
}

fn non_empty(text: Option<&str>, provider: &str) -> Result<String> {
    let text = text
        .map(str::trim)
        .with_context(|| format!("Invalid response format from {provider}"))?;
    if text.is_empty() {
        anyhow::bail!("{provider} returned an empty reply");
    }
    Ok(text.to_string())
}

/// Local Ollama server
pub struct OllamaService {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaService {
    pub fn new(base_url: Option<&str>, model: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url
                .unwrap_or(OLLAMA_DEFAULT_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ReasoningService for OllamaService {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": messages(system, user),
                "stream": false
            }))
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama error {}: {}", status, body);
        }

        let json: Value = response.json().await.context("Ollama reply is not JSON")?;
        // /api/chat answers in message.content, /api/generate in response
        let text = json["message"]["content"]
            .as_str()
            .or_else(|| json["response"].as_str());
        non_empty(text, "Ollama")
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// OpenRouter chat completions (OpenAI-compatible)
pub struct OpenRouterService {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenRouterService {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>, model: &str) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .context("SENSEI_API_KEY not set")?;
        Ok(Self {
            client: http_client()?,
            base_url: base_url
                .unwrap_or(OPENROUTER_DEFAULT_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ReasoningService for OpenRouterService {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": messages(system, user)
            }))
            .send()
            .await
            .context("Failed to send request to OpenRouter")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenRouter error {}: {}", status, body);
        }

        let json: Value = response.json().await.context("OpenRouter reply is not JSON")?;
        non_empty(json["choices"][0]["message"]["content"].as_str(), "OpenRouter")
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

/// No service; every hint comes from the fallback list
#[derive(Default)]
pub struct OfflineService;

#[async_trait]
impl ReasoningService for OfflineService {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        anyhow::bail!("offline mode")
    }

    fn name(&self) -> &str {
        "offline"
    }
}

/// Create a service from the `[hints]` settings
pub fn create_service(settings: &HintSettings) -> Result<Arc<dyn ReasoningService>> {
    let base_url = settings.base_url.as_deref();
    let provider = settings.provider.as_str();

    if provider.eq_ignore_ascii_case("ollama") {
        Ok(Arc::new(OllamaService::new(base_url, &settings.model)?))
    } else if provider.eq_ignore_ascii_case("openrouter") {
        Ok(Arc::new(OpenRouterService::new(
            base_url,
            settings.api_key.as_deref(),
            &settings.model,
        )?))
    } else if provider.eq_ignore_ascii_case("offline") {
        Ok(Arc::new(OfflineService))
    } else {
        anyhow::bail!(
            "Unknown provider: '{}'. Available: ollama, openrouter, offline",
            provider
        )
    }
}
