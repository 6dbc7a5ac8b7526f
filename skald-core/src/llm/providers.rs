// LLM provider implementations: Anthropic, OpenAI (and compatible endpoints), Ollama.
#![allow(clippy::cast_precision_loss)]

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlmError, SkaldError};

use super::{LlmProvider, TokenUsage};

fn http_client() -> crate::error::Result<Client> {
    crate::http::client(None).map_err(|e| SkaldError::Llm(LlmError::Config(e.to_string())))
}

async fn read_error(resp: reqwest::Response) -> SkaldError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    SkaldError::Llm(LlmError::ApiError { status, body })
}

// ── Anthropic Provider ──────────────────────────────────────────────

#[derive(Debug)]
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String) -> crate::error::Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
            base_url: "https://api.anthropic.com".to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn call(
        &self,
        prompt: &str,
        temperature: f64,
    ) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!("{}/v1/messages", self.base_url);

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: 1024,
            temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model, "Calling Anthropic API");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SkaldError::Llm(LlmError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            return Err(read_error(resp).await);
        }

        let result: AnthropicResponse = resp
            .json()
            .await
            .map_err(|e| SkaldError::Llm(LlmError::Parse(e.to_string())))?;

        let text = result
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        Ok((
            text,
            TokenUsage {
                input_tokens: result.usage.input_tokens,
                output_tokens: result.usage.output_tokens,
            },
        ))
    }

    fn cost_per_1k_input(&self) -> f64 {
        if self.model.contains("opus") {
            0.015
        } else if self.model.contains("haiku") {
            0.00025
        } else {
            0.003
        }
    }

    fn cost_per_1k_output(&self) -> f64 {
        if self.model.contains("opus") {
            0.075
        } else if self.model.contains("haiku") {
            0.00125
        } else {
            0.015
        }
    }
}

// ── OpenAI Provider ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    label: &'static str,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> crate::error::Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
            base_url: "https://api.openai.com".to_string(),
            label: "openai",
        })
    }

    /// An OpenAI-compatible endpoint at `url`, reported as `custom`.
    pub fn custom(api_key: String, model: String, url: String) -> crate::error::Result<Self> {
        let mut provider = Self::new(api_key, model)?.with_base_url(url);
        provider.label = "custom";
        Ok(provider)
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: OpenAiUsage,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.label
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn call(
        &self,
        prompt: &str,
        temperature: f64,
    ) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = OpenAiRequest {
            model: &self.model,
            max_tokens: 1024,
            temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model, provider = self.label, "Calling OpenAI-compatible API");

        let mut req = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body);
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SkaldError::Llm(LlmError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            return Err(read_error(resp).await);
        }

        let result: OpenAiResponse = resp
            .json()
            .await
            .map_err(|e| SkaldError::Llm(LlmError::Parse(e.to_string())))?;

        let text = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok((
            text,
            TokenUsage {
                input_tokens: result.usage.prompt_tokens,
                output_tokens: result.usage.completion_tokens,
            },
        ))
    }

    fn cost_per_1k_input(&self) -> f64 {
        if self.label == "custom" {
            0.0
        } else if self.model.contains("gpt-4o") {
            0.0025
        } else if self.model.contains("gpt-4") {
            0.03
        } else {
            0.0015
        }
    }

    fn cost_per_1k_output(&self) -> f64 {
        if self.label == "custom" {
            0.0
        } else if self.model.contains("gpt-4o") {
            0.01
        } else if self.model.contains("gpt-4") {
            0.06
        } else {
            0.002
        }
    }
}

// ── Ollama Provider ─────────────────────────────────────────────────

/// Local Ollama server, non-streaming `/api/generate`.
#[derive(Debug)]
pub struct OllamaProvider {
    client: Client,
    model: String,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(model: String) -> crate::error::Result<Self> {
        Ok(Self {
            client: http_client()?,
            model,
            base_url: "http://localhost:11434".to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: i32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn call(
        &self,
        prompt: &str,
        temperature: f64,
    ) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!("{}/api/generate", self.base_url);

        let body = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature,
                num_predict: -1,
            },
        };

        debug!(model = %self.model, "Calling Ollama");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SkaldError::Llm(LlmError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            return Err(read_error(resp).await);
        }

        let result: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| SkaldError::Llm(LlmError::Parse(e.to_string())))?;

        Ok((
            result.response,
            TokenUsage {
                input_tokens: result.prompt_eval_count,
                output_tokens: result.eval_count,
            },
        ))
    }

    fn cost_per_1k_input(&self) -> f64 {
        0.0
    }

    fn cost_per_1k_output(&self) -> f64 {
        0.0
    }
}

// ── Provider Factory ────────────────────────────────────────────────

/// Create an LLM provider from configuration.
pub fn create_provider(
    provider: &str,
    model: &str,
    api_key: Option<&str>,
    base_url: Option<&str>,
) -> crate::error::Result<Box<dyn LlmProvider>> {
    let require_key = || {
        api_key.map(str::to_string).ok_or_else(|| {
            SkaldError::Llm(LlmError::Config(format!(
                "provider '{provider}' needs an API key (set llm.api_key_env)"
            )))
        })
    };

    match provider {
        "anthropic" => {
            let mut p = AnthropicProvider::new(require_key()?, model.to_string())?;
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        "openai" => {
            let mut p = OpenAiProvider::new(require_key()?, model.to_string())?;
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        "custom" => {
            let url = base_url.ok_or_else(|| {
                SkaldError::Llm(LlmError::Config(
                    "provider 'custom' needs llm.base_url".to_string(),
                ))
            })?;
            Ok(Box::new(OpenAiProvider::custom(
                api_key.unwrap_or_default().to_string(),
                model.to_string(),
                url.to_string(),
            )?))
        }
        "ollama" => {
            let mut p = OllamaProvider::new(model.to_string())?;
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        other => Err(SkaldError::Llm(LlmError::Config(format!(
            "Unknown provider: {other}. Use: anthropic, openai, custom, ollama"
        )))),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
