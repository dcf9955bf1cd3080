//! HTTP-backed model providers: Anthropic, OpenAI, and Ollama.

use super::{DescribeRequest, Describer, Description, Embedder, RouteCandidate};
use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Which completion API to talk to.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Anthropic { api_key: String, model: String },
    OpenAI { api_key: String, model: String },
    Ollama { base_url: String, model: String },
}

impl LlmProvider {
    /// Resolve a provider from the environment: `ANTHROPIC_API_KEY`, then
    /// `OPENAI_API_KEY`, then local Ollama.
    pub fn from_env() -> Self {
        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            return Self::Anthropic {
                api_key,
                model: std::env::var("REPOGRAPH_LLM_MODEL")
                    .unwrap_or_else(|_| "claude-sonnet-4-5".to_string()),
            };
        }
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            return Self::OpenAI {
                api_key,
                model: std::env::var("REPOGRAPH_LLM_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            };
        }
        Self::Ollama {
            base_url: std::env::var("REPOGRAPH_LOCAL_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: std::env::var("REPOGRAPH_LLM_MODEL").unwrap_or_else(|_| "qwen3".to_string()),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Anthropic { .. } => "Anthropic",
            Self::OpenAI { .. } => "OpenAI",
            Self::Ollama { .. } => "Ollama",
        }
    }
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: String,
}

fn http_error(e: ureq::Error) -> ModelError {
    match e {
        ureq::Error::StatusCode(code) => ModelError::Api {
            status: code,
            body: String::new(),
        },
        other => ModelError::Http(other.to_string()),
    }
}

/// A minimal completion client over `ureq`.
pub struct LlmClient {
    provider: LlmProvider,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(provider: LlmProvider) -> Self {
        Self {
            provider,
            max_tokens: 1024,
        }
    }

    pub fn from_env() -> Self {
        Self::new(LlmProvider::from_env())
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Send a completion request and return the response text.
    pub fn complete(&self, system: &str, user_prompt: &str) -> Result<String, ModelError> {
        match &self.provider {
            LlmProvider::Anthropic { api_key, model } => {
                let request = AnthropicRequest {
                    model: model.clone(),
                    max_tokens: self.max_tokens,
                    system: system.to_string(),
                    messages: vec![Message {
                        role: "user".to_string(),
                        content: user_prompt.to_string(),
                    }],
                };
                let mut response = ureq::post("https://api.anthropic.com/v1/messages")
                    .header("x-api-key", api_key.as_str())
                    .header("anthropic-version", "2023-06-01")
                    .send_json(&request)
                    .map_err(http_error)?;
                let body: AnthropicResponse = response
                    .body_mut()
                    .read_json()
                    .map_err(|e| ModelError::Parse(e.to_string()))?;
                body.content
                    .into_iter()
                    .next()
                    .map(|c| c.text)
                    .ok_or(ModelError::Empty)
            }
            LlmProvider::OpenAI { api_key, model } => {
                let request = chat_request(model, self.max_tokens, system, user_prompt);
                let mut response = ureq::post("https://api.openai.com/v1/chat/completions")
                    .header("authorization", format!("Bearer {api_key}"))
                    .send_json(&request)
                    .map_err(http_error)?;
                read_chat_response(&mut response)
            }
            LlmProvider::Ollama { base_url, model } => {
                let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
                let request = chat_request(model, self.max_tokens, system, user_prompt);
                let mut response = ureq::post(&url).send_json(&request).map_err(http_error)?;
                read_chat_response(&mut response)
            }
        }
    }
}

fn chat_request(model: &str, max_tokens: u32, system: &str, user: &str) -> OpenAIRequest {
    OpenAIRequest {
        model: model.to_string(),
        max_tokens,
        messages: vec![
            Message {
                role: "system".to_string(),
                content: system.to_string(),
            },
            Message {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ],
    }
}

fn read_chat_response(
    response: &mut ureq::http::Response<ureq::Body>,
) -> Result<String, ModelError> {
    let body: OpenAIResponse = response
        .body_mut()
        .read_json()
        .map_err(|e| ModelError::Parse(e.to_string()))?;
    body.choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or(ModelError::Empty)
}

const DESCRIBE_SYSTEM: &str = "You are a code analysis assistant. Given one code entity, \
respond with JSON only: {\"description\": \"one sentence\", \"keywords\": [\"...\"]}.";

const ARBITRATE_SYSTEM: &str = "You are routing a code entity into an architectural \
hierarchy. Pick the best parent from the candidates. Respond with JSON only: \
{\"id\": \"<candidate id>\"}.";

#[derive(Deserialize)]
struct ArbitrateChoice {
    id: String,
}

/// Describer over a completion client.
pub struct HttpDescriber {
    client: LlmClient,
}

impl HttpDescriber {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    pub fn from_env() -> Self {
        Self::new(LlmClient::from_env())
    }
}

impl Describer for HttpDescriber {
    fn describe(&self, request: &DescribeRequest<'_>) -> Result<Description, ModelError> {
        let mut prompt = format!(
            "Entity: {} `{}` in `{}`.",
            request.kind.as_str(),
            request.name,
            request.file_path.display()
        );
        if let Some(parent) = request.parent {
            prompt.push_str(&format!(" Enclosing scope: `{parent}`."));
        }
        if let Some(snippet) = request.source_snippet {
            prompt.push_str("\n\nSource:\n```\n");
            prompt.push_str(snippet);
            prompt.push_str("\n```");
        }
        let response = self.client.complete(DESCRIBE_SYSTEM, &prompt)?;
        super::parse_json_response(&response)
    }

    fn arbitrate(
        &self,
        candidates: &[RouteCandidate],
        description: &str,
    ) -> Result<String, ModelError> {
        let mut prompt = format!("Entity description: {description}\n\nCandidates:\n");
        for candidate in candidates {
            prompt.push_str(&format!("- {}: {}\n", candidate.id, candidate.description));
        }
        let response = self.client.complete(ARBITRATE_SYSTEM, &prompt)?;
        let choice: ArbitrateChoice = super::parse_json_response(&response)?;
        Ok(choice.id)
    }
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedder over the OpenAI or Ollama embedding APIs.
pub enum HttpEmbedder {
    OpenAI { api_key: String, model: String },
    Ollama { base_url: String, model: String },
}

impl HttpEmbedder {
    /// `OPENAI_API_KEY` → OpenAI, otherwise local Ollama.
    pub fn from_env() -> Self {
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            return Self::OpenAI {
                api_key,
                model: std::env::var("REPOGRAPH_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            };
        }
        Self::Ollama {
            base_url: std::env::var("REPOGRAPH_LOCAL_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: std::env::var("REPOGRAPH_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "nomic-embed-text".to_string()),
        }
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let mut vector = match self {
            Self::OpenAI { api_key, model } => {
                let request = OpenAIEmbeddingRequest {
                    model: model.clone(),
                    input: vec![text.to_string()],
                };
                let mut response = ureq::post("https://api.openai.com/v1/embeddings")
                    .header("authorization", format!("Bearer {api_key}"))
                    .send_json(&request)
                    .map_err(http_error)?;
                let body: OpenAIEmbeddingResponse = response
                    .body_mut()
                    .read_json()
                    .map_err(|e| ModelError::Parse(e.to_string()))?;
                body.data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or(ModelError::Empty)?
            }
            Self::Ollama { base_url, model } => {
                let url = format!("{}/api/embed", base_url.trim_end_matches('/'));
                let request = OllamaEmbedRequest {
                    model: model.clone(),
                    input: vec![text.to_string()],
                };
                let mut response = ureq::post(&url).send_json(&request).map_err(http_error)?;
                let body: OllamaEmbedResponse = response
                    .body_mut()
                    .read_json()
                    .map_err(|e| ModelError::Parse(e.to_string()))?;
                body.embeddings.into_iter().next().ok_or(ModelError::Empty)?
            }
        };
        if vector.is_empty() {
            return Err(ModelError::Empty);
        }
        super::normalize_l2(&mut vector);
        Ok(vector)
    }
}
