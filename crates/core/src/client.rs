//! Completion client for the Gemini `streamGenerateContent` endpoint.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::QuillError;
use crate::stream::{self, CancelToken};
use crate::Message;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: WireGenerationConfig,
}

#[derive(Serialize, Debug, PartialEq)]
pub(crate) struct Content {
    pub(crate) role: &'static str,
    pub(crate) parts: Vec<Part>,
}

#[derive(Serialize, Debug, PartialEq)]
pub(crate) struct Part {
    pub(crate) text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct ApiError {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Streaming completion client.
///
/// At most one request is in flight per client; starting a new `send`
/// cancels the previous one.
pub struct GeminiClient {
    http: reqwest::Client,
    config: ClientConfig,
    in_flight: Mutex<CancelToken>,
}

impl GeminiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            in_flight: Mutex::new(CancelToken::new()),
        }
    }

    /// Send the conversation history and stream back the reply.
    ///
    /// `on_delta` is invoked synchronously for each piece of generated text,
    /// in arrival order; the full aggregate is returned at the end. A reply
    /// with no extractable text at all is a [`QuillError::Decode`].
    pub async fn send(
        &self,
        history: &[Message],
        system_instruction: Option<&str>,
        mut on_delta: impl FnMut(&str),
    ) -> Result<String, QuillError> {
        if self.config.api_key.trim().is_empty() {
            return Err(QuillError::Configuration("no API key configured".into()));
        }

        let cancel = self.replace_token();

        let url = format!(
            "{}/models/{}:streamGenerateContent",
            self.config.base_url, self.config.model
        );
        let request = GenerateRequest {
            contents: build_contents(history, system_instruction),
            generation_config: WireGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| QuillError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiError>(&body)
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(QuillError::Request(detail));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // A declared JSON content type means the body is one document, not a
        // live stream; read it whole and extract in a single pass.
        let aggregate = if content_type.contains("application/json") {
            let body = response
                .text()
                .await
                .map_err(|e| QuillError::Request(e.to_string()))?;
            if cancel.is_cancelled() {
                return Err(QuillError::Cancelled);
            }
            stream::read_document(&body, &mut on_delta)
        } else {
            stream::read_stream(response.bytes_stream(), &cancel, &mut on_delta).await?
        };

        if aggregate.is_empty() {
            return Err(QuillError::Decode);
        }
        Ok(aggregate)
    }

    /// Cancel the in-flight request, if any. Idempotent; a no-op once the
    /// request has completed.
    pub fn cancel(&self) {
        let guard = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        guard.cancel();
    }

    // Cancels the previous request's token and installs a fresh one.
    fn replace_token(&self) -> CancelToken {
        let mut guard = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        guard.cancel();
        let token = CancelToken::new();
        *guard = token.clone();
        token
    }
}

pub(crate) fn build_contents(
    history: &[Message],
    system_instruction: Option<&str>,
) -> Vec<Content> {
    let mut contents = Vec::with_capacity(history.len() + 1);

    // The API has no dedicated system role; the instruction goes first as a
    // model turn, matching the service's documented convention.
    if let Some(prompt) = system_instruction.filter(|p| !p.trim().is_empty()) {
        contents.push(Content {
            role: "model",
            parts: vec![Part {
                text: prompt.to_string(),
            }],
        });
    }

    for message in history {
        contents.push(Content {
            role: message.role.wire_name(),
            parts: vec![Part {
                text: message.content.clone(),
            }],
        });
    }

    contents
}
