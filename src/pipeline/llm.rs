//! Language-model collaborator: "prompt in, text out, or failure".
//!
//! The production client talks to the Yandex Foundation Models completion
//! endpoint over blocking HTTP; tests use [`MockLlmClient`] with a
//! scripted response sequence.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Cannot reach model endpoint at {0}")]
    Connection(String),

    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    #[error("Model endpoint returned error (status {status}): {body}")]
    Endpoint { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),
}

/// Black-box model collaborator.
pub trait LlmClient: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Generation settings passed with every completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "yandexgpt-lite".to_string(),
            temperature: 0.1,
            max_tokens: 10_000,
            timeout_secs: 45,
        }
    }
}

const YANDEX_COMPLETION_URL: &str =
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion";

/// YandexGPT HTTP client.
pub struct YandexGptClient {
    api_key: String,
    folder_id: String,
    settings: LlmSettings,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl YandexGptClient {
    pub fn new(api_key: String, folder_id: String, settings: LlmSettings) -> Self {
        Self::with_base_url(api_key, folder_id, settings, YANDEX_COMPLETION_URL)
    }

    pub fn with_base_url(
        api_key: String,
        folder_id: String,
        settings: LlmSettings,
        base_url: &str,
    ) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            api_key,
            folder_id,
            settings,
            base_url: base_url.to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: String,
    messages: Vec<CompletionMessage<'a>>,
    completion_options: CompletionOptions,
}

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Deserialize)]
struct CompletionResult {
    alternatives: Vec<CompletionAlternative>,
}

#[derive(Deserialize)]
struct CompletionAlternative {
    message: CompletionAnswer,
}

#[derive(Deserialize)]
struct CompletionAnswer {
    text: String,
}

impl LlmClient for YandexGptClient {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model_uri: format!("gpt://{}/{}", self.folder_id, self.settings.model),
            messages: vec![CompletionMessage {
                role: "user",
                text: prompt,
            }],
            completion_options: CompletionOptions {
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            },
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    LlmError::Timeout(self.settings.timeout_secs)
                } else {
                    LlmError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .map_err(|e| LlmError::ResponseShape(e.to_string()))?;

        let text = parsed
            .result
            .alternatives
            .into_iter()
            .next()
            .map(|alt| alt.message.text)
            .ok_or_else(|| LlmError::ResponseShape("empty alternatives array".into()))?;

        Ok(text.trim().to_string())
    }
}

/// Mock client returning a scripted sequence of responses; the last one
/// repeats once the script runs out. An empty script fails every call.
pub struct MockLlmClient {
    responses: Mutex<Vec<Result<String, String>>>,
    pub calls: Mutex<u32>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self::with_sequence(vec![Ok(response.to_string())])
    }

    pub fn with_sequence(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::with_sequence(vec![])
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        *self.calls.lock().unwrap() += 1;
        let mut responses = self.responses.lock().unwrap();
        let next = if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses
                .first()
                .cloned()
                .unwrap_or(Err("no scripted response".to_string()))
        };
        next.map_err(LlmError::HttpClient)
    }
}
