//! Gemini generateContent boundary
//!
//! Wire types for the REST API, the `GenerationService` seam the advisory
//! client retries against, and the HTTP client that implements it.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Failure of a single generation call, already classified for retry decisions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Classify a failed call from its HTTP status and error text.
    ///
    /// Quota depletion is reported with HTTP 429 as well, so the message is
    /// checked for quota/billing wording before the status is considered.
    pub fn classify(status: Option<StatusCode>, message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("quota") || lower.contains("billing") {
            ServiceError::QuotaExhausted(message)
        } else if status == Some(StatusCode::TOO_MANY_REQUESTS) || lower.contains("resource_exhausted") {
            ServiceError::RateLimited(message)
        } else {
            ServiceError::Other(message)
        }
    }
}

// ============ Request ============

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub contents: Vec<RequestContent>,
    pub generation_config: GenerationConfig,
    pub safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RequestContent {
    pub role: String,
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RequestPart {
    pub text: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl GenerationRequest {
    /// Single-turn user prompt with harassment and hate-speech filtering
    /// turned off, so pest and pesticide questions are not blocked.
    pub fn new(prompt: &str, temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens,
            },
            safety_settings: vec![
                SafetySetting {
                    category: "HARM_CATEGORY_HARASSMENT".to_string(),
                    threshold: "BLOCK_NONE".to_string(),
                },
                SafetySetting {
                    category: "HARM_CATEGORY_HATE_SPEECH".to_string(),
                    threshold: "BLOCK_NONE".to_string(),
                },
            ],
        }
    }
}

// ============ Response ============

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct GenerationResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

/// A content fragment. Non-text parts (inline data, function calls) carry no `text`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ResponsePart {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

// ============ Service Seam ============

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate_content(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ServiceError>;
}

// ============ HTTP Client ============

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ServiceError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.trim_start_matches("models/").to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", BASE_URL, self.model)
    }

    /// Validate the API key with a tiny request
    pub async fn validate_api_key(&self) -> Result<bool, ServiceError> {
        match self.generate_content(&GenerationRequest::new("Say 'ok'", 0.0, 10)).await {
            Ok(_) => Ok(true),
            Err(ServiceError::Other(message)) if is_invalid_key_message(&message) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn is_invalid_key_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("api key not valid") || lower.contains("api_key_invalid") || lower.contains("(401")
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate_content(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, ServiceError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ServiceError::Other(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, &error_text));
        }

        response
            .json::<GenerationResponse>()
            .await
            .map_err(|e| ServiceError::Other(format!("Failed to parse Gemini response: {}", e)))
    }
}

fn map_http_error(status: StatusCode, body: &str) -> ServiceError {
    let detail = match serde_json::from_str::<ErrorWrapper>(body) {
        Ok(parsed) => {
            let message = parsed.error.message.unwrap_or_else(|| body.to_string());
            match parsed.error.status {
                Some(s) if !s.is_empty() => format!("{}: {}", s, message),
                _ => message,
            }
        }
        Err(_) => body.to_string(),
    };

    ServiceError::classify(
        Some(status),
        format!("Gemini API error ({}): {}", status.as_u16(), detail),
    )
}
