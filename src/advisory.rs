//! Advisory generation with bounded retry
//!
//! `AdvisoryClient` turns a prompt into advice text. Every attempt is preceded
//! by a short cooldown; rate-limited and transient failures are retried up to
//! the attempt limit, quota exhaustion stops immediately, and whatever the
//! upstream service did is folded into a `FailureReason` before it reaches the
//! caller.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::gemini::{GenerationRequest, GenerationResponse, GenerationService, ServiceError};
use crate::logging;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const QUOTA_GUIDANCE_URL: &str = "https://ai.dev/usage";

/// Success text, or the reason no advice could be produced.
pub type AdvisoryResult = Result<String, FailureReason>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("API quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("no valid response returned")]
    EmptyResponse,
    #[error("error after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl FailureReason {
    /// Warning text shown to the farmer in place of advice.
    pub fn user_message(&self) -> String {
        match self {
            FailureReason::QuotaExceeded(_) => format!(
                "⚠️ API Quota Exceeded! Please check your billing plan at {}",
                QUOTA_GUIDANCE_URL
            ),
            FailureReason::EmptyResponse => "⚠️ No valid response returned.".to_string(),
            FailureReason::RetriesExhausted {
                attempts,
                last_error,
            } => format!("⚠️ Error after {} attempts: {}", attempts, last_error),
        }
    }
}

// ============ Generation Parameters ============

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    #[error("temperature must be between 0.0 and 1.0, got {0}")]
    Temperature(f32),
    #[error("temperature must be a number, got '{0}'")]
    NotANumber(String),
    #[error("max output tokens must be positive")]
    MaxOutputTokens,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    temperature: f32,
    max_output_tokens: u32,
}

impl GenerationParams {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Result<Self, ParamError> {
        if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
            return Err(ParamError::Temperature(temperature));
        }
        if max_output_tokens == 0 {
            return Err(ParamError::MaxOutputTokens);
        }
        Ok(Self {
            temperature,
            max_output_tokens,
        })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    /// Same token limit, new temperature.
    pub fn with_temperature(self, temperature: f32) -> Result<Self, ParamError> {
        Self::new(temperature, self.max_output_tokens)
    }
}

// ============ Retry Policy ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    RateLimited,
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Cooldown before every attempt, including the first.
    pub pre_call_delay: Duration,
    /// Rate-limit backoff grows by this much per failed attempt.
    pub rate_limit_step: Duration,
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            pre_call_delay: Duration::from_secs(3),
            rate_limit_step: Duration::from_secs(5),
            transient_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Policy with every wait removed.
    pub fn immediate() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            pre_call_delay: Duration::ZERO,
            rate_limit_step: Duration::ZERO,
            transient_delay: Duration::ZERO,
        }
    }

    /// Wait after the 1-based `failed_attempt`. Never decreases for a given cause.
    pub fn backoff(&self, cause: RetryCause, failed_attempt: u32) -> Duration {
        match cause {
            RetryCause::RateLimited => self.rate_limit_step * failed_attempt.max(1),
            RetryCause::Transient => self.transient_delay,
        }
    }
}

/// Emitted before each retry wait so an operator knows why nothing is happening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryNotice {
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub cause: RetryCause,
}

impl RetryNotice {
    pub fn message(&self) -> String {
        match self.cause {
            RetryCause::RateLimited => format!(
                "⏳ Rate limited. Retrying in {} seconds...",
                self.delay.as_secs()
            ),
            RetryCause::Transient => format!(
                "⚠️ Error occurred, retrying... ({}/{})",
                self.attempt, self.max_attempts
            ),
        }
    }
}

type Notifier = Box<dyn Fn(&RetryNotice) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    prompt: String,
    temperature_bits: u32,
    max_output_tokens: u32,
}

impl CacheKey {
    fn new(prompt: &str, params: GenerationParams) -> Self {
        Self {
            prompt: prompt.to_string(),
            temperature_bits: params.temperature.to_bits(),
            max_output_tokens: params.max_output_tokens,
        }
    }
}

// ============ Advisory Client ============

pub struct AdvisoryClient<S: GenerationService> {
    service: S,
    policy: RetryPolicy,
    notifier: Option<Notifier>,
    cache: Option<Mutex<HashMap<CacheKey, String>>>,
}

impl<S: GenerationService> AdvisoryClient<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            policy: RetryPolicy::default(),
            notifier: None,
            cache: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Receive a notice before every retry wait.
    pub fn with_notifier<F>(mut self, notifier: F) -> Self
    where
        F: Fn(&RetryNotice) + Send + Sync + 'static,
    {
        self.notifier = Some(Box::new(notifier));
        self
    }

    /// Remember successful texts per (prompt, temperature, max tokens).
    pub fn with_response_cache(mut self) -> Self {
        self.cache = Some(Mutex::new(HashMap::new()));
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generate advice for `prompt`. Never returns an empty success string.
    pub async fn generate(&self, prompt: &str, params: GenerationParams) -> AdvisoryResult {
        let key = CacheKey::new(prompt, params);
        if let Some(text) = self.cached(&key) {
            logging::log_advisory(None, "Serving cached advisory");
            return Ok(text);
        }

        let request =
            GenerationRequest::new(prompt, params.temperature, params.max_output_tokens);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if !self.policy.pre_call_delay.is_zero() {
                tokio::time::sleep(self.policy.pre_call_delay).await;
            }

            let err = match self.service.generate_content(&request).await {
                Ok(response) => {
                    return match extract_text(&response) {
                        Some(text) => {
                            logging::log_advisory(
                                None,
                                &format!("Advisory generated on attempt {}/{}", attempt, max_attempts),
                            );
                            self.remember(key, &text);
                            Ok(text)
                        }
                        None => {
                            logging::log_advisory(None, "Response carried no text");
                            Err(FailureReason::EmptyResponse)
                        }
                    };
                }
                Err(err) => err,
            };

            let cause = match &err {
                ServiceError::QuotaExhausted(message) => {
                    logging::log_advisory(None, &format!("Quota exhausted: {}", message));
                    return Err(FailureReason::QuotaExceeded(message.clone()));
                }
                ServiceError::RateLimited(_) => RetryCause::RateLimited,
                ServiceError::Other(_) => RetryCause::Transient,
            };

            if attempt >= max_attempts {
                logging::log_advisory(
                    None,
                    &format!("Giving up after {} attempts: {}", attempt, err),
                );
                return Err(FailureReason::RetriesExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            let notice = RetryNotice {
                attempt,
                max_attempts,
                delay: self.policy.backoff(cause, attempt),
                cause,
            };
            logging::log_advisory(None, &format!("{} ({})", notice.message(), err));
            if let Some(notify) = &self.notifier {
                notify(&notice);
            }

            tokio::time::sleep(notice.delay).await;
            attempt += 1;
        }
    }

    fn cached(&self, key: &CacheKey) -> Option<String> {
        let cache = self.cache.as_ref()?;
        cache.lock().ok()?.get(key).cloned()
    }

    fn remember(&self, key: CacheKey, text: &str) {
        if let Some(cache) = &self.cache {
            if let Ok(mut entries) = cache.lock() {
                entries.insert(key, text.to_string());
            }
        }
    }
}

/// Concatenate the text parts of the first candidate.
///
/// Parts without text are skipped. `None` when there is no candidate, no
/// content, or nothing but empty text.
pub fn extract_text(response: &GenerationResponse) -> Option<String> {
    let content = response.candidates.first()?.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
