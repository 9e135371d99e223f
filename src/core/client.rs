//! Async translation client with bounded concurrency, timeout and retry

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::core::config::TranslatorConfig;
use crate::core::errors::{DocsError, TranslationError};
use crate::core::mappings::Glossary;
use crate::core::prompt::system_prompt;

/// Result of a single translation call
pub type TranslationResult<T> = std::result::Result<T, TranslationError>;

/// A text-completion service: system instructions plus user text in,
/// completion out
#[async_trait]
pub trait CompletionBackend: Send + Sync + std::fmt::Debug {
    async fn complete(&self, system: &str, text: &str) -> TranslationResult<String>;
}

/// Cloudflare Workers AI backend
#[derive(Debug, Clone)]
pub struct WorkersAiBackend {
    client: reqwest::Client,
    config: Arc<TranslatorConfig>,
}

impl WorkersAiBackend {
    /// HTTP client with the configured timeout
    pub fn new(config: Arc<TranslatorConfig>) -> TranslationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionBackend for WorkersAiBackend {
    async fn complete(&self, system: &str, text: &str) -> TranslationResult<String> {
        if self.config.api_token.is_empty() {
            return Err(TranslationError::MissingCredentials {
                field: "api_token".to_string(),
            });
        }
        if self.config.account_id.is_empty() {
            return Err(TranslationError::MissingCredentials {
                field: "account_id".to_string(),
            });
        }

        let body = serde_json::json!({
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": text }
            ],
            "max_tokens": self.config.max_tokens
        });

        let response = self
            .client
            .post(self.config.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslationError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status();

        if status.is_success() {
            let json: serde_json::Value =
                response
                    .json()
                    .await
                    .map_err(|e| TranslationError::InvalidResponseError {
                        message: e.to_string(),
                    })?;

            return extract_completion(&json).ok_or_else(|| TranslationError::InvalidResponseError {
                message: "No translation in response".to_string(),
            });
        }

        let status_code = status.as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let error_text = response.text().await.unwrap_or_default();

        if status_code == 429 {
            return Err(TranslationError::RateLimitError { retry_after });
        }

        let message = serde_json::from_str::<serde_json::Value>(&error_text)
            .ok()
            .and_then(|json| json["errors"][0]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or(error_text)
            });

        Err(TranslationError::ApiError {
            status: status_code,
            message,
        })
    }
}

/// Pull the completion text out of a Workers AI response body
///
/// Accepts `result.response`, `result.choices[0].message.content` or a bare
/// string `result`. Blank completions count as missing.
pub fn extract_completion(json: &serde_json::Value) -> Option<String> {
    if json["success"].as_bool() == Some(false) {
        return None;
    }

    let result = &json["result"];
    let text = result["response"]
        .as_str()
        .or_else(|| {
            result["choices"]
                .get(0)
                .and_then(|c| c["message"]["content"].as_str())
        })
        .or_else(|| result.as_str())?;

    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Translation client shared by every file of a run
#[derive(Debug, Clone)]
pub struct AsyncTranslator {
    backend: Arc<dyn CompletionBackend>,
    config: Arc<TranslatorConfig>,
    semaphore: Arc<Semaphore>,
    system_prompt: Arc<str>,
}

impl AsyncTranslator {
    /// Create a translator backed by Workers AI
    pub fn new(config: TranslatorConfig, glossary: &Glossary) -> Result<Self, DocsError> {
        config.validate()?;

        let config = Arc::new(config);
        let backend = WorkersAiBackend::new(config.clone())?;
        Ok(Self::assemble(config, glossary, Arc::new(backend)))
    }

    /// Create a translator over any completion backend
    pub fn with_backend(
        config: TranslatorConfig,
        glossary: &Glossary,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self::assemble(Arc::new(config), glossary, backend)
    }

    fn assemble(
        config: Arc<TranslatorConfig>,
        glossary: &Glossary,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

        Self {
            backend,
            config,
            semaphore,
            system_prompt: Arc::from(system_prompt(glossary)),
        }
    }

    /// Translate one masked document
    pub async fn translate(&self, text: &str) -> TranslationResult<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| TranslationError::NetworkError {
                message: e.to_string(),
            })?;

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {} with model {}", attempt, self.config.model);
                sleep(Duration::from_millis(
                    self.config.retry_delay_ms * 2_u64.pow(attempt - 1),
                ))
                .await;
            }

            match self.call_once(text).await {
                Ok(translation) => {
                    if attempt > 0 {
                        info!("Successfully translated after {} retries", attempt);
                    }
                    return Ok(translation);
                }
                Err(e) => {
                    let transient = e.is_transient();
                    warn!("Translation attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                    if !transient {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(TranslationError::InvalidResponseError {
            message: "no attempt was made".to_string(),
        }))
    }

    async fn call_once(&self, text: &str) -> TranslationResult<String> {
        let limit = Duration::from_millis(self.config.timeout_ms);
        let translation = timeout(limit, self.backend.complete(&self.system_prompt, text))
            .await
            .map_err(|_| TranslationError::TimeoutError {
                timeout_ms: self.config.timeout_ms,
            })??;

        if translation.trim().is_empty() {
            return Err(TranslationError::InvalidResponseError {
                message: "Empty translation".to_string(),
            });
        }

        Ok(translation)
    }

    /// Prompt sent with every call, glossary included
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}
