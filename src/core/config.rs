//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::core::errors::{DocsError, Result};

/// Default Workers AI model
pub const DEFAULT_MODEL: &str = "@cf/meta/llama-3-8b-instruct";

/// Default Cloudflare API base
pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Configuration for the translation client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Cloudflare API token
    pub api_token: String,
    /// Cloudflare account ID
    pub account_id: String,
    /// API base URL, without trailing slash
    pub api_base: String,
    /// Workers AI model identifier
    pub model: String,
    /// Files and model calls in flight at once
    pub max_concurrent: usize,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    /// Base delay between attempts, doubled each retry
    pub retry_delay_ms: u64,
    /// Completion token limit per call
    pub max_tokens: u32,
    /// Per-call timeout
    pub timeout_ms: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_token: std::env::var("CLOUDFLARE_API_TOKEN").unwrap_or_default(),
            account_id: std::env::var("CLOUDFLARE_ACCOUNT_ID").unwrap_or_default(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_concurrent: 5,
            max_retries: 2,
            retry_delay_ms: 1000,
            max_tokens: 4000,
            timeout_ms: 120_000,
        }
    }
}

/// Read an env var and parse it, falling back to `default` when unset
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| DocsError::config(format!("{} is invalid: {}", key, e))),
        Err(_) => Ok(default),
    }
}

impl TranslatorConfig {
    /// Load configuration from environment variables
    ///
    /// Credentials may be empty here; [`TranslatorConfig::validate`] decides
    /// whether that is fatal.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            api_token: defaults.api_token,
            account_id: defaults.account_id,
            api_base: std::env::var("CF_API_BASE").unwrap_or(defaults.api_base),
            model: std::env::var("CF_AI_MODEL").unwrap_or(defaults.model),
            max_concurrent: env_or("MAX_CONCURRENT", defaults.max_concurrent)?,
            max_retries: env_or("MAX_RETRIES", defaults.max_retries)?,
            retry_delay_ms: env_or("RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            max_tokens: env_or("MAX_TOKENS", defaults.max_tokens)?,
            timeout_ms: env_or("REQUEST_TIMEOUT_MS", defaults.timeout_ms)?,
        })
    }

    /// Load from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DocsError::file(path.as_ref(), e))?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            return Err(DocsError::config(
                "API token is required (set CLOUDFLARE_API_TOKEN or --api-token)",
            ));
        }

        if self.account_id.is_empty() {
            return Err(DocsError::config(
                "Account ID is required (set CLOUDFLARE_ACCOUNT_ID or --account-id)",
            ));
        }

        if self.model.is_empty() {
            return Err(DocsError::config("model is required"));
        }

        if self.max_concurrent == 0 {
            return Err(DocsError::config("max_concurrent must be greater than 0"));
        }

        if self.timeout_ms == 0 {
            warn!("timeout_ms is 0, every request will time out");
        }

        Ok(())
    }

    /// Endpoint for the configured model
    pub fn endpoint(&self) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.api_base.trim_end_matches('/'),
            self.account_id,
            self.model
        )
    }
}

/// Options for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Root of the English source tree
    pub content_dir: PathBuf,
    /// Root of the translated output tree
    pub docs_dir: PathBuf,
    /// Persisted translation cache
    pub cache_file: PathBuf,
    /// Mapping tables file; the built-in tables are used when absent
    pub mappings_file: Option<PathBuf>,
    /// Glossary file
    pub glossary_file: Option<PathBuf>,
    /// Translate with the AI backend; format-only when false
    pub use_ai: bool,
    /// Concurrently processed files
    pub max_concurrent: usize,
    /// Domains whose absolute URLs are rewritten to local paths
    pub site_domains: Vec<String>,
    /// File names exempt from absolute URL rewriting
    pub excluded_files: Vec<String>,
    /// Top-level sections probed when resolving a bare page name
    pub section_dirs: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("content"),
            docs_dir: PathBuf::from("docs"),
            cache_file: PathBuf::from(".translation-cache.json"),
            mappings_file: None,
            glossary_file: None,
            use_ai: true,
            max_concurrent: 5,
            site_domains: vec!["docs.nestjs.com".to_string(), "docs.nestjs.cn".to_string()],
            excluded_files: vec!["awesome.md".to_string(), "index.md".to_string()],
            section_dirs: vec![
                "overview".to_string(),
                "fundamentals".to_string(),
                "techniques".to_string(),
            ],
        }
    }
}

impl RunOptions {
    /// Validate directory layout and limits before any file is touched
    pub fn validate(&self) -> Result<()> {
        if !self.content_dir.is_dir() {
            return Err(DocsError::config(format!(
                "Source directory '{}' does not exist",
                self.content_dir.display()
            )));
        }

        if self.max_concurrent == 0 {
            return Err(DocsError::config("max_concurrent must be greater than 0"));
        }

        if self.site_domains.is_empty() {
            warn!("No site domains configured, absolute URLs will not be rewritten");
        }

        Ok(())
    }

    /// Label used for the source tree in provenance headers
    pub fn source_label(&self) -> String {
        self.content_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "content".to_string())
    }
}
