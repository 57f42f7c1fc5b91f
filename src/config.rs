//! Configuration management for the risk service

use crate::error::ClassifiedError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Gemini's OpenAI-compatible endpoint
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_OPENAI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_HUGGINGFACE_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_HUGGINGFACE_MODEL: &str = "gpt-3.5-turbo";

/// What happens when the model call or its output fails
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPolicy {
    /// Every failure surfaces as a classified error
    #[default]
    Strict,
    /// Failures are replaced by a marked mid-point analysis
    DegradedFallback,
}

/// How `recommended_action` is validated
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    /// Any non-empty sentence
    #[default]
    FreeText,
    /// One of allow, review, block
    Enumerated,
    /// Enumerated and consistent with the score bucket
    Bucketed,
}

/// Which provider adapter talks to the model
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Chat-completions API (Gemini's compatibility endpoint, OpenAI)
    #[default]
    OpenaiCompatible,
    /// Hugging Face hosted inference
    Huggingface,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub analysis: AnalysisConfig,
    pub notification: NotificationConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Inbound HTTP configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Shared secret expected in the X-API-Key header
    #[serde(default)]
    pub api_key: String,
}

/// Generative model provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default)]
    pub api_key: String,
    /// Model identifier; adapter default when absent
    #[serde(default)]
    pub model: Option<String>,
    /// API root; adapter default when absent
    #[serde(default)]
    pub base_url: Option<String>,
    /// Timeout for the single model call in milliseconds
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

/// Analysis behaviour
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub policy: AnalysisPolicy,
    #[serde(default)]
    pub action_mode: ActionMode,
    /// Accept model replies carrying keys beyond the four required ones
    #[serde(default)]
    pub allow_extra_fields: bool,
}

/// Admin webhook configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_notification_timeout_ms")]
    pub timeout_ms: u64,
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsConfig {
    /// Also record risk scores of fallback analyses
    #[serde(default)]
    pub record_degraded: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            api_key: String::new(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_key: String::new(),
            model: None,
            base_url: None,
            timeout_ms: default_provider_timeout_ms(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            timeout_ms: default_notification_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_provider_timeout_ms() -> u64 {
    30_000
}

fn default_notification_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Legacy environment variable names, first set one wins
const API_KEY_VARS: &[&str] = &["API_KEY"];
const WEBHOOK_URL_VARS: &[&str] = &["ADMIN_WEBHOOK_URL"];
const OPENAI_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "OPENAI_API_KEY"];
const OPENAI_MODEL_VARS: &[&str] = &["GEMINI_MODEL"];
const HUGGINGFACE_KEY_VARS: &[&str] = &["HF_API_TOKEN"];
const HUGGINGFACE_MODEL_VARS: &[&str] = &["HF_MODEL"];

impl ProviderConfig {
    /// Model identifier, or the adapter default when none is configured.
    ///
    /// A configured but blank model is returned as is and rejected by
    /// [`ProviderConfig::check`].
    pub fn model_or_default(&self) -> &str {
        match self.model.as_deref() {
            Some(model) => model,
            None => match self.kind {
                ProviderKind::OpenaiCompatible => DEFAULT_OPENAI_MODEL,
                ProviderKind::Huggingface => DEFAULT_HUGGINGFACE_MODEL,
            },
        }
    }

    /// Legacy variable names for the key and model of this provider kind
    fn legacy_vars(&self) -> (&'static [&'static str], &'static [&'static str]) {
        match self.kind {
            ProviderKind::OpenaiCompatible => (OPENAI_KEY_VARS, OPENAI_MODEL_VARS),
            ProviderKind::Huggingface => (HUGGINGFACE_KEY_VARS, HUGGINGFACE_MODEL_VARS),
        }
    }

    /// Reject provider settings no adapter can be built from
    pub fn check(&self) -> std::result::Result<(), ClassifiedError> {
        if self.api_key.trim().is_empty() {
            return Err(ClassifiedError::configuration(
                "provider.api_key is not set",
            ));
        }
        if self.model_or_default().trim().is_empty() {
            return Err(ClassifiedError::configuration("provider.model is empty"));
        }
        if self.timeout_ms == 0 {
            return Err(ClassifiedError::configuration(
                "provider.timeout_ms must be greater than zero",
            ));
        }
        if let Err(e) = reqwest::Url::parse(self.base_url_or_default()) {
            return Err(ClassifiedError::configuration(format!(
                "provider.base_url is not a valid URL: {e}"
            )));
        }
        Ok(())
    }

    /// API root with the adapter default applied, without trailing slash
    pub fn base_url_or_default(&self) -> &str {
        let url = match self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => url,
            None => match self.kind {
                ProviderKind::OpenaiCompatible => DEFAULT_OPENAI_BASE_URL,
                ProviderKind::Huggingface => DEFAULT_HUGGINGFACE_BASE_URL,
            },
        };
        url.trim_end_matches('/')
    }
}

impl AppConfig {
    /// Load configuration from `config/config.toml` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, layered under the environment.
    ///
    /// The file is optional; `TXN_RISK__SECTION__KEY` variables take
    /// precedence over it, and the legacy variable names over both.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("TXN_RISK")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.apply_legacy_env(|var| std::env::var(var).ok());
        Ok(app)
    }

    /// Apply the legacy variable names.
    ///
    /// Provider credentials are only read for the configured provider kind,
    /// so one provider's key never reaches another provider's host.
    fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_set = |names: &[&str]| {
            names
                .iter()
                .copied()
                .find_map(|name| lookup(name).filter(|value| !value.is_empty()))
        };

        if let Some(api_key) = first_set(API_KEY_VARS) {
            self.server.api_key = api_key;
        }
        if let Some(url) = first_set(WEBHOOK_URL_VARS) {
            self.notification.webhook_url = url;
        }

        let (key_vars, model_vars) = self.provider.legacy_vars();
        if let Some(api_key) = first_set(key_vars) {
            self.provider.api_key = api_key;
        }
        if let Some(model) = first_set(model_vars) {
            self.provider.model = Some(model);
        }
    }

    /// Reject settings that would make every request fail.
    ///
    /// Runs once at startup, before the listener is bound.
    pub fn validate(&self) -> std::result::Result<(), ClassifiedError> {
        if self.server.api_key.trim().is_empty() {
            return Err(ClassifiedError::configuration(
                "server.api_key (API_KEY) is not set",
            ));
        }
        self.provider.check()?;
        if self.notification.timeout_ms == 0 {
            return Err(ClassifiedError::configuration(
                "notification.timeout_ms must be greater than zero",
            ));
        }
        if self.notification.webhook_url.trim().is_empty() {
            return Err(ClassifiedError::configuration(
                "notification.webhook_url (ADMIN_WEBHOOK_URL) is not set",
            ));
        }
        if let Err(e) = reqwest::Url::parse(&self.notification.webhook_url) {
            return Err(ClassifiedError::configuration(format!(
                "notification.webhook_url is not a valid URL: {e}"
            )));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            analysis: AnalysisConfig::default(),
            notification: NotificationConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
