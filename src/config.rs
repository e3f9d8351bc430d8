//! Service settings.
//!
//! Settings are read once at startup from a JSON file (`appsettings.json` by
//! default, `DOCEX_CONFIG` to override), then patched from the environment.
//! The resulting value is immutable and handed to the components that need it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "appsettings.json";
pub const DEFAULT_API_VERSION: &str = "2023-07-31";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(rename = "FormRecognizerSettings", default)]
    pub form_recognizer: FormRecognizerSettings,
    #[serde(rename = "Server", default)]
    pub server: ServerSettings,
    #[serde(rename = "Operations", default)]
    pub operations: OperationSettings,
}

/// Endpoint and access key of the document analysis resource.
#[derive(Clone, Default, Deserialize)]
pub struct FormRecognizerSettings {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub key: String,
}

impl fmt::Debug for FormRecognizerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormRecognizerSettings")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            body_limit_mb: default_body_limit_mb(),
        }
    }
}

/// Knobs for calls into the analysis service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSettings {
    /// Upper bound on waiting for one long-running operation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay between status polls when the service sends no `Retry-After`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Upper bound on a single HTTP round trip.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Build a template-mode model before the neural one.
    #[serde(default = "default_true")]
    pub template_prebuild: bool,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for OperationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            template_prebuild: true,
            api_version: default_api_version(),
        }
    }
}

impl OperationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_body_limit_mb() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl Settings {
    /// Load settings from `DOCEX_CONFIG` (or `appsettings.json`) and the
    /// process environment.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("DOCEX_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(Path::new(&path), |name| std::env::var(name).ok())
    }

    /// Load settings from `path` and apply overrides from `lookup`.
    ///
    /// A missing file is fine as long as the overrides supply the endpoint
    /// and key.
    pub fn load(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings: {:?}", path))?;
            let settings: Settings = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse settings: {:?}", path))?;
            info!("Loaded settings from {:?}", path);
            settings
        } else {
            info!("Settings file {:?} not found, using environment only", path);
            Settings::default()
        };

        settings.apply_overrides(lookup);
        settings.validate()?;
        Ok(settings)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("FORM_RECOGNIZER_ENDPOINT") {
            self.form_recognizer.endpoint = endpoint;
        }
        if let Some(key) = lookup("FORM_RECOGNIZER_KEY") {
            self.form_recognizer.key = key;
        }
        if let Some(bind) = lookup("DOCEX_BIND") {
            self.server.bind = bind;
        }
    }

    fn validate(&self) -> Result<()> {
        let endpoint = self.form_recognizer.endpoint.trim();
        if endpoint.is_empty() {
            anyhow::bail!("FormRecognizerSettings.endpoint is not configured");
        }
        url::Url::parse(endpoint)
            .with_context(|| format!("FormRecognizerSettings.endpoint is not a valid URL: {}", endpoint))?;
        if self.form_recognizer.key.trim().is_empty() {
            anyhow::bail!("FormRecognizerSettings.key is not configured");
        }
        if self.operations.timeout_secs == 0 {
            anyhow::bail!("Operations.timeoutSecs must be greater than zero");
        }
        Ok(())
    }
}
