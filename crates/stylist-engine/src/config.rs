use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SECRETS_PATH: &str = ".stylist/secrets.toml";
const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;

#[derive(Debug, Clone, PartialEq)]
pub struct NotifierConfig {
    pub sender: Option<String>,
    pub password: Option<String>,
    pub smtp_host: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            sender: None,
            password: None,
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StylistConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: String,
    pub request_timeout_s: f64,
    pub notifier: NotifierConfig,
}

impl Default for StylistConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            model: DEFAULT_MODEL.to_string(),
            request_timeout_s: DEFAULT_REQUEST_TIMEOUT_S,
            notifier: NotifierConfig::default(),
        }
    }
}

/// Layout of the secrets file, keyed the way a hosted secret store exposes them.
#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    #[serde(rename = "GEMINI_API_KEY")]
    api_key: Option<String>,
    #[serde(rename = "GEMINI_API_BASE")]
    api_base: Option<String>,
    #[serde(rename = "EMAIL_SENDER")]
    email_sender: Option<String>,
    #[serde(rename = "EMAIL_PASSWORD")]
    email_password: Option<String>,
    #[serde(rename = "SMTP_HOST")]
    smtp_host: Option<String>,
    #[serde(rename = "MODEL")]
    model: Option<String>,
    #[serde(rename = "REQUEST_TIMEOUT")]
    request_timeout_s: Option<f64>,
}

impl StylistConfig {
    /// Defaults, then the secrets file (when present), then the environment.
    pub fn load(secrets_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        let path = secrets_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_PATH));
        if path.exists() {
            config.apply_secrets_file(&path)?;
        } else if secrets_path.is_some() {
            anyhow::bail!("secrets file not found: {}", path.display());
        }
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    fn apply_secrets_file(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let secrets: SecretsFile =
            toml::from_str(&raw).with_context(|| format!("invalid TOML in {}", path.display()))?;
        self.apply_secrets(secrets);
        Ok(())
    }

    fn apply_secrets(&mut self, secrets: SecretsFile) {
        overlay(&mut self.api_key, secrets.api_key);
        overlay(&mut self.api_base, secrets.api_base);
        overlay(&mut self.notifier.sender, secrets.email_sender);
        overlay(&mut self.notifier.password, secrets.email_password);
        if let Some(host) = non_empty(secrets.smtp_host) {
            self.notifier.smtp_host = host;
        }
        if let Some(model) = non_empty(secrets.model) {
            self.model = model;
        }
        if let Some(timeout) = secrets.request_timeout_s.filter(|value| *value > 0.0) {
            self.request_timeout_s = timeout;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        overlay(
            &mut self.api_key,
            lookup("GEMINI_API_KEY").or_else(|| lookup("GOOGLE_API_KEY")),
        );
        overlay(&mut self.api_base, lookup("GEMINI_API_BASE"));
        overlay(&mut self.notifier.sender, lookup("STYLIST_EMAIL_SENDER"));
        overlay(&mut self.notifier.password, lookup("STYLIST_EMAIL_PASSWORD"));
        if let Some(host) = non_empty(lookup("STYLIST_SMTP_HOST")) {
            self.notifier.smtp_host = host;
        }
        if let Some(model) = non_empty(lookup("STYLIST_MODEL")) {
            self.model = model;
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn overlay(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = non_empty(value) {
        *slot = Some(value);
    }
}
