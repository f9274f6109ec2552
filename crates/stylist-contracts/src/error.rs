use thiserror::Error;

/// Failure reported by a closet notifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("notifier not configured: {0}")]
    Unconfigured(String),

    #[error("notification failed: {0}")]
    Transport(String),
}

/// Failure reported by an AI provider for a single generate call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    #[error("provider not configured: {0}")]
    Unconfigured(String),

    #[error("model '{model}' not found")]
    ModelNotFound { model: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// The setting a configuration failure points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigArea {
    ApiKey,
    Email,
    Models,
}

/// What the user gets to see when a stylist action fails.
///
/// None of these end the session; the caller reports them and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StylistError {
    #[error("configuration: {message}")]
    Configuration { area: ConfigArea, message: String },

    #[error("model '{model}' not found")]
    ModelNotFound {
        model: String,
        suggestion: Option<String>,
    },

    #[error("transport: {0}")]
    Transport(String),
}

impl StylistError {
    pub fn configuration(area: ConfigArea, message: impl Into<String>) -> Self {
        Self::Configuration {
            area,
            message: message.into(),
        }
    }

    pub fn from_ai(err: AiError, suggestion: Option<String>) -> Self {
        match err {
            AiError::Unconfigured(message) => Self::configuration(ConfigArea::ApiKey, message),
            AiError::ModelNotFound { model } => Self::ModelNotFound { model, suggestion },
            AiError::Transport(message) => Self::Transport(message),
            AiError::InvalidResponse(message) => Self::Transport(message),
        }
    }

    /// Follow-up hint shown under the error line, if any.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ModelNotFound {
                suggestion: Some(suggestion),
                ..
            } => Some(format!("Try selecting '{suggestion}' instead.")),
            Self::Configuration { area, .. } => match area {
                ConfigArea::ApiKey => {
                    Some("Set GEMINI_API_KEY or enter a key with /key.".to_string())
                }
                ConfigArea::Email => Some(
                    "Set EMAIL_SENDER and EMAIL_PASSWORD in the secrets file \
                     (or STYLIST_EMAIL_SENDER and STYLIST_EMAIL_PASSWORD)."
                        .to_string(),
                ),
                ConfigArea::Models => None,
            },
            _ => None,
        }
    }
}

impl From<NotifyError> for StylistError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::Unconfigured(message) => Self::configuration(ConfigArea::Email, message),
            NotifyError::Transport(message) => Self::Transport(message),
        }
    }
}
