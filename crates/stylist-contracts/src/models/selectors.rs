use std::fmt;

use super::registry::{ModelRegistry, ModelSpec};
use crate::error::{ConfigArea, StylistError};

/// Why the active model differs from what was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    Unspecified,
    NotAllowed { requested: String },
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "No model specified; using the default."),
            Self::NotAllowed { requested } => {
                write!(f, "Model '{requested}' is not on the allow-list.")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub fallback: Option<Fallback>,
}

impl ModelSelection {
    /// The name the caller asked for, when there was one.
    pub fn requested(&self) -> Option<&str> {
        match &self.fallback {
            None => Some(self.model.name.as_str()),
            Some(Fallback::NotAllowed { requested }) => Some(requested.as_str()),
            Some(Fallback::Unspecified) => None,
        }
    }
}

/// The model a session is talking to, kept on the allow-list for one capability.
///
/// Construction fails only when nothing in the registry has the capability.
/// After that every request resolves, falling back to the first allowed model.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    registry: ModelRegistry,
    capability: String,
    default: ModelSpec,
    current: ModelSpec,
}

impl ModelSelector {
    pub fn new(registry: ModelRegistry, capability: &str) -> Result<Self, StylistError> {
        let Some(default) = registry.by_capability(capability).into_iter().next() else {
            return Err(StylistError::configuration(
                ConfigArea::Models,
                format!("No models available for capability '{capability}'."),
            ));
        };
        Ok(Self {
            registry,
            capability: capability.to_string(),
            current: default.clone(),
            default,
        })
    }

    pub fn current(&self) -> &ModelSpec {
        &self.current
    }

    pub fn allowed(&self) -> Vec<ModelSpec> {
        self.registry.by_capability(&self.capability)
    }

    /// Switches to `requested`, or to the default when it is blank or not allowed.
    pub fn select(&mut self, requested: Option<&str>) -> ModelSelection {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let selection = match requested {
            Some(name) => match self.registry.ensure(name, &self.capability) {
                Some(model) => ModelSelection {
                    model,
                    fallback: None,
                },
                None => ModelSelection {
                    model: self.default.clone(),
                    fallback: Some(Fallback::NotAllowed {
                        requested: name.to_string(),
                    }),
                },
            },
            None => ModelSelection {
                model: self.default.clone(),
                fallback: Some(Fallback::Unspecified),
            },
        };
        self.current = selection.model.clone();
        selection
    }

    /// Replacement to offer after the provider rejects `model`.
    pub fn alternative_to(&self, model: &str) -> Option<String> {
        self.registry.suggest_alternative(model, &self.capability)
    }
}
