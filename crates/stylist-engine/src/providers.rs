use std::collections::BTreeMap;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use stylist_contracts::conversation::StylingRequest;
use stylist_contracts::error::AiError;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    pub provider_response: Map<String, Value>,
}

/// Multimodal completion backend. One call, one reply, no retries.
pub trait StylistProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the provider has what it needs (credentials) to be called.
    fn ready(&self) -> Result<(), AiError> {
        Ok(())
    }

    fn generate(
        &self,
        model: &str,
        request: &StylingRequest<'_>,
    ) -> Result<GenerateResponse, AiError>;
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn StylistProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: StylistProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn StylistProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

/// Offline provider that answers from the request shape alone.
pub struct DryrunProvider;

impl StylistProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(
        &self,
        model: &str,
        request: &StylingRequest<'_>,
    ) -> Result<GenerateResponse, AiError> {
        let items: Vec<&str> = request
            .images()
            .map(|file| file.filename.as_str())
            .collect();
        let prompt = request.prompt();
        let mut text = format!(
            "[{}] Outfit for \"{}\" from {} image(s): {}.",
            short_id(prompt),
            prompt,
            items.len(),
            if items.is_empty() {
                "nothing uploaded".to_string()
            } else {
                items.join(", ")
            }
        );
        if request.has_face_analysis() {
            text.push_str(" Colors matched to your skin tone.");
        }

        let mut provider_response = Map::new();
        provider_response.insert("model".to_string(), Value::String(model.to_string()));
        provider_response.insert("images".to_string(), Value::from(items.len()));
        Ok(GenerateResponse {
            text,
            provider_response,
        })
    }
}

fn short_id(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hex::encode(&hasher.finalize()[..4])
}
