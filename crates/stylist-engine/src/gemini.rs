use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use stylist_contracts::conversation::{ContentPart, StylingRequest};
use stylist_contracts::error::AiError;

use crate::providers::{GenerateResponse, StylistProvider};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiProvider {
    api_base: String,
    api_key: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(api_key: Option<String>, api_base: Option<String>, timeout_s: f64) -> Self {
        Self {
            api_base: api_base
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: api_key
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            timeout: Duration::from_secs_f64(timeout_s.clamp(5.0, 600.0)),
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(request: &StylingRequest<'_>) -> Value {
        let parts: Vec<Value> = request
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Image(file) => json!({
                    "inlineData": {
                        "mimeType": file.mime_type(),
                        "data": BASE64.encode(&file.bytes),
                    }
                }),
                ContentPart::Text(text) => json!({ "text": text }),
            })
            .collect();
        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "systemInstruction": {
                "parts": [{ "text": request.system_instruction }],
            },
        })
    }

    fn extract_text(payload: &Value) -> Result<String, AiError> {
        let parts = payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let text = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join("");
        if text.trim().is_empty() {
            let reason = payload
                .pointer("/promptFeedback/blockReason")
                .or_else(|| payload.pointer("/candidates/0/finishReason"))
                .and_then(Value::as_str)
                .unwrap_or("no text in response");
            return Err(AiError::InvalidResponse(format!(
                "Gemini returned no text ({reason})"
            )));
        }
        Ok(text)
    }
}

impl StylistProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn ready(&self) -> Result<(), AiError> {
        if self.api_key.is_none() {
            return Err(AiError::Unconfigured(
                "GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string(),
            ));
        }
        Ok(())
    }

    fn generate(
        &self,
        model: &str,
        request: &StylingRequest<'_>,
    ) -> Result<GenerateResponse, AiError> {
        self.ready()?;
        let api_key = self.api_key.as_deref().unwrap_or_default();
        let endpoint = self.endpoint_for_model(model);
        let payload = Self::build_payload(request);

        tracing::debug!(model, images = request.images().count(), "gemini generateContent");
        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .map_err(|err| {
                AiError::Transport(format!("Gemini request failed: {}", err.without_url()))
            })?;

        let status = response.status();
        let body = response.text().map_err(|err| {
            AiError::Transport(format!(
                "Gemini response body read failed: {}",
                err.without_url()
            ))
        })?;
        if status.as_u16() == 404 {
            return Err(AiError::ModelNotFound {
                model: model.to_string(),
            });
        }
        if !status.is_success() {
            return Err(AiError::Transport(format!(
                "Gemini request failed ({}): {}",
                status.as_u16(),
                truncate_text(&body, 512)
            )));
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|err| {
            AiError::InvalidResponse(format!("Gemini returned invalid JSON payload: {err}"))
        })?;
        let text = Self::extract_text(&parsed)?;
        Ok(GenerateResponse {
            text,
            provider_response: parsed.as_object().cloned().unwrap_or_else(Map::new),
        })
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use stylist_contracts::closet::UploadedFile;
    use stylist_contracts::conversation::{StylingRequest, FACE_ANALYSIS_INSTRUCTION};
    use stylist_contracts::error::AiError;

    use super::{truncate_text, GeminiProvider, DEFAULT_API_BASE};
    use crate::providers::StylistProvider;

    #[test]
    fn endpoint_accepts_bare_and_prefixed_model_names() {
        let provider = GeminiProvider::new(Some("k".to_string()), None, 90.0);
        assert_eq!(
            provider.endpoint_for_model("gemini-2.0-flash"),
            format!("{DEFAULT_API_BASE}/models/gemini-2.0-flash:generateContent")
        );
        let custom = GeminiProvider::new(
            Some("k".to_string()),
            Some("http://localhost:9000/v1beta/".to_string()),
            90.0,
        );
        assert_eq!(
            custom.endpoint_for_model("models/gemini-2.5-flash"),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn payload_orders_face_closet_then_prompt() {
        let closet = vec![UploadedFile::new("shirt.png", b"abc".to_vec(), "png")];
        let face = UploadedFile::new("me.jpg", b"xyz".to_vec(), "jpeg");
        let request = StylingRequest::build("brunch", &closet, Some(&face));

        let payload = GeminiProvider::build_payload(&request);
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/jpeg"));
        assert_eq!(parts[0]["inlineData"]["data"], json!("eHl6"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[1]["inlineData"]["data"], json!("YWJj"));
        assert_eq!(parts[2], json!({"text": "brunch"}));
        let instruction = payload["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default();
        assert!(instruction.contains(FACE_ANALYSIS_INSTRUCTION));
    }

    #[test]
    fn extract_text_joins_candidate_parts() {
        let payload = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Navy blazer, "}, {"text": "grey trousers."}]}
            }]
        });
        assert_eq!(
            GeminiProvider::extract_text(&payload),
            Ok("Navy blazer, grey trousers.".to_string())
        );
    }

    #[test]
    fn extract_text_reports_block_reason() {
        let payload = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert_eq!(
            GeminiProvider::extract_text(&payload),
            Err(AiError::InvalidResponse(
                "Gemini returned no text (SAFETY)".to_string()
            ))
        );
    }

    #[test]
    fn missing_key_is_unconfigured() {
        let provider = GeminiProvider::new(Some("   ".to_string()), None, 90.0);
        assert!(matches!(provider.ready(), Err(AiError::Unconfigured(_))));
        let request = StylingRequest::build("x", &[], None);
        assert!(matches!(
            provider.generate("gemini-2.0-flash", &request),
            Err(AiError::Unconfigured(_))
        ));
    }

    #[test]
    fn transport_error_does_not_leak_api_key() {
        let provider = GeminiProvider::new(
            Some("SECRETKEY123".to_string()),
            Some("http://127.0.0.1:9".to_string()),
            5.0,
        );
        let closet = vec![UploadedFile::new("shirt.png", b"abc".to_vec(), "png")];
        let request = StylingRequest::build("office", &closet, None);

        let err = provider.generate("gemini-2.0-flash", &request).err();
        let Some(AiError::Transport(message)) = err else {
            panic!("expected a transport error, got {err:?}");
        };
        assert!(message.starts_with("Gemini request failed"));
        assert!(!message.contains("SECRETKEY123"));
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate_text("abcdef", 3), "abc…");
        assert_eq!(truncate_text("abc", 3), "abc");
    }
}
