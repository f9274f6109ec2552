use stylist_contracts::closet::UploadedFile;
use stylist_contracts::conversation::{ConversationLog, StylingRequest};
use stylist_contracts::error::AiError;

use crate::providers::{GenerateResponse, StylistProvider};

/// Runs one chat turn against `provider`.
///
/// The user message is logged before the call. On failure no assistant
/// message is added, leaving the log on an unanswered user turn.
pub fn handle_turn(
    log: &mut ConversationLog,
    prompt: &str,
    closet: &[UploadedFile],
    face: Option<&UploadedFile>,
    model: &str,
    provider: &dyn StylistProvider,
) -> Result<GenerateResponse, AiError> {
    log.push_user(prompt);
    let request = StylingRequest::build(prompt, closet, face);
    let response = provider.generate(model, &request)?;
    log.push_assistant(response.text.clone());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::Map;
    use stylist_contracts::closet::UploadedFile;
    use stylist_contracts::conversation::{
        ContentPart, ConversationLog, Role, StylingRequest, FACE_ANALYSIS_INSTRUCTION,
    };
    use stylist_contracts::error::AiError;

    use super::handle_turn;
    use crate::providers::{GenerateResponse, StylistProvider};

    #[derive(Debug, Clone)]
    struct Captured {
        model: String,
        image_names: Vec<String>,
        first_is_face: bool,
        system_instruction: String,
        prompt: String,
    }

    struct ScriptedProvider {
        fail_with: Option<AiError>,
        calls: Mutex<Vec<Captured>>,
    }

    impl ScriptedProvider {
        fn ok() -> Self {
            Self {
                fail_with: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: AiError) -> Self {
            Self {
                fail_with: Some(err),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn captured(&self) -> Vec<Captured> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    impl StylistProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate(
            &self,
            model: &str,
            request: &StylingRequest<'_>,
        ) -> Result<GenerateResponse, AiError> {
            let captured = Captured {
                model: model.to_string(),
                image_names: request.images().map(|f| f.filename.clone()).collect(),
                first_is_face: matches!(
                    request.parts.first(),
                    Some(ContentPart::Image(file)) if file.filename == "selfie.jpg"
                ),
                system_instruction: request.system_instruction.clone(),
                prompt: request.prompt().to_string(),
            };
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(captured);
            }
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            Ok(GenerateResponse {
                text: format!("look for {}", request.prompt()),
                provider_response: Map::new(),
            })
        }
    }

    fn closet() -> Vec<UploadedFile> {
        vec![
            UploadedFile::new("shirt.jpg", vec![1], "jpeg"),
            UploadedFile::new("pants.jpg", vec![2], "jpeg"),
        ]
    }

    #[test]
    fn successful_turns_alternate_user_and_assistant() -> anyhow::Result<()> {
        let provider = ScriptedProvider::ok();
        let closet = closet();
        let mut log = ConversationLog::new();

        for prompt in ["business meeting", "weekend brunch", "gallery opening"] {
            handle_turn(&mut log, prompt, &closet, None, "gemini-2.0-flash", &provider)?;
        }

        assert_eq!(log.len(), 6);
        for (idx, message) in log.messages().iter().enumerate() {
            let expected = if idx % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(message.role, expected);
        }
        assert_eq!(log.messages()[2].content, "weekend brunch");
        assert_eq!(log.messages()[3].content, "look for weekend brunch");
        Ok(())
    }

    #[test]
    fn failed_call_keeps_user_turn_only() {
        let provider = ScriptedProvider::failing(AiError::ModelNotFound {
            model: "gemini-1.5-flash".to_string(),
        });
        let mut log = ConversationLog::new();

        let result = handle_turn(
            &mut log,
            "business meeting",
            &closet(),
            None,
            "gemini-1.5-flash",
            &provider,
        );

        assert!(matches!(result, Err(AiError::ModelNotFound { .. })));
        assert_eq!(log.len(), 1);
        assert_eq!(log.len() % 2, 1);
        assert!(log.awaiting_reply());
        assert_eq!(log.messages()[0].content, "business meeting");
    }

    #[test]
    fn face_image_leads_and_adds_skin_tone_clause() -> anyhow::Result<()> {
        let provider = ScriptedProvider::ok();
        let face = UploadedFile::new("selfie.jpg", vec![9], "jpeg");
        let mut log = ConversationLog::new();

        handle_turn(
            &mut log,
            "date night",
            &closet(),
            Some(&face),
            "gemini-2.5-flash",
            &provider,
        )?;

        let calls = provider.captured();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "gemini-2.5-flash");
        assert!(calls[0].first_is_face);
        assert_eq!(
            calls[0].image_names,
            vec!["selfie.jpg", "shirt.jpg", "pants.jpg"]
        );
        assert!(calls[0].system_instruction.contains(FACE_ANALYSIS_INSTRUCTION));
        assert_eq!(calls[0].prompt, "date night");
        Ok(())
    }

    #[test]
    fn no_face_means_no_skin_tone_clause() -> anyhow::Result<()> {
        let provider = ScriptedProvider::ok();
        let mut log = ConversationLog::new();

        handle_turn(&mut log, "office", &closet(), None, "gemini-2.0-flash", &provider)?;

        let calls = provider.captured();
        assert!(!calls[0].first_is_face);
        assert!(!calls[0].system_instruction.contains(FACE_ANALYSIS_INSTRUCTION));
        assert_eq!(calls[0].image_names, vec!["shirt.jpg", "pants.jpg"]);
        Ok(())
    }
}
