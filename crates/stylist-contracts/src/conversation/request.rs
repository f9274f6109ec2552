use crate::closet::UploadedFile;

pub const PERSONA_INSTRUCTION: &str = "You are a fashion expert and editor. Based ONLY on the \
clothing items in these images, create a stylish outfit for the user's request. Refer to the \
pieces you pick by what they are and explain briefly why they work together.";

pub const FACE_ANALYSIS_INSTRUCTION: &str = "The first image is a selfie of the user. Analyze \
their skin tone and undertone, then harmonize the suggested colors and pieces with it.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart<'a> {
    Image(&'a UploadedFile),
    Text(String),
}

/// One multimodal call: ordered parts plus the system instruction.
///
/// Part order is face (when given), then the closet in upload order, then the
/// prompt as the final text part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylingRequest<'a> {
    pub parts: Vec<ContentPart<'a>>,
    pub system_instruction: String,
}

impl<'a> StylingRequest<'a> {
    pub fn build(
        prompt: &str,
        closet: &'a [UploadedFile],
        face: Option<&'a UploadedFile>,
    ) -> Self {
        let mut system_instruction = PERSONA_INSTRUCTION.to_string();
        let mut parts = Vec::with_capacity(closet.len() + 2);
        if let Some(face) = face {
            parts.push(ContentPart::Image(face));
            system_instruction.push(' ');
            system_instruction.push_str(FACE_ANALYSIS_INSTRUCTION);
        }
        parts.extend(closet.iter().map(ContentPart::Image));
        parts.push(ContentPart::Text(prompt.to_string()));
        Self {
            parts,
            system_instruction,
        }
    }

    pub fn images(&self) -> impl Iterator<Item = &'a UploadedFile> + '_ {
        self.parts.iter().filter_map(|part| match part {
            ContentPart::Image(file) => Some(*file),
            ContentPart::Text(_) => None,
        })
    }

    pub fn prompt(&self) -> &str {
        self.parts
            .iter()
            .rev()
            .find_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::Image(_) => None,
            })
            .unwrap_or("")
    }

    pub fn has_face_analysis(&self) -> bool {
        self.system_instruction.contains(FACE_ANALYSIS_INSTRUCTION)
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentPart, StylingRequest, FACE_ANALYSIS_INSTRUCTION, PERSONA_INSTRUCTION};
    use crate::closet::UploadedFile;

    fn file(name: &str) -> UploadedFile {
        UploadedFile::new(name, vec![0x89, b'P', b'N', b'G'], "png")
    }

    #[test]
    fn closet_only_request_has_images_then_prompt() {
        let closet = vec![file("shirt.png"), file("pants.png")];
        let request = StylingRequest::build("business meeting", &closet, None);

        assert_eq!(request.system_instruction, PERSONA_INSTRUCTION);
        assert!(!request.has_face_analysis());
        assert_eq!(
            request.parts,
            vec![
                ContentPart::Image(&closet[0]),
                ContentPart::Image(&closet[1]),
                ContentPart::Text("business meeting".to_string()),
            ]
        );
        assert_eq!(request.prompt(), "business meeting");
    }

    #[test]
    fn face_goes_first_and_extends_instruction() {
        let closet = vec![file("shirt.png")];
        let face = file("me.png");
        let request = StylingRequest::build("date night", &closet, Some(&face));

        assert_eq!(request.parts.first(), Some(&ContentPart::Image(&face)));
        assert_eq!(request.parts.len(), 3);
        assert!(request.system_instruction.starts_with(PERSONA_INSTRUCTION));
        assert!(request
            .system_instruction
            .contains(FACE_ANALYSIS_INSTRUCTION));
        let names: Vec<&str> = request.images().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["me.png", "shirt.png"]);
    }

    #[test]
    fn empty_closet_still_carries_prompt() {
        let request = StylingRequest::build("anything casual", &[], None);
        assert_eq!(
            request.parts,
            vec![ContentPart::Text("anything casual".to_string())]
        );
    }
}
