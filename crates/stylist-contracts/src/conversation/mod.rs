mod log;
mod request;

pub use log::{ConversationLog, Message, Role};
pub use request::{
    ContentPart, StylingRequest, FACE_ANALYSIS_INSTRUCTION, PERSONA_INSTRUCTION,
};
