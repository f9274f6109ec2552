use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use crate::closet::SyncState;
use crate::conversation::ConversationLog;

/// Mutable state owned by one chat session.
///
/// Each session gets its own copy; nothing here is shared across sessions.
#[derive(Debug, Clone)]
pub struct StylistSession {
    pub id: String,
    pub started_at: String,
    pub sync: SyncState,
    pub conversation: ConversationLog,
    /// Set once a missing-credentials sync failure has been shown to the user.
    pub unconfigured_notifier_reported: bool,
}

impl StylistSession {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            sync: SyncState::default(),
            conversation: ConversationLog::new(),
            unconfigured_notifier_reported: false,
        }
    }
}

impl Default for StylistSession {
    fn default() -> Self {
        Self::new()
    }
}
