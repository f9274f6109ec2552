use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Refresh,
    Manual,
}

/// Everything a stylist session writes to its journal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        started_at: String,
        model: String,
        providers: Vec<String>,
    },
    ClosetSyncSkipped {
        fingerprint: String,
        items: usize,
        trigger: SyncTrigger,
    },
    ClosetSynced {
        fingerprint: String,
        items: usize,
        trigger: SyncTrigger,
    },
    ClosetSyncFailed {
        fingerprint: String,
        items: usize,
        trigger: SyncTrigger,
        error: String,
    },
    ChatTurnStarted {
        model: String,
        prompt: String,
        closet_items: usize,
        face: bool,
    },
    ChatTurnCompleted {
        model: String,
        latency_s: f64,
        reply_chars: usize,
        messages: usize,
    },
    ChatTurnFailed {
        model: String,
        latency_s: f64,
        error: String,
        messages: usize,
    },
    HistoryCleared {
        cleared_messages: usize,
    },
    ModelSelected {
        model: String,
        provider: String,
        requested: Option<String>,
        fallback_reason: Option<String>,
    },
    SessionEnded {
        messages: usize,
        last_synced: Option<String>,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::ClosetSyncSkipped { .. } => "closet_sync_skipped",
            Self::ClosetSynced { .. } => "closet_synced",
            Self::ClosetSyncFailed { .. } => "closet_sync_failed",
            Self::ChatTurnStarted { .. } => "chat_turn_started",
            Self::ChatTurnCompleted { .. } => "chat_turn_completed",
            Self::ChatTurnFailed { .. } => "chat_turn_failed",
            Self::HistoryCleared { .. } => "history_cleared",
            Self::ModelSelected { .. } => "model_selected",
            Self::SessionEnded { .. } => "session_ended",
        }
    }
}

/// Session journal (`events.jsonl`), one compact JSON object per line.
///
/// Each line leads with `type`, `session_id` and `ts`; the event's own
/// fields follow. The file is opened on first write and kept open.
#[derive(Debug)]
pub struct EventWriter {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            file: Mutex::new(None),
        }
    }

    pub fn record(&self, event: &SessionEvent) -> anyhow::Result<Value> {
        let Value::Object(fields) = serde_json::to_value(event)? else {
            bail!("{} did not serialize to a JSON object", event.kind());
        };
        let mut line = Map::new();
        line.insert("type".to_string(), Value::from(event.kind()));
        line.insert("session_id".to_string(), Value::from(self.session_id.as_str()));
        line.insert("ts".to_string(), Value::from(now_utc_iso()));
        line.extend(fields.into_iter().filter(|(key, _)| key.as_str() != "type"));

        let text = serde_json::to_string(&line)?;
        let mut guard = self
            .file
            .lock()
            .map_err(|_| anyhow!("event journal lock poisoned"))?;
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{text}")
                .with_context(|| format!("failed writing {}", self.path.display()))?;
        }
        Ok(Value::Object(line))
    }

    fn open(&self) -> anyhow::Result<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed opening {}", self.path.display()))
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
