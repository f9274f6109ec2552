use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use stylist_contracts::closet::{
    fingerprint, maybe_sync, sync_now, Notifier, SyncOutcome, UploadBatch, UploadedFile,
};
use stylist_contracts::conversation::ConversationLog;
use stylist_contracts::error::{AiError, ConfigArea, NotifyError, StylistError};
use stylist_contracts::events::{EventWriter, SessionEvent, SyncTrigger};
use stylist_contracts::models::{ModelRegistry, ModelSelection, ModelSelector, ModelSpec, VISION};
use stylist_contracts::session::StylistSession;

pub mod config;
pub mod controller;
pub mod gemini;
pub mod notifier;
pub mod providers;
pub mod uploads;

use config::StylistConfig;
use controller::handle_turn;
use gemini::GeminiProvider;
use notifier::EmailNotifier;
use providers::{DryrunProvider, ProviderRegistry};

fn default_provider_registry(config: &StylistConfig) -> ProviderRegistry {
    let mut providers = ProviderRegistry::new();
    providers.register(DryrunProvider);
    providers.register(GeminiProvider::new(
        config.api_key.clone(),
        config.api_base.clone(),
        config.request_timeout_s,
    ));
    providers
}

/// Outcome of one sync attempt, plus whether the user has already heard about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// Set for a missing-credentials failure this session already reported.
    pub repeat: bool,
}

impl SyncReport {
    fn fresh(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            repeat: false,
        }
    }
}

/// Request handler for one stylist session.
///
/// Each UI action maps to one method call. `refresh` stands in for a
/// re-render and must run before every action so the closet sync keeps up.
pub struct StylistEngine {
    config: StylistConfig,
    session: StylistSession,
    events: EventWriter,
    models: ModelSelector,
    providers: ProviderRegistry,
    notifier: Box<dyn Notifier>,
    closet: UploadBatch,
    face: Option<UploadedFile>,
}

impl StylistEngine {
    pub fn new(config: StylistConfig, events_path: impl Into<PathBuf>) -> Result<Self> {
        let providers = default_provider_registry(&config);
        let notifier = Box::new(EmailNotifier::new(config.notifier.clone()));
        Self::with_parts(config, events_path, providers, notifier)
    }

    pub fn with_parts(
        config: StylistConfig,
        events_path: impl Into<PathBuf>,
        providers: ProviderRegistry,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self> {
        let session = StylistSession::new();
        let events = EventWriter::new(events_path.into(), session.id.clone());
        let mut models = ModelSelector::new(ModelRegistry::new(None), VISION)?;
        let selection = models.select(Some(config.model.as_str()));

        events.record(&SessionEvent::SessionStarted {
            started_at: session.started_at.clone(),
            model: selection.model.name.clone(),
            providers: providers.names(),
        })?;

        let engine = Self {
            config,
            session,
            events,
            models,
            providers,
            notifier,
            closet: UploadBatch::default(),
            face: None,
        };
        if selection.fallback.is_some() {
            engine.record_model_selection(&selection);
        }
        Ok(engine)
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.session.conversation
    }

    pub fn closet(&self) -> &UploadBatch {
        &self.closet
    }

    pub fn face(&self) -> Option<&UploadedFile> {
        self.face.as_ref()
    }

    pub fn model(&self) -> &ModelSpec {
        self.models.current()
    }

    pub fn models(&self) -> Vec<ModelSpec> {
        self.models.allowed()
    }

    /// Replaces the closet with whatever the uploader reports now.
    pub fn set_closet(&mut self, batch: UploadBatch) {
        self.closet = batch;
    }

    pub fn set_face(&mut self, face: Option<UploadedFile>) {
        self.face = face;
    }

    pub fn set_model(&mut self, requested: &str) -> ModelSelection {
        let selection = self.models.select(Some(requested));
        self.record_model_selection(&selection);
        selection
    }

    pub fn set_api_key(&mut self, api_key: &str) {
        self.config.api_key = Some(api_key.trim().to_string()).filter(|key| !key.is_empty());
        self.providers.register(GeminiProvider::new(
            self.config.api_key.clone(),
            self.config.api_base.clone(),
            self.config.request_timeout_s,
        ));
    }

    /// One re-render: syncs the closet unless this exact batch already went out.
    pub fn refresh(&mut self) -> SyncReport {
        if self.closet.is_empty() {
            return SyncReport::fresh(SyncOutcome::Skipped);
        }
        let outcome = maybe_sync(&self.closet, &mut self.session.sync, self.notifier.as_ref());
        self.record_sync(outcome, SyncTrigger::Refresh)
    }

    /// Manual sync action; sends even when the batch was already delivered.
    pub fn sync_now(&mut self) -> SyncReport {
        if self.closet.is_empty() {
            return SyncReport::fresh(SyncOutcome::Skipped);
        }
        let outcome = sync_now(&self.closet, &mut self.session.sync, self.notifier.as_ref());
        self.record_sync(outcome, SyncTrigger::Manual)
    }

    /// Runs one chat turn and returns the stylist's reply.
    ///
    /// A provider without credentials stops here and leaves the log alone.
    /// Any later failure leaves the user's message in the log unanswered.
    pub fn chat(&mut self, prompt: &str) -> Result<String, StylistError> {
        let model = self.models.current().clone();
        let provider = self.providers.get(&model.provider).ok_or_else(|| {
            StylistError::configuration(
                ConfigArea::Models,
                format!("no provider registered for '{}'", model.provider),
            )
        })?;
        provider
            .ready()
            .map_err(|err| StylistError::from_ai(err, None))?;

        self.record(&SessionEvent::ChatTurnStarted {
            model: model.name.clone(),
            prompt: prompt.to_string(),
            closet_items: self.closet.len(),
            face: self.face.is_some(),
        });
        let started = Instant::now();
        let result = handle_turn(
            &mut self.session.conversation,
            prompt,
            self.closet.files(),
            self.face.as_ref(),
            &model.name,
            provider,
        );
        let latency_s = started.elapsed().as_secs_f64();

        match result {
            Ok(response) => {
                self.record(&SessionEvent::ChatTurnCompleted {
                    model: model.name,
                    latency_s,
                    reply_chars: response.text.chars().count(),
                    messages: self.session.conversation.len(),
                });
                Ok(response.text)
            }
            Err(err) => {
                let suggestion = match &err {
                    AiError::ModelNotFound { model } => self.models.alternative_to(model),
                    _ => None,
                };
                tracing::warn!(model = %model.name, error = %err, "chat turn failed");
                self.record(&SessionEvent::ChatTurnFailed {
                    model: model.name,
                    latency_s,
                    error: err.to_string(),
                    messages: self.session.conversation.len(),
                });
                Err(StylistError::from_ai(err, suggestion))
            }
        }
    }

    pub fn clear_history(&mut self) {
        let cleared_messages = self.session.conversation.len();
        self.session.conversation.clear();
        self.record(&SessionEvent::HistoryCleared { cleared_messages });
    }

    /// Ends the session and writes the closing journal entry.
    pub fn finish(self) -> Result<()> {
        self.events.record(&SessionEvent::SessionEnded {
            messages: self.session.conversation.len(),
            last_synced: self
                .session
                .sync
                .last_synced
                .as_ref()
                .map(|fp| fp.to_string()),
        })?;
        Ok(())
    }

    /// Journals a sync outcome. Missing credentials are reported once per
    /// session on refresh; the send is still attempted every time.
    fn record_sync(&mut self, outcome: SyncOutcome, trigger: SyncTrigger) -> SyncReport {
        let repeat = match &outcome {
            SyncOutcome::Failed(NotifyError::Unconfigured(_)) => {
                let seen = self.session.unconfigured_notifier_reported;
                self.session.unconfigured_notifier_reported = true;
                seen && trigger == SyncTrigger::Refresh
            }
            SyncOutcome::Sent => {
                self.session.unconfigured_notifier_reported = false;
                false
            }
            _ => false,
        };
        if repeat {
            return SyncReport { outcome, repeat };
        }

        let fingerprint = fingerprint(&self.closet).to_string();
        let items = self.closet.len();
        let event = match &outcome {
            SyncOutcome::Skipped => SessionEvent::ClosetSyncSkipped {
                fingerprint,
                items,
                trigger,
            },
            SyncOutcome::Sent => {
                tracing::info!(%fingerprint, ?trigger, "closet synced");
                SessionEvent::ClosetSynced {
                    fingerprint,
                    items,
                    trigger,
                }
            }
            SyncOutcome::Failed(err) => {
                tracing::warn!(%fingerprint, ?trigger, error = %err, "closet sync failed");
                SessionEvent::ClosetSyncFailed {
                    fingerprint,
                    items,
                    trigger,
                    error: err.to_string(),
                }
            }
        };
        self.record(&event);
        SyncReport { outcome, repeat }
    }

    fn record_model_selection(&self, selection: &ModelSelection) {
        if let Some(fallback) = &selection.fallback {
            tracing::warn!(reason = %fallback, model = %selection.model.name, "model fallback");
        }
        self.record(&SessionEvent::ModelSelected {
            model: selection.model.name.clone(),
            provider: selection.model.provider.clone(),
            requested: selection.requested().map(str::to_string),
            fallback_reason: selection.fallback.as_ref().map(ToString::to_string),
        });
    }

    /// Journal writes never abort an action; failures are only logged.
    fn record(&self, event: &SessionEvent) {
        if let Err(err) = self.events.record(event) {
            tracing::warn!(event = event.kind(), error = %err, "event journal write failed");
        }
    }
}
