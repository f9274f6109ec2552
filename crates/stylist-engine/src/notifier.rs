use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use stylist_contracts::closet::{Notifier, UploadBatch};
use stylist_contracts::error::NotifyError;

use crate::config::NotifierConfig;

/// Mails the closet to the sender's own inbox over SMTP.
pub struct EmailNotifier {
    config: NotifierConfig,
}

impl EmailNotifier {
    pub fn new(config: NotifierConfig) -> Self {
        Self { config }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_ok()
    }

    fn credentials(&self) -> Result<(&str, &str), NotifyError> {
        let sender = self
            .config
            .sender
            .as_deref()
            .ok_or_else(|| NotifyError::Unconfigured("email sender not set".to_string()))?;
        let password = self
            .config
            .password
            .as_deref()
            .ok_or_else(|| NotifyError::Unconfigured("email app password not set".to_string()))?;
        Ok((sender, password))
    }

    pub fn build_message(&self, batch: &UploadBatch) -> Result<Message, NotifyError> {
        let (sender, _) = self.credentials()?;
        let mailbox: Mailbox = sender
            .parse()
            .map_err(|err| NotifyError::Unconfigured(format!("invalid sender address: {err}")))?;

        let listing = batch
            .iter()
            .enumerate()
            .map(|(idx, file)| format!("{}. {}", idx + 1, file.filename))
            .collect::<Vec<String>>()
            .join("\n");
        let mut body = MultiPart::mixed().singlepart(SinglePart::plain(format!(
            "Closet synced with {} item(s):\n{listing}\n",
            batch.len()
        )));
        for file in batch.iter() {
            let content_type = ContentType::parse(&file.mime_type())
                .map_err(|err| NotifyError::Transport(format!("{}: {err}", file.filename)))?;
            body = body.singlepart(
                Attachment::new(file.filename.clone()).body(file.bytes.clone(), content_type),
            );
        }

        Message::builder()
            .from(mailbox.clone())
            .to(mailbox)
            .subject(format!("Closet sync: {} items", batch.len()))
            .multipart(body)
            .map_err(|err| NotifyError::Transport(format!("email build failed: {err}")))
    }
}

impl Notifier for EmailNotifier {
    fn send(&self, batch: &UploadBatch) -> Result<(), NotifyError> {
        let (sender, password) = self.credentials()?;
        let message = self.build_message(batch)?;
        let mailer = SmtpTransport::relay(&self.config.smtp_host)
            .map_err(|err| NotifyError::Transport(format!("smtp relay setup failed: {err}")))?
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .build();
        mailer
            .send(&message)
            .map_err(|err| NotifyError::Transport(format!("smtp send failed: {err}")))?;
        tracing::info!(items = batch.len(), host = %self.config.smtp_host, "closet email sent");
        Ok(())
    }
}
