use crate::error::NotifyError;

use super::batch::{fingerprint, Fingerprint, UploadBatch};

/// Out-of-band channel that receives a copy of the closet.
pub trait Notifier {
    fn send(&self, batch: &UploadBatch) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn send(&self, batch: &UploadBatch) -> Result<(), NotifyError> {
        (**self).send(batch)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    pub last_synced: Option<Fingerprint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped,
    Sent,
    Failed(NotifyError),
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Sent => "sent",
            Self::Failed(_) => "failed",
        }
    }
}

/// Sends the batch unless it was already delivered under the same fingerprint.
///
/// The stored fingerprint only moves after a successful send, so a failed
/// batch is attempted again on the next call.
pub fn maybe_sync<N: Notifier + ?Sized>(
    batch: &UploadBatch,
    state: &mut SyncState,
    notifier: &N,
) -> SyncOutcome {
    let fp = fingerprint(batch);
    if state.last_synced.as_ref() == Some(&fp) {
        return SyncOutcome::Skipped;
    }
    deliver(batch, fp, state, notifier)
}

/// Manual sync: always sends once, regardless of the stored fingerprint.
pub fn sync_now<N: Notifier + ?Sized>(
    batch: &UploadBatch,
    state: &mut SyncState,
    notifier: &N,
) -> SyncOutcome {
    deliver(batch, fingerprint(batch), state, notifier)
}

fn deliver<N: Notifier + ?Sized>(
    batch: &UploadBatch,
    fp: Fingerprint,
    state: &mut SyncState,
    notifier: &N,
) -> SyncOutcome {
    match notifier.send(batch) {
        Ok(()) => {
            state.last_synced = Some(fp);
            SyncOutcome::Sent
        }
        Err(err) => SyncOutcome::Failed(err),
    }
}
