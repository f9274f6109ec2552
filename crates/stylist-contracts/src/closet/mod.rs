mod batch;
mod sync;

pub use batch::{fingerprint, Fingerprint, UploadBatch, UploadedFile};
pub use sync::{maybe_sync, sync_now, Notifier, SyncOutcome, SyncState};
