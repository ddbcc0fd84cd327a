//! Sync engine events and errors

use thiserror::Error;

use crate::domain::DayKey;
use crate::store::StoreError;

/// Errors from sync engine operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Could not subscribe to {collection}: {source}")]
    Subscribe {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("Could not save plan for {date_key}: {source}")]
    Write {
        write_id: u64,
        date_key: DayKey,
        #[source]
        source: StoreError,
    },

    #[error("Could not delete plan for {date_key}: {source}")]
    Delete {
        write_id: u64,
        date_key: DayKey,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    /// Id of the write this error belongs to, matching [`SyncEvent::WriteFailed`]
    pub fn write_id(&self) -> Option<u64> {
        match self {
            SyncError::Subscribe { .. } => None,
            SyncError::Write { write_id, .. } | SyncError::Delete { write_id, .. } => Some(*write_id),
        }
    }
}

/// Response from sync engine write operations
pub type SyncResponse<T> = Result<T, SyncError>;

/// Event broadcast when the mirror or the subscription changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A remote snapshot replaced the plan collection
    SnapshotApplied {
        revision: u64,
        plan_count: usize,
        /// Documents left out because they could not be decoded
        skipped: usize,
    },
    /// The subscription failed or was interrupted; the previous collection is kept
    SubscriptionFailed { message: String },
    /// The store stopped delivering updates; subscribe again to resume
    SubscriptionClosed,
    /// A write or delete was rejected
    WriteFailed {
        write_id: u64,
        date_key: DayKey,
        message: String,
    },
}
