//! Session error types

use thiserror::Error;

use super::report::ValidationError;
use crate::identity::IdentityError;
use crate::store::StoreError;
use crate::sync::SyncError;

/// Errors from planner session operations
///
/// Every one of these is also recorded as the visible error message.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Pick a date first")]
    NoDateSelected,

    #[error("Still connecting, try again in a moment")]
    NotReady,

    #[error("There is no plan for {0} to delete")]
    NoPlanToDelete(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Identity setup failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("Store setup failed: {0}")]
    Store(#[from] StoreError),
}
