//! Plan Store Sync Engine
//!
//! Keeps a [`PlanCollection`](crate::domain::PlanCollection) mirroring the
//! remote collection and mediates every write to it. The mirror changes only
//! when the store pushes a snapshot; writes are never applied locally first.

mod engine;
mod messages;

pub use engine::SyncEngine;
pub use messages::{SyncError, SyncEvent, SyncResponse};
