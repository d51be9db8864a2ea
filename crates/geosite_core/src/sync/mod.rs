//! Reconciliation of optimistic marker edits with persistence responses.

pub mod marker_sync;
pub mod reposition;

pub use marker_sync::{MarkerSyncEngine, SyncError, SyncOutcome, UpdateTicket};
pub use reposition::{
    recalculate_items, recalculated_bundle, reposition_project, RecalculationReport,
};
