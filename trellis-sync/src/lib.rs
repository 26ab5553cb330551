//! # trellis-sync
//!
//! Changeset engine, snapshot store, and sync orchestration.
//!
//! Call [`run_sync`] to preview (and optionally apply) a theme against a
//! site, [`rollback_from_snapshot`] to restore a captured state, or [`pull`]
//! to write remote state into the local layout.

pub mod apply;
pub mod changeset;
pub mod diff;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod pull;
pub mod rollback;
pub mod snapshot;

pub use apply::{ApplyReport, KindCounts};
pub use changeset::{
    compute_changeset, ChangeSummary, Changeset, ComponentChange, Property, RemoteView,
    ThemeFieldChange,
};
pub use error::SyncError;
pub use orchestrator::{fetch_remote_view, run_sync, Confirm, Preview, SyncOptions, SyncOutcome};
pub use pull::{pull, PullReport, WriteResult};
pub use rollback::{plan_rollback, rollback_from_snapshot, RollbackOptions, RollbackReport};
pub use snapshot::{list_snapshots, load_snapshot, prune_snapshots, save_snapshot, Snapshot};
