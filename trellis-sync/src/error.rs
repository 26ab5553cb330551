//! Error types for trellis-sync.

use std::path::PathBuf;

use thiserror::Error;

use trellis_core::{RemoteError, ThemeError};

/// All errors that can arise from sync, snapshot, rollback, and pull.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading the local theme or configuration failed.
    #[error("theme error: {0}")]
    Theme(#[from] ThemeError),

    /// A read-only remote call (fetching site, blocks, or partials) failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error while writing a snapshot or pulled file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested snapshot file does not exist.
    #[error("snapshot not found at {path}")]
    SnapshotNotFound { path: PathBuf },

    /// The snapshot file exists but is not a valid snapshot.
    #[error("failed to parse snapshot {path}: {source}")]
    SnapshotParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A snapshot taken from one site was about to be restored onto another.
    #[error("snapshot belongs to site {snapshot_site}, not {site}")]
    SiteMismatch { snapshot_site: String, site: String },

    /// A mutating remote call failed; earlier steps stay applied.
    #[error("{step} failed: {source}")]
    Apply {
        step: String,
        #[source]
        source: RemoteError,
    },

    /// A mutating call failed during `sync --apply`; the pre-apply snapshot
    /// is the recovery point.
    #[error(
        "{step} failed: {source}; earlier changes were kept, restore with `trellis rollback --snapshot={}`",
        .snapshot.display()
    )]
    ApplyAborted {
        step: String,
        snapshot: PathBuf,
        #[source]
        source: RemoteError,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
