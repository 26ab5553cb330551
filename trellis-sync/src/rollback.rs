//! Restore a site to the state captured in a snapshot.
//!
//! The snapshot is the exact target state: the changeset engine diffs it
//! against the current remote in restore mode, so a description, thumbnail
//! type or top-level theme key the snapshot does not have is cleared. Only
//! what differs is written back, except the theme, which is overwritten in
//! full. Components created after the snapshot are left in place unless
//! `prune_created` is set.

use serde::Serialize;

use trellis_core::{RemoteState, SiteId};

use crate::apply::{apply_changeset, ApplyOptions, ApplyReport, ThemeWrite};
use crate::changeset::{compute_restore_changeset, Changeset, RemoteView};
use crate::error::SyncError;
use crate::orchestrator::fetch_remote_view;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackOptions {
    /// Delete components that exist now but are absent from the snapshot.
    pub prune_created: bool,
}

/// Counts of what a rollback restored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RollbackReport {
    pub theme_restored: bool,
    pub blocks_restored: usize,
    pub partials_restored: usize,
    /// Components deleted because they were created after the snapshot.
    pub removed: usize,
    /// Components created after the snapshot and left in place.
    pub kept_extra: usize,
}

impl From<&ApplyReport> for RollbackReport {
    fn from(report: &ApplyReport) -> Self {
        Self {
            theme_restored: !report.theme_keys.is_empty(),
            blocks_restored: report.blocks.created + report.blocks.updated,
            partials_restored: report.partials.created + report.partials.updated,
            removed: report.blocks.deleted + report.partials.deleted,
            kept_extra: report.skipped_deletes,
        }
    }
}

/// The changes a rollback to `snapshot` would make against the current remote.
pub fn plan_rollback(
    client: &dyn RemoteState,
    site: &SiteId,
    snapshot: &Snapshot,
) -> Result<Changeset, SyncError> {
    plan_against_current(client, site, snapshot).map(|(changeset, _)| changeset)
}

fn plan_against_current(
    client: &dyn RemoteState,
    site: &SiteId,
    snapshot: &Snapshot,
) -> Result<(Changeset, RemoteView), SyncError> {
    if snapshot.site_id != site.0 {
        return Err(SyncError::SiteMismatch {
            snapshot_site: snapshot.site_id.clone(),
            site: site.0.clone(),
        });
    }
    let current = fetch_remote_view(client, site)?;
    let changeset = compute_restore_changeset(&snapshot.as_local_theme(), &current);
    Ok((changeset, current))
}

/// Restore `site` to `snapshot`.
pub fn rollback_from_snapshot(
    client: &dyn RemoteState,
    site: &SiteId,
    snapshot: &Snapshot,
    options: RollbackOptions,
) -> Result<RollbackReport, SyncError> {
    let (changeset, current) = plan_against_current(client, site, snapshot)?;
    tracing::info!(
        "rolling back to snapshot captured {}: {}",
        snapshot.captured_at,
        changeset.summary()
    );

    let report = apply_changeset(
        client,
        site,
        &snapshot.as_local_theme(),
        &current.theme,
        &changeset,
        ApplyOptions {
            allow_delete: options.prune_created,
            theme: ThemeWrite::Full,
        },
    )?;
    Ok(RollbackReport::from(&report))
}
