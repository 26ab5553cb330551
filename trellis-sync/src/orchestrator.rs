//! Sync orchestration: preview → confirm → re-diff → snapshot → apply.
//!
//! The preview is computed once against the remote as first fetched. An
//! applying run fetches again after confirmation and re-plans against that
//! fresh state, so edits other operators made while the prompt was open are
//! neither clobbered nor lost. The snapshot of the fresh state is written
//! before the first mutating call.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use trellis_core::{local::read_local_theme, LocalTheme, RemoteState, SiteId};

use crate::apply::{apply_changeset, ApplyOptions, ApplyReport, ThemeWrite};
use crate::changeset::{compute_changeset, Changeset, RemoteView};
use crate::error::SyncError;
use crate::snapshot::{save_snapshot, Snapshot};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the operator is shown before anything happens.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub local: LocalTheme,
    pub remote: RemoteView,
    pub changeset: Changeset,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Without this the run stops after the preview.
    pub apply: bool,
    /// Apply deletes of remote-only components.
    pub allow_delete: bool,
    /// Restrict the run to these component names / theme keys.
    pub only: Option<Vec<String>>,
}

/// Operator confirmation between preview and apply.
pub trait Confirm {
    fn confirm(&mut self, preview: &Preview, allow_delete: bool) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&Preview, bool) -> bool,
{
    fn confirm(&mut self, preview: &Preview, allow_delete: bool) -> bool {
        self(preview, allow_delete)
    }
}

/// How a sync run ended.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Preview only; nothing was sent.
    DryRun(Preview),
    /// The preview had nothing to apply.
    NothingToDo(Preview),
    /// The operator declined; nothing was written or sent.
    Aborted(Preview),
    /// Applied the recomputed changeset.
    Applied {
        preview: Preview,
        /// The changeset actually applied, recomputed after confirmation.
        applied: Changeset,
        /// `None` when the recomputed changeset had nothing to apply.
        snapshot: Option<PathBuf>,
        report: ApplyReport,
        /// Whether the recomputed changeset differed from the preview.
        drifted: bool,
    },
}

// ---------------------------------------------------------------------------
// Remote fetch
// ---------------------------------------------------------------------------

/// Fetch the site theme, blocks, and partials.
pub fn fetch_remote_view(client: &dyn RemoteState, site: &SiteId) -> Result<RemoteView, SyncError> {
    tracing::debug!("fetching remote state for site {site}");
    let theme = client.get_site(site)?.theme;
    let blocks = client.get_blocks(site)?;
    let partials = client.get_partials(site)?;
    tracing::debug!(
        "remote has {} block(s), {} partial(s)",
        blocks.len(),
        partials.len()
    );
    Ok(RemoteView {
        theme,
        blocks,
        partials,
    })
}

fn plan(local: &LocalTheme, remote: &RemoteView, only: Option<&[String]>) -> Changeset {
    let changeset = compute_changeset(local, remote);
    match only {
        Some(names) => changeset.filter_only(names),
        None => changeset,
    }
}

/// Read the local theme, fetch the remote, and compute the (filtered) changeset.
pub fn preview(
    client: &dyn RemoteState,
    site: &SiteId,
    theme_dir: &Path,
    only: Option<&[String]>,
) -> Result<Preview, SyncError> {
    let local = read_local_theme(theme_dir)?;
    let remote = fetch_remote_view(client, site)?;
    let changeset = plan(&local, &remote, only);
    Ok(Preview {
        local,
        remote,
        changeset,
    })
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Run one sync of `theme_dir` against `site`.
pub fn run_sync(
    client: &dyn RemoteState,
    site: &SiteId,
    theme_dir: &Path,
    options: &SyncOptions,
    confirm: &mut impl Confirm,
) -> Result<SyncOutcome, SyncError> {
    let only = options.only.as_deref();
    let preview = preview(client, site, theme_dir, only)?;
    tracing::info!("preview: {}", preview.changeset.summary());

    if !options.apply {
        return Ok(SyncOutcome::DryRun(preview));
    }
    if preview.changeset.is_noop(options.allow_delete) {
        return Ok(SyncOutcome::NothingToDo(preview));
    }
    if !confirm.confirm(&preview, options.allow_delete) {
        tracing::info!("sync aborted by operator");
        return Ok(SyncOutcome::Aborted(preview));
    }

    let fresh = fetch_remote_view(client, site)?;
    let applied = plan(&preview.local, &fresh, only);
    let drifted = applied != preview.changeset;
    if drifted {
        tracing::warn!(
            "remote changed since preview ({}); applying the recomputed plan: {}",
            describe_drift(&preview.changeset, &applied).join(", "),
            applied.summary()
        );
    }

    if applied.is_noop(options.allow_delete) {
        return Ok(SyncOutcome::Applied {
            preview,
            applied,
            snapshot: None,
            report: ApplyReport::default(),
            drifted,
        });
    }

    let snapshot_path = save_snapshot(theme_dir, &Snapshot::capture(site, &fresh))?;
    let apply_options = ApplyOptions {
        allow_delete: options.allow_delete,
        theme: ThemeWrite::ChangedKeys,
    };
    let report = apply_changeset(
        client,
        site,
        &preview.local,
        &fresh.theme,
        &applied,
        apply_options,
    )
    .map_err(|err| with_snapshot(err, &snapshot_path))?;

    Ok(SyncOutcome::Applied {
        preview,
        applied,
        snapshot: Some(snapshot_path),
        report,
        drifted,
    })
}

fn with_snapshot(err: SyncError, snapshot: &Path) -> SyncError {
    match err {
        SyncError::Apply { step, source } => SyncError::ApplyAborted {
            step,
            snapshot: snapshot.to_path_buf(),
            source,
        },
        other => other,
    }
}

/// Labels of the changes present in only one of the two changesets.
fn describe_drift(before: &Changeset, after: &Changeset) -> Vec<String> {
    let mut labels = BTreeSet::new();
    for (kind, a, b) in [
        ("block", &before.blocks, &after.blocks),
        ("partial", &before.partials, &after.partials),
    ] {
        for change in a.iter().filter(|c| !b.contains(c)) {
            labels.insert(format!("{kind} '{}'", change.name()));
        }
        for change in b.iter().filter(|c| !a.contains(c)) {
            labels.insert(format!("{kind} '{}'", change.name()));
        }
    }
    let (a, b) = (&before.theme_changes, &after.theme_changes);
    for change in a.iter().filter(|c| !b.contains(c)) {
        labels.insert(format!("theme '{}'", change.path));
    }
    for change in b.iter().filter(|c| !a.contains(c)) {
        labels.insert(format!("theme '{}'", change.path));
    }
    labels.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::ComponentChange;
    use crate::snapshot::{list_snapshots, load_snapshot};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;
    use trellis_core::{Field, FieldType, MemoryRemote, RemoteBlock, RemoteCall, Site};

    const SITE: &str = "s1";

    fn site() -> Site {
        Site {
            id: SITE.into(),
            name: Some("Aurora".into()),
            theme: json!({"colors": {"primary": "#000"}}).as_object().cloned().unwrap(),
        }
    }

    fn remote_block(id: &str, name: &str, template: &str) -> RemoteBlock {
        RemoteBlock {
            id: id.into(),
            name: name.into(),
            template: template.into(),
            fields: vec![Field::new(FieldType::Text, "title")],
            description: None,
            thumbnail_type: None,
        }
    }

    /// Theme dir with blocks `Hero` (edited) and `Cards` (new), plus a theme tweak.
    fn theme_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        let blocks = dir.path().join("converted/blocks");
        fs::create_dir_all(&blocks).unwrap();
        for (name, template) in [("Hero", "<h1>new</h1>"), ("Cards", "<ul></ul>")] {
            fs::write(blocks.join(format!("{name}.html")), template).unwrap();
            fs::write(
                blocks.join(format!("{name}.json")),
                r#"{"fields":[{"type":"text","name":"title","value":"","config":{}}]}"#,
            )
            .unwrap();
        }
        fs::write(
            dir.path().join("theme.json"),
            r##"{"colors": {"primary": "#fff"}}"##,
        )
        .unwrap();
        dir
    }

    fn remote() -> MemoryRemote {
        MemoryRemote::new(site()).with_blocks(vec![
            remote_block("b1", "Hero", "<h1>old</h1>"),
            remote_block("b2", "Legacy", "<p>"),
        ])
    }

    fn applying(allow_delete: bool) -> SyncOptions {
        SyncOptions {
            apply: true,
            allow_delete,
            only: None,
        }
    }

    fn yes() -> impl FnMut(&Preview, bool) -> bool {
        |_: &Preview, _: bool| true
    }

    #[test]
    fn dry_run_issues_no_mutating_call() {
        let dir = theme_dir();
        let remote = remote();
        let mut confirm = |_: &Preview, _: bool| -> bool { panic!("dry run must not prompt") };

        let outcome = run_sync(
            &remote,
            &SiteId::from(SITE),
            dir.path(),
            &SyncOptions::default(),
            &mut confirm,
        )
        .unwrap();

        let preview = match outcome {
            SyncOutcome::DryRun(preview) => preview,
            other => panic!("expected dry run, got {other:?}"),
        };
        assert_eq!(preview.changeset.summary().creates, 1);
        assert!(remote.calls().is_empty());
        assert!(list_snapshots(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn abort_writes_nothing() {
        let dir = theme_dir();
        let remote = remote();
        let mut confirm = |_: &Preview, _: bool| false;

        let outcome =
            run_sync(&remote, &SiteId::from(SITE), dir.path(), &applying(true), &mut confirm)
                .unwrap();

        assert!(matches!(outcome, SyncOutcome::Aborted(_)));
        assert!(remote.calls().is_empty());
        assert!(list_snapshots(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn apply_snapshots_then_mutates_in_order() {
        let dir = theme_dir();
        let remote = remote();

        let outcome =
            run_sync(&remote, &SiteId::from(SITE), dir.path(), &applying(true), &mut yes())
                .unwrap();

        let (snapshot, drifted, report) = match outcome {
            SyncOutcome::Applied { snapshot, drifted, report, .. } => (snapshot, drifted, report),
            other => panic!("expected apply, got {other:?}"),
        };
        assert!(!drifted);
        assert_eq!(report.total_calls(), 4);

        let saved = load_snapshot(dir.path(), &snapshot.unwrap().to_string_lossy()).unwrap();
        assert_eq!(saved.blocks.len(), 2, "snapshot holds the pre-apply state");
        assert_eq!(saved.theme["colors"]["primary"], "#000");

        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::UpdateTheme { keys: vec!["colors".into()] },
                RemoteCall::CreateBlock { name: "Cards".into() },
                RemoteCall::UpdateBlock {
                    id: "b1".into(),
                    properties: vec!["template".into()]
                },
                RemoteCall::DeleteBlock { id: "b2".into() },
            ]
        );
    }

    #[test]
    fn rerun_after_apply_converges() {
        let dir = theme_dir();
        let remote = remote();
        let site = SiteId::from(SITE);
        run_sync(&remote, &site, dir.path(), &applying(true), &mut yes()).unwrap();

        let outcome = run_sync(&remote, &site, dir.path(), &applying(true), &mut yes()).unwrap();
        assert!(matches!(outcome, SyncOutcome::NothingToDo(_)), "got {outcome:?}");
        assert_eq!(list_snapshots(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_edit_is_replanned_not_clobbered() {
        let dir = theme_dir();
        let remote = remote();
        let other_editor = remote.clone();
        let mut confirm = move |_: &Preview, _: bool| {
            // Someone else creates Cards and fixes Hero while the prompt is open.
            let mut state = other_editor.state();
            state.blocks.push(remote_block("b9", "Cards", "<ul>"));
            state.blocks[0].template = "<h1>new</h1>".into();
            true
        };

        let outcome =
            run_sync(&remote, &SiteId::from(SITE), dir.path(), &applying(false), &mut confirm)
                .unwrap();

        let (preview, applied, drifted) = match outcome {
            SyncOutcome::Applied { preview, applied, drifted, .. } => (preview, applied, drifted),
            other => panic!("expected apply, got {other:?}"),
        };
        assert!(drifted);
        assert_ne!(preview.changeset, applied);
        assert!(applied
            .blocks
            .iter()
            .all(|c| matches!(c, ComponentChange::Delete { .. })));
        assert_eq!(
            remote.calls(),
            vec![RemoteCall::UpdateTheme { keys: vec!["colors".into()] }],
            "no create or update for blocks fixed concurrently"
        );
    }

    #[test]
    fn failure_mid_apply_names_the_snapshot() {
        let dir = theme_dir();
        let remote = remote();
        remote.state().fail_at_call = Some(1);

        let err = run_sync(&remote, &SiteId::from(SITE), dir.path(), &applying(false), &mut yes())
            .unwrap_err();

        match &err {
            SyncError::ApplyAborted { step, snapshot, .. } => {
                assert_eq!(step, "create block 'Cards'");
                assert!(snapshot.exists());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("trellis rollback --snapshot="));
        assert_eq!(remote.calls().len(), 2);
    }

    #[test]
    fn only_filter_applies_to_both_plans() {
        let dir = theme_dir();
        let remote = remote();
        let options = SyncOptions {
            only: Some(vec!["Cards".into()]),
            ..applying(true)
        };

        run_sync(&remote, &SiteId::from(SITE), dir.path(), &options, &mut yes()).unwrap();
        assert_eq!(
            remote.calls(),
            vec![RemoteCall::CreateBlock { name: "Cards".into() }]
        );
    }

    #[test]
    fn only_theme_path_applies_exactly_the_approved_leaf() {
        let dir = theme_dir();
        fs::write(
            dir.path().join("theme.json"),
            r##"{"colors": {"primary": "#fff", "accent": "#f0f"}}"##,
        )
        .unwrap();
        let remote = remote();
        remote.state().site.as_mut().unwrap().theme =
            json!({"colors": {"primary": "#000", "accent": "#0af"}})
                .as_object()
                .cloned()
                .unwrap();
        let options = SyncOptions {
            only: Some(vec!["colors.primary".into()]),
            ..applying(false)
        };

        let mut approved = Vec::new();
        let mut confirm = |preview: &Preview, _: bool| {
            approved = preview.changeset.theme_changes.iter().map(|c| c.path.clone()).collect();
            true
        };
        run_sync(&remote, &SiteId::from(SITE), dir.path(), &options, &mut confirm).unwrap();

        assert_eq!(approved, vec!["colors.primary"]);
        let theme = remote.get_site(&SiteId::from(SITE)).unwrap().theme;
        assert_eq!(theme["colors"], json!({"primary": "#fff", "accent": "#0af"}));
    }

    #[test]
    fn deletes_only_without_opt_in_is_nothing_to_do() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("converted/blocks")).unwrap();
        let remote = MemoryRemote::new(site()).with_blocks(vec![remote_block("b2", "Legacy", "")]);
        let mut confirm = |_: &Preview, _: bool| -> bool { panic!("nothing to confirm") };

        let outcome =
            run_sync(&remote, &SiteId::from(SITE), dir.path(), &applying(false), &mut confirm)
                .unwrap();
        assert!(matches!(outcome, SyncOutcome::NothingToDo(_)));
    }

    #[test]
    fn unknown_site_fails_before_any_mutation() {
        let dir = theme_dir();
        let remote = remote();
        let err = run_sync(&remote, &SiteId::from("nope"), dir.path(), &applying(true), &mut yes())
            .unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)));
        assert!(remote.calls().is_empty());
    }
}
