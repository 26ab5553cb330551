//! Issue the mutating calls for a changeset, in a fixed order.
//!
//! theme → block creates → block updates → block deletes → partial creates →
//! partial updates → partial deletes. The first failing call stops the run;
//! nothing already applied is undone here.

use serde::Serialize;
use serde_json::{Map, Value};

use trellis_core::{
    BlockPatch, LocalBlock, LocalPartial, LocalTheme, PartialPatch, RemoteError, RemoteState,
    SiteId, ThemeConfig,
};

use crate::changeset::{Changeset, ComponentChange, Property, ThemeFieldChange};
use crate::error::SyncError;

/// Which part of the theme is sent when theme changes exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeWrite {
    /// Each top-level key with a planned change, rebuilt from its current
    /// remote value with exactly the planned paths applied.
    ChangedKeys,
    /// Every top-level key of the local theme, plus `null` for each planned
    /// removal of a top-level key.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    pub allow_delete: bool,
    pub theme: ThemeWrite,
}

/// Calls issued for one component kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KindCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// What an apply actually did.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ApplyReport {
    /// Top-level theme keys sent, empty when the theme was not written.
    pub theme_keys: Vec<String>,
    pub blocks: KindCounts,
    pub partials: KindCounts,
    /// Deletes present in the changeset but not applied (no opt-in).
    pub skipped_deletes: usize,
}

impl ApplyReport {
    pub fn total_calls(&self) -> usize {
        let kind = |k: &KindCounts| k.created + k.updated + k.deleted;
        usize::from(!self.theme_keys.is_empty()) + kind(&self.blocks) + kind(&self.partials)
    }
}

/// Apply `changeset` to `site`, taking component content from `local`.
///
/// `remote_theme` is the theme the changeset was computed against; values
/// the changeset does not touch are carried over from it unchanged.
///
/// Errors are [`SyncError::Apply`] naming the failed step.
pub fn apply_changeset(
    client: &dyn RemoteState,
    site: &SiteId,
    local: &LocalTheme,
    remote_theme: &ThemeConfig,
    changeset: &Changeset,
    options: ApplyOptions,
) -> Result<ApplyReport, SyncError> {
    let mut report = ApplyReport::default();

    if !changeset.theme_changes.is_empty() {
        if let Some(theme) = &local.theme {
            let payload = theme_payload(theme, remote_theme, changeset, options.theme);
            let keys: Vec<String> = payload.keys().cloned().collect();
            let step = format!("update theme ({})", keys.join(", "));
            client
                .update_site_theme(site, &payload)
                .map_err(|e| failed(&step, e))?;
            tracing::info!("updated theme keys: {}", keys.join(", "));
            report.theme_keys = keys;
        }
    }

    apply_blocks(client, site, &local.blocks, &changeset.blocks, options, &mut report)?;
    apply_partials(client, site, &local.partials, &changeset.partials, options, &mut report)?;

    Ok(report)
}

/// The body of the theme update. A top-level key mapped to `null` is removed
/// by the server.
pub fn theme_payload(
    local: &ThemeConfig,
    remote: &ThemeConfig,
    changeset: &Changeset,
    mode: ThemeWrite,
) -> ThemeConfig {
    match mode {
        ThemeWrite::Full => {
            let mut payload = local.clone();
            for change in &changeset.theme_changes {
                if change.local.is_none() && change.path_segments().len() == 1 {
                    payload.insert(change.key.clone(), Value::Null);
                }
            }
            payload
        }
        ThemeWrite::ChangedKeys => {
            let mut payload = ThemeConfig::new();
            for key in changeset.changed_theme_keys() {
                let mut value = remote.get(&key).cloned();
                for change in changeset.theme_changes.iter().filter(|c| c.key == key) {
                    set_path(&mut value, &change.path_segments()[1..], change);
                }
                payload.insert(key, value.unwrap_or(Value::Null));
            }
            payload
        }
    }
}

/// Write `change.local` at `rest` below `slot`; `None` removes the entry.
fn set_path(slot: &mut Option<Value>, rest: &[String], change: &ThemeFieldChange) {
    let Some((head, tail)) = rest.split_first() else {
        *slot = change.local.clone();
        return;
    };
    if !matches!(slot, Some(Value::Object(_))) {
        *slot = Some(Value::Object(Map::new()));
    }
    if let Some(Value::Object(map)) = slot {
        let mut child = map.remove(head);
        set_path(&mut child, tail, change);
        if let Some(value) = child {
            map.insert(head.clone(), value);
        }
    }
}

fn apply_blocks(
    client: &dyn RemoteState,
    site: &SiteId,
    local: &[LocalBlock],
    changes: &[ComponentChange],
    options: ApplyOptions,
    report: &mut ApplyReport,
) -> Result<(), SyncError> {
    let find = |name: &str| local.iter().find(|b| b.name == name);

    for change in changes {
        if let ComponentChange::Create { name } = change {
            let Some(block) = find(name) else { continue };
            let step = format!("create block '{name}'");
            let created = client.create_block(site, block).map_err(|e| failed(&step, e))?;
            tracing::info!("created block '{}' ({})", name, created.id);
            report.blocks.created += 1;
        }
    }

    for change in changes {
        if let ComponentChange::Update { name, id, changes } = change {
            let Some(block) = find(name) else { continue };
            let patch = block_patch(block, changes);
            if patch.is_empty() {
                continue;
            }
            let step = format!("update block '{name}'");
            client
                .update_block(site, id, &patch)
                .map_err(|e| failed(&step, e))?;
            tracing::info!("updated block '{}': {}", name, patch.property_names().join(", "));
            report.blocks.updated += 1;
        }
    }

    for change in changes {
        if let ComponentChange::Delete { name, id } = change {
            if !options.allow_delete {
                report.skipped_deletes += 1;
                continue;
            }
            let step = format!("delete block '{name}'");
            client.delete_block(site, id).map_err(|e| failed(&step, e))?;
            tracing::info!("deleted block '{}' ({})", name, id);
            report.blocks.deleted += 1;
        }
    }
    Ok(())
}

fn apply_partials(
    client: &dyn RemoteState,
    site: &SiteId,
    local: &[LocalPartial],
    changes: &[ComponentChange],
    options: ApplyOptions,
    report: &mut ApplyReport,
) -> Result<(), SyncError> {
    let find = |name: &str| local.iter().find(|p| p.name == name);

    for change in changes {
        if let ComponentChange::Create { name } = change {
            let Some(partial) = find(name) else { continue };
            let step = format!("create partial '{name}'");
            let created = client
                .create_partial(site, partial)
                .map_err(|e| failed(&step, e))?;
            tracing::info!("created partial '{}' ({})", name, created.id);
            report.partials.created += 1;
        }
    }

    for change in changes {
        if let ComponentChange::Update { name, id, .. } = change {
            let Some(partial) = find(name) else { continue };
            let patch = PartialPatch {
                template: Some(partial.template.clone()),
            };
            let step = format!("update partial '{name}'");
            client
                .update_partial(site, id, &patch)
                .map_err(|e| failed(&step, e))?;
            tracing::info!("updated partial '{}'", name);
            report.partials.updated += 1;
        }
    }

    for change in changes {
        if let ComponentChange::Delete { name, id } = change {
            if !options.allow_delete {
                report.skipped_deletes += 1;
                continue;
            }
            let step = format!("delete partial '{name}'");
            client.delete_partial(site, id).map_err(|e| failed(&step, e))?;
            tracing::info!("deleted partial '{}' ({})", name, id);
            report.partials.deleted += 1;
        }
    }
    Ok(())
}

/// A patch carrying only the properties listed in `changes`.
pub fn block_patch(block: &LocalBlock, changes: &[Property]) -> BlockPatch {
    let mut patch = BlockPatch::default();
    for property in changes {
        match property {
            Property::Template => patch.template = Some(block.template.clone()),
            Property::Fields => patch.fields = Some(block.fields.clone()),
            Property::Description => patch.description = Some(block.description.clone()),
            Property::ThumbnailType => {
                patch.thumbnail_type = Some(block.thumbnail_type.clone())
            }
        }
    }
    patch
}

fn failed(step: &str, source: RemoteError) -> SyncError {
    tracing::error!("{step} failed: {source}");
    SyncError::Apply {
        step: step.to_owned(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changeset::{compute_changeset, RemoteView};
    use serde_json::json;
    use trellis_core::{Field, FieldType, MemoryRemote, RemoteBlock, RemoteCall, Site};

    fn site() -> Site {
        Site {
            id: "s1".into(),
            name: None,
            theme: json!({"colors": {"primary": "#000"}, "fonts": {"body": "Inter"}})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    fn block(name: &str, template: &str) -> LocalBlock {
        LocalBlock {
            name: name.into(),
            template: template.into(),
            fields: vec![Field::new(FieldType::Text, "title")],
            description: None,
            thumbnail_type: None,
        }
    }

    fn view(remote: &MemoryRemote) -> RemoteView {
        let id = SiteId::from("s1");
        RemoteView {
            theme: remote.get_site(&id).unwrap().theme,
            blocks: remote.get_blocks(&id).unwrap(),
            partials: remote.get_partials(&id).unwrap(),
        }
    }

    fn options(allow_delete: bool) -> ApplyOptions {
        ApplyOptions {
            allow_delete,
            theme: ThemeWrite::ChangedKeys,
        }
    }

    #[test]
    fn applies_in_fixed_order_with_minimal_patches() {
        let remote = MemoryRemote::new(site()).with_blocks(vec![
            RemoteBlock {
                id: "b1".into(),
                name: "Hero".into(),
                template: "<h1>old".into(),
                fields: vec![Field::new(FieldType::Text, "title")],
                description: None,
                thumbnail_type: None,
            },
            RemoteBlock {
                id: "b2".into(),
                name: "Legacy".into(),
                template: "".into(),
                fields: vec![],
                description: None,
                thumbnail_type: None,
            },
        ]);
        let local = LocalTheme {
            blocks: vec![block("Cards", "<ul>"), block("Hero", "<h1>new")],
            partials: vec![LocalPartial {
                name: "Nav".into(),
                template: "<nav>".into(),
            }],
            theme: Some(json!({"colors": {"primary": "#fff"}}).as_object().cloned().unwrap()),
        };
        let base = view(&remote);
        let changeset = compute_changeset(&local, &base);

        let report = apply_changeset(
            &remote,
            &SiteId::from("s1"),
            &local,
            &base.theme,
            &changeset,
            options(true),
        )
        .unwrap();

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
                RemoteCall::CreatePartial { name: "Nav".into() },
            ]
        );
        assert_eq!(report.total_calls(), 5);
        assert_eq!(report.skipped_deletes, 0);
        assert_eq!(remote.get_site(&SiteId::from("s1")).unwrap().theme["fonts"]["body"], "Inter");
    }

    #[test]
    fn deletes_are_skipped_without_opt_in() {
        let remote = MemoryRemote::new(site()).with_blocks(vec![RemoteBlock {
            id: "b2".into(),
            name: "Legacy".into(),
            template: "".into(),
            fields: vec![],
            description: None,
            thumbnail_type: None,
        }]);
        let local = LocalTheme::default();
        let base = view(&remote);
        let changeset = compute_changeset(&local, &base);

        let report = apply_changeset(
            &remote,
            &SiteId::from("s1"),
            &local,
            &base.theme,
            &changeset,
            options(false),
        )
        .unwrap();
        assert!(remote.calls().is_empty());
        assert_eq!(report.skipped_deletes, 1);
        assert_eq!(remote.block_names(), vec!["Legacy"]);
    }

    #[test]
    fn first_failure_stops_and_names_the_step() {
        let remote = MemoryRemote::new(site());
        remote.state().fail_at_call = Some(1);
        let local = LocalTheme {
            blocks: vec![block("A", "<a>"), block("B", "<b>"), block("C", "<c>")],
            ..LocalTheme::default()
        };
        let base = view(&remote);
        let changeset = compute_changeset(&local, &base);

        let err = apply_changeset(
            &remote,
            &SiteId::from("s1"),
            &local,
            &base.theme,
            &changeset,
            options(false),
        )
        .unwrap_err();
        match err {
            SyncError::Apply { step, source } => {
                assert_eq!(step, "create block 'B'");
                assert_eq!(source.status(), Some(500));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(remote.calls().len(), 2, "no call after the failure");
        assert_eq!(remote.block_names(), vec!["A"]);
    }

    #[test]
    fn full_theme_write_sends_every_key() {
        let remote = MemoryRemote::new(site());
        let local = LocalTheme {
            theme: Some(
                json!({"colors": {"primary": "#fff"}, "fonts": {"body": "Inter"}})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
            ..LocalTheme::default()
        };
        let base = view(&remote);
        let changeset = compute_changeset(&local, &base);
        let report = apply_changeset(
            &remote,
            &SiteId::from("s1"),
            &local,
            &base.theme,
            &changeset,
            ApplyOptions {
                allow_delete: false,
                theme: ThemeWrite::Full,
            },
        )
        .unwrap();
        assert_eq!(report.theme_keys, vec!["colors", "fonts"]);
    }

    #[test]
    fn block_patch_carries_only_listed_properties() {
        let mut local = block("Hero", "<h1>");
        local.description = Some("Banner".into());
        let patch = block_patch(&local, &[Property::Description]);
        assert_eq!(patch.property_names(), vec!["description"]);
        assert_eq!(patch.description, Some(Some("Banner".into())));

        local.description = None;
        let cleared = block_patch(&local, &[Property::Description]);
        assert_eq!(cleared.description, Some(None));
    }

    #[test]
    fn filtered_theme_path_leaves_sibling_paths_alone() {
        let remote = MemoryRemote::new(Site {
            id: "s1".into(),
            name: None,
            theme: json!({"colors": {"primary": "#000", "accent": "#0af"}})
                .as_object()
                .cloned()
                .unwrap(),
        });
        let local = LocalTheme {
            theme: Some(
                json!({"colors": {"primary": "#fff", "accent": "#f0f"}})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
            ..LocalTheme::default()
        };
        let base = view(&remote);
        let changeset = compute_changeset(&local, &base).filter_only(&["colors.primary".into()]);
        assert_eq!(changeset.theme_changes.len(), 1);

        apply_changeset(
            &remote,
            &SiteId::from("s1"),
            &local,
            &base.theme,
            &changeset,
            options(false),
        )
        .unwrap();

        let theme = remote.get_site(&SiteId::from("s1")).unwrap().theme;
        assert_eq!(theme["colors"], json!({"primary": "#fff", "accent": "#0af"}));
    }

    #[test]
    fn changed_keys_payload_applies_leaf_removals() {
        let remote = json!({"colors": {"primary": "#000", "old": "#111"}, "fonts": {"body": "Inter"}});
        let remote = remote.as_object().cloned().unwrap();
        let local = json!({"colors": {"primary": "#fff"}}).as_object().cloned().unwrap();
        let changeset = Changeset {
            theme_changes: crate::changeset::diff_theme(&local, &remote),
            ..Changeset::default()
        };

        let payload = theme_payload(&local, &remote, &changeset, ThemeWrite::ChangedKeys);
        assert_eq!(Value::Object(payload), json!({"colors": {"primary": "#fff"}}));
    }

    #[test]
    fn full_payload_nulls_removed_top_level_keys() {
        let remote = json!({"colors": {"primary": "#000"}, "spacing": {"sm": 4}})
            .as_object()
            .cloned()
            .unwrap();
        let target = json!({"colors": {"primary": "#000"}}).as_object().cloned().unwrap();
        let changeset = crate::changeset::compute_restore_changeset(
            &LocalTheme {
                theme: Some(target.clone()),
                ..LocalTheme::default()
            },
            &RemoteView {
                theme: remote.clone(),
                ..RemoteView::default()
            },
        );

        let payload = theme_payload(&target, &remote, &changeset, ThemeWrite::Full);
        assert_eq!(
            Value::Object(payload),
            json!({"colors": {"primary": "#000"}, "spacing": null})
        );
    }
}
