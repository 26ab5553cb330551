//! Changeset engine: pure diffs between local files and remote documents.
//!
//! Components are joined **by name**: a local file has no durable id until
//! it has been synced once, so the name is the only key both sides share.
//! Every function here is deterministic and free of I/O; the orchestrator
//! relies on that to recompute the plan right before applying it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use trellis_core::{
    Field, LocalBlock, LocalPartial, LocalTheme, RemoteBlock, RemotePartial, ThemeConfig,
};

use crate::normalize::{is_different, normalize_template, strip_field_volatile};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A block or partial property that can differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    Template,
    Fields,
    Description,
    ThumbnailType,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Property::Template => "template",
            Property::Fields => "fields",
            Property::Description => "description",
            Property::ThumbnailType => "thumbnailType",
        })
    }
}

/// One planned change to a block or partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ComponentChange {
    /// Present locally, absent remotely.
    Create { name: String },
    /// Present on both sides; `changes` is never empty.
    Update {
        name: String,
        id: String,
        changes: Vec<Property>,
    },
    /// Present remotely, absent locally. Applied only with the delete opt-in.
    Delete { name: String, id: String },
}

impl ComponentChange {
    pub fn name(&self) -> &str {
        match self {
            ComponentChange::Create { name }
            | ComponentChange::Update { name, .. }
            | ComponentChange::Delete { name, .. } => name,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, ComponentChange::Delete { .. })
    }
}

pub type BlockChange = ComponentChange;
pub type PartialChange = ComponentChange;

/// One differing leaf of the theme configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeFieldChange {
    /// Dotted path from the theme root, e.g. `colors.primary`.
    pub path: String,
    /// Top-level theme key the path lives under; the unit of theme merges.
    pub key: String,
    /// `path` split into object keys. Kept apart from `path` because a theme
    /// key may itself contain a dot.
    #[serde(skip)]
    pub segments: Vec<String>,
    /// `None` when the path is absent locally.
    pub local: Option<Value>,
    /// `None` when the path is absent remotely.
    pub remote: Option<Value>,
}

impl ThemeFieldChange {
    /// Object keys from the theme root down to the changed value.
    pub fn path_segments(&self) -> Vec<String> {
        if self.segments.is_empty() {
            self.path.split('.').map(str::to_owned).collect()
        } else {
            self.segments.clone()
        }
    }
}

/// Remote state as fetched for one run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteView {
    pub theme: ThemeConfig,
    pub blocks: Vec<RemoteBlock>,
    pub partials: Vec<RemotePartial>,
}

/// Everything that differs between a local theme and a remote view.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changeset {
    pub blocks: Vec<BlockChange>,
    pub partials: Vec<PartialChange>,
    pub theme_changes: Vec<ThemeFieldChange>,
}

/// Counts per action, for the one-line preview summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChangeSummary {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub theme_changes: usize,
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} theme change(s)",
            self.creates, self.updates, self.deletes, self.theme_changes
        )
    }
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.partials.is_empty() && self.theme_changes.is_empty()
    }

    /// `true` when applying with the given delete setting would issue no call.
    pub fn is_noop(&self, allow_delete: bool) -> bool {
        let actionable = |c: &ComponentChange| allow_delete || !c.is_delete();
        self.theme_changes.is_empty()
            && !self.blocks.iter().any(actionable)
            && !self.partials.iter().any(actionable)
    }

    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary {
            theme_changes: self.theme_changes.len(),
            ..ChangeSummary::default()
        };
        for change in self.blocks.iter().chain(&self.partials) {
            match change {
                ComponentChange::Create { .. } => summary.creates += 1,
                ComponentChange::Update { .. } => summary.updates += 1,
                ComponentChange::Delete { .. } => summary.deletes += 1,
            }
        }
        summary
    }

    /// Keep only changes to the named components, and theme changes whose
    /// top-level key or exact path is named.
    pub fn filter_only(&self, names: &[String]) -> Changeset {
        let wanted: HashSet<&str> = names.iter().map(|n| n.trim()).collect();
        Changeset {
            blocks: keep_named(&self.blocks, &wanted),
            partials: keep_named(&self.partials, &wanted),
            theme_changes: self
                .theme_changes
                .iter()
                .filter(|c| wanted.contains(c.key.as_str()) || wanted.contains(c.path.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Top-level theme keys touched by this changeset, sorted.
    pub fn changed_theme_keys(&self) -> BTreeSet<String> {
        self.theme_changes.iter().map(|c| c.key.clone()).collect()
    }
}

fn keep_named(changes: &[ComponentChange], wanted: &HashSet<&str>) -> Vec<ComponentChange> {
    changes
        .iter()
        .filter(|c| wanted.contains(c.name()))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Blocks and partials
// ---------------------------------------------------------------------------

/// How the local side is read when it leaves something unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    /// Unset description, thumbnail type or top-level theme key: no opinion.
    Sync,
    /// The local side is the exact target state; unset means "should be unset".
    Restore,
}

/// Diff local blocks against remote blocks.
///
/// Creates and updates follow local order, deletes follow remote order. A
/// remote name that appears twice is compared (or deleted) once, using its
/// first occurrence.
pub fn diff_blocks(local: &[LocalBlock], remote: &[RemoteBlock]) -> Vec<BlockChange> {
    diff_blocks_as(local, remote, Comparison::Sync)
}

fn diff_blocks_as(
    local: &[LocalBlock],
    remote: &[RemoteBlock],
    comparison: Comparison,
) -> Vec<BlockChange> {
    diff_by_name(
        local,
        remote,
        |b| b.name.as_str(),
        |b| b.name.as_str(),
        |b| b.id.as_str(),
        |l, r| block_differences(l, r, comparison),
    )
}

/// Diff local partials against remote partials. Only templates are compared.
pub fn diff_partials(local: &[LocalPartial], remote: &[RemotePartial]) -> Vec<PartialChange> {
    diff_by_name(
        local,
        remote,
        |p| p.name.as_str(),
        |p| p.name.as_str(),
        |p| p.id.as_str(),
        |l, r| {
            if templates_differ(&l.template, &r.template) {
                vec![Property::Template]
            } else {
                vec![]
            }
        },
    )
}

fn diff_by_name<L, R>(
    local: &[L],
    remote: &[R],
    local_name: impl Fn(&L) -> &str,
    remote_name: impl Fn(&R) -> &str,
    remote_id: impl Fn(&R) -> &str,
    differences: impl Fn(&L, &R) -> Vec<Property>,
) -> Vec<ComponentChange> {
    let mut remote_by_name: HashMap<&str, &R> = HashMap::new();
    for r in remote {
        remote_by_name.entry(remote_name(r)).or_insert(r);
    }

    let mut changes = Vec::new();
    let mut seen_local: HashSet<&str> = HashSet::new();
    for l in local {
        let name = local_name(l);
        if !seen_local.insert(name) {
            continue;
        }
        match remote_by_name.get(name) {
            None => changes.push(ComponentChange::Create {
                name: name.to_owned(),
            }),
            Some(r) => {
                let props = differences(l, r);
                if !props.is_empty() {
                    changes.push(ComponentChange::Update {
                        name: name.to_owned(),
                        id: remote_id(r).to_owned(),
                        changes: props,
                    });
                }
            }
        }
    }

    let mut deleted: HashSet<&str> = HashSet::new();
    for r in remote {
        let name = remote_name(r);
        if seen_local.contains(name) || !deleted.insert(name) {
            continue;
        }
        changes.push(ComponentChange::Delete {
            name: name.to_owned(),
            id: remote_id(r).to_owned(),
        });
    }
    changes
}

fn block_differences(
    local: &LocalBlock,
    remote: &RemoteBlock,
    comparison: Comparison,
) -> Vec<Property> {
    let mut props = Vec::new();
    if templates_differ(&local.template, &remote.template) {
        props.push(Property::Template);
    }
    if fields_differ(&local.fields, &remote.fields) {
        props.push(Property::Fields);
    }
    if optional_differs(&local.description, &remote.description, comparison) {
        props.push(Property::Description);
    }
    if optional_differs(&local.thumbnail_type, &remote.thumbnail_type, comparison) {
        props.push(Property::ThumbnailType);
    }
    props
}

/// When syncing, absent locally means "no opinion", not "should be empty".
fn optional_differs(local: &Option<String>, remote: &Option<String>, comparison: Comparison) -> bool {
    match (local, comparison) {
        (None, Comparison::Sync) => false,
        _ => local != remote,
    }
}

fn templates_differ(local: &str, remote: &str) -> bool {
    normalize_template(local) != normalize_template(remote)
}

fn fields_differ(local: &[Field], remote: &[Field]) -> bool {
    match (serde_json::to_value(local), serde_json::to_value(remote)) {
        (Ok(Value::Array(l)), Ok(Value::Array(r))) => is_different(
            &Value::Array(strip_field_volatile(&l)),
            &Value::Array(strip_field_volatile(&r)),
        ),
        _ => true,
    }
}

// ---------------------------------------------------------------------------
// Theme
// ---------------------------------------------------------------------------

/// Path-wise diff of theme tokens.
///
/// Only top-level keys present locally are compared; a key the local theme
/// does not mention is left to whoever owns it remotely. Below the top
/// level, nested objects are walked and anything else (arrays included) is
/// compared as a unit. Paths are emitted in sorted key order.
pub fn diff_theme(local: &ThemeConfig, remote: &ThemeConfig) -> Vec<ThemeFieldChange> {
    diff_theme_as(local, remote, Comparison::Sync)
}

fn diff_theme_as(
    local: &ThemeConfig,
    remote: &ThemeConfig,
    comparison: Comparison,
) -> Vec<ThemeFieldChange> {
    let keys: BTreeSet<&String> = match comparison {
        Comparison::Sync => local.keys().collect(),
        Comparison::Restore => local.keys().chain(remote.keys()).collect(),
    };

    let mut changes = Vec::new();
    for key in keys {
        walk_theme(
            &[key.clone()],
            local.get(key.as_str()),
            remote.get(key.as_str()),
            &mut changes,
        );
    }
    changes
}

fn walk_theme(
    segments: &[String],
    local: Option<&Value>,
    remote: Option<&Value>,
    out: &mut Vec<ThemeFieldChange>,
) {
    if let (Some(Value::Object(l)), Some(Value::Object(r))) = (local, remote) {
        let keys: BTreeSet<&String> = l.keys().chain(r.keys()).collect();
        for key in keys {
            let mut child = segments.to_vec();
            child.push(key.clone());
            walk_theme(&child, l.get(key.as_str()), r.get(key.as_str()), out);
        }
        return;
    }

    let differs = match (local, remote) {
        (Some(l), Some(r)) => is_different(l, r),
        (None, None) => false,
        _ => true,
    };
    if differs {
        out.push(ThemeFieldChange {
            path: segments.join("."),
            key: segments[0].clone(),
            segments: segments.to_vec(),
            local: local.cloned(),
            remote: remote.cloned(),
        });
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Full changeset for one local theme against one remote view.
///
/// A theme without `theme.json` yields no theme changes.
pub fn compute_changeset(local: &LocalTheme, remote: &RemoteView) -> Changeset {
    compute_as(local, remote, Comparison::Sync)
}

/// Changeset that turns `remote` into exactly `target`.
///
/// Unlike [`compute_changeset`], a description or thumbnail type that is
/// unset in `target` must be unset remotely, and a top-level theme key
/// missing from `target` must be missing remotely. Used by rollback.
pub fn compute_restore_changeset(target: &LocalTheme, remote: &RemoteView) -> Changeset {
    compute_as(target, remote, Comparison::Restore)
}

fn compute_as(local: &LocalTheme, remote: &RemoteView, comparison: Comparison) -> Changeset {
    Changeset {
        blocks: diff_blocks_as(&local.blocks, &remote.blocks, comparison),
        partials: diff_partials(&local.partials, &remote.partials),
        theme_changes: local
            .theme
            .as_ref()
            .map(|theme| diff_theme_as(theme, &remote.theme, comparison))
            .unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
