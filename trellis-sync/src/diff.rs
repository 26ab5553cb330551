//! Unified template diffs for `trellis sync --diff`.
//!
//! Both sides are normalized first, so the diff shows only what the
//! changeset engine considers a change.

use similar::TextDiff;

use crate::changeset::{ComponentChange, Property};
use crate::normalize::normalize_template;
use crate::orchestrator::Preview;

/// A single template diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDiff {
    /// `block` or `partial`.
    pub kind: &'static str,
    pub name: String,
    pub unified_diff: String,
}

/// Diffs of every block and partial update that touches the template.
pub fn template_diffs(preview: &Preview) -> Vec<TemplateDiff> {
    let mut diffs = Vec::new();

    for change in &preview.changeset.blocks {
        let Some(name) = template_update(change) else { continue };
        let local = preview.local.blocks.iter().find(|b| b.name == name);
        let remote = preview.remote.blocks.iter().find(|b| b.name == name);
        if let (Some(local), Some(remote)) = (local, remote) {
            diffs.push(unified("block", name, &remote.template, &local.template));
        }
    }

    for change in &preview.changeset.partials {
        let Some(name) = template_update(change) else { continue };
        let local = preview.local.partials.iter().find(|p| p.name == name);
        let remote = preview.remote.partials.iter().find(|p| p.name == name);
        if let (Some(local), Some(remote)) = (local, remote) {
            diffs.push(unified("partial", name, &remote.template, &local.template));
        }
    }

    diffs
}

fn template_update(change: &ComponentChange) -> Option<&str> {
    match change {
        ComponentChange::Update { name, changes, .. } if changes.contains(&Property::Template) => {
            Some(name.as_str())
        }
        _ => None,
    }
}

fn unified(kind: &'static str, name: &str, remote: &str, local: &str) -> TemplateDiff {
    let old = with_trailing_newline(normalize_template(remote));
    let new = with_trailing_newline(normalize_template(local));
    let old_header = format!("remote/{kind}s/{name}");
    let new_header = format!("local/{kind}s/{name}");
    let unified_diff = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    TemplateDiff {
        kind,
        name: name.to_owned(),
        unified_diff,
    }
}

fn with_trailing_newline(mut s: String) -> String {
    if !s.is_empty() && !s.ends_with('\n') {
        s.push('\n');
    }
    s
}
