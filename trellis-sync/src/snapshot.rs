//! Snapshot store: point-in-time captures of remote state.
//!
//! A snapshot is written to `<theme>/.snapshots/<stamp>-<digest>.json` right
//! before a sync mutates anything, and is never touched again except by
//! `prune_snapshots`. Writes use the same atomic `.tmp` + rename pattern as
//! `pull`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use trellis_core::{
    LocalBlock, LocalPartial, LocalTheme, RemoteBlock, RemotePartial, SiteId, ThemeConfig,
};

use crate::changeset::RemoteView;
use crate::error::{io_err, SyncError};

const SNAPSHOT_DIR: &str = ".snapshots";

/// Fully materialized remote state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub site_id: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub theme: ThemeConfig,
    #[serde(default)]
    pub blocks: Vec<RemoteBlock>,
    #[serde(default)]
    pub partials: Vec<RemotePartial>,
}

impl Snapshot {
    /// Capture `view` as the state of `site` now.
    pub fn capture(site: &SiteId, view: &RemoteView) -> Self {
        Self {
            site_id: site.0.clone(),
            captured_at: Utc::now(),
            theme: view.theme.clone(),
            blocks: view.blocks.clone(),
            partials: view.partials.clone(),
        }
    }

    /// The captured state as a [`RemoteView`].
    pub fn view(&self) -> RemoteView {
        RemoteView {
            theme: self.theme.clone(),
            blocks: self.blocks.clone(),
            partials: self.partials.clone(),
        }
    }

    /// The captured state as if it were a local theme, so the changeset
    /// engine can diff it against the current remote.
    pub fn as_local_theme(&self) -> LocalTheme {
        LocalTheme {
            blocks: self.blocks.iter().map(LocalBlock::from).collect(),
            partials: self.partials.iter().map(LocalPartial::from).collect(),
            theme: Some(self.theme.clone()),
        }
    }
}

/// `<theme_dir>/.snapshots`
pub fn snapshots_dir(theme_dir: &Path) -> PathBuf {
    theme_dir.join(SNAPSHOT_DIR)
}

/// Persist `snapshot` and return its path.
///
/// The file name is the capture time followed by a digest of the content, so
/// two different snapshots never share a name. An existing file with the
/// same name already holds identical content and is left as is.
pub fn save_snapshot(theme_dir: &Path, snapshot: &Snapshot) -> Result<PathBuf, SyncError> {
    let dir = snapshots_dir(theme_dir);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let json = serde_json::to_string_pretty(snapshot)?;
    let digest = hex::encode(Sha256::digest(json.as_bytes()));
    let name = format!(
        "{}-{}.json",
        snapshot.captured_at.format("%Y%m%dT%H%M%S%3fZ"),
        &digest[..8]
    );
    let path = dir.join(name);
    if path.exists() {
        tracing::debug!("snapshot already present: {}", path.display());
        return Ok(path);
    }

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }

    tracing::info!("snapshot written: {}", path.display());
    Ok(path)
}

/// Snapshot file names, newest first. A missing directory yields nothing.
pub fn list_snapshots(theme_dir: &Path) -> Result<Vec<String>, SyncError> {
    let dir = snapshots_dir(theme_dir);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".json") && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort_unstable_by(|a, b| b.cmp(a));
    Ok(names)
}

/// Load a snapshot by file name (with or without `.json`) or by path.
pub fn load_snapshot(theme_dir: &Path, id: &str) -> Result<Snapshot, SyncError> {
    let path = resolve_snapshot_path(theme_dir, id);
    if !path.is_file() {
        return Err(SyncError::SnapshotNotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&contents).map_err(|source| SyncError::SnapshotParse { path, source })
}

fn resolve_snapshot_path(theme_dir: &Path, id: &str) -> PathBuf {
    let as_path = Path::new(id);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        return as_path.to_path_buf();
    }
    let file = if id.ends_with(".json") {
        id.to_owned()
    } else {
        format!("{id}.json")
    };
    snapshots_dir(theme_dir).join(file)
}

/// Delete all but the newest `keep` snapshots; returns the removed paths.
pub fn prune_snapshots(theme_dir: &Path, keep: usize) -> Result<Vec<PathBuf>, SyncError> {
    let dir = snapshots_dir(theme_dir);
    let mut removed = Vec::new();
    for name in list_snapshots(theme_dir)?.into_iter().skip(keep) {
        let path = dir.join(name);
        std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        tracing::info!("snapshot pruned: {}", path.display());
        removed.push(path);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::TempDir;

    fn snapshot_at(offset_secs: i64) -> Snapshot {
        Snapshot {
            site_id: "s1".into(),
            captured_at: DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc)
                + Duration::seconds(offset_secs),
            theme: json!({"colors": {"primary": "#000"}}).as_object().cloned().unwrap(),
            blocks: vec![RemoteBlock {
                id: "b1".into(),
                name: "Hero".into(),
                template: "<h1>".into(),
                fields: vec![],
                description: None,
                thumbnail_type: None,
            }],
            partials: vec![],
        }
    }

    #[test]
    fn save_then_load_by_name_and_path() {
        let theme = TempDir::new().unwrap();
        let snapshot = snapshot_at(0);
        let path = save_snapshot(theme.path(), &snapshot).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("20260301T100000000Z-"), "got {name}");

        assert_eq!(load_snapshot(theme.path(), &name).unwrap(), snapshot);
        let bare = name.trim_end_matches(".json");
        assert_eq!(load_snapshot(theme.path(), bare).unwrap(), snapshot);
        let full = path.to_string_lossy();
        assert_eq!(load_snapshot(theme.path(), &full).unwrap(), snapshot);
    }

    #[test]
    fn wire_format_is_camel_case() {
        let theme = TempDir::new().unwrap();
        let path = save_snapshot(theme.path(), &snapshot_at(0)).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw["siteId"], "s1");
        assert_eq!(raw["capturedAt"], "2026-03-01T10:00:00Z");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let theme = TempDir::new().unwrap();
        let dir = snapshots_dir(theme.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("old.json"),
            r#"{"siteId":"s1","capturedAt":"2025-01-01T00:00:00Z","format":2}"#,
        )
        .unwrap();
        let loaded = load_snapshot(theme.path(), "old").unwrap();
        assert!(loaded.blocks.is_empty());
    }

    #[test]
    fn missing_and_malformed_snapshots_are_errors() {
        let theme = TempDir::new().unwrap();
        assert!(matches!(
            load_snapshot(theme.path(), "nope").unwrap_err(),
            SyncError::SnapshotNotFound { .. }
        ));

        let dir = snapshots_dir(theme.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("bad.json"), "{").unwrap();
        assert!(matches!(
            load_snapshot(theme.path(), "bad.json").unwrap_err(),
            SyncError::SnapshotParse { .. }
        ));
    }

    #[test]
    fn saving_twice_never_overwrites() {
        let theme = TempDir::new().unwrap();
        let first = save_snapshot(theme.path(), &snapshot_at(0)).unwrap();
        let mtime = std::fs::metadata(&first).unwrap().modified().unwrap();
        let second = save_snapshot(theme.path(), &snapshot_at(0)).unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::metadata(&second).unwrap().modified().unwrap(), mtime);
        assert!(!first.with_extension("json.tmp").exists());
    }

    #[test]
    fn list_is_newest_first_and_prune_keeps_newest() {
        let theme = TempDir::new().unwrap();
        assert!(list_snapshots(theme.path()).unwrap().is_empty());

        let oldest = save_snapshot(theme.path(), &snapshot_at(0)).unwrap();
        let middle = save_snapshot(theme.path(), &snapshot_at(60)).unwrap();
        let newest = save_snapshot(theme.path(), &snapshot_at(120)).unwrap();

        let names = list_snapshots(theme.path()).unwrap();
        let expected: Vec<String> = [&newest, &middle, &oldest]
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, expected);

        let removed = prune_snapshots(theme.path(), 1).unwrap();
        assert_eq!(removed, vec![middle, oldest]);
        assert_eq!(list_snapshots(theme.path()).unwrap().len(), 1);
        assert!(newest.exists());
    }

    #[test]
    fn as_local_theme_keeps_names_and_theme() {
        let local = snapshot_at(0).as_local_theme();
        assert_eq!(local.blocks[0].name, "Hero");
        assert_eq!(local.theme.unwrap()["colors"]["primary"], "#000");
    }
}
