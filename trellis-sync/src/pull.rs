//! Pull remote state into the local theme layout.
//!
//! ## `atomic_write`
//!
//! 1. Normalise line endings to LF.
//! 2. SHA-256 the content and the file already on disk.
//! 3. Equal digests → skip.
//! 4. Write to `<path>.trellis.tmp`.
//! 5. Rename to the final path (atomic on POSIX).

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use trellis_core::{
    local::{self, BlockSchema},
    Field, LocalBlock, RemoteState, SiteId,
};

use crate::error::{io_err, SyncError};
use crate::orchestrator::fetch_remote_view;

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File already holds exactly this content.
    Unchanged { path: PathBuf },
    /// `--dry-run` mode: the file *would* have been written.
    WouldWrite { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path }
            | WriteResult::Unchanged { path }
            | WriteResult::WouldWrite { path } => path,
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `content` to `path` unless the file already holds it.
pub fn atomic_write(path: &Path, content: &str, dry_run: bool) -> Result<WriteResult, SyncError> {
    let normalized = content.replace("\r\n", "\n");
    let digest = sha256_hex(normalized.as_bytes());

    if path.is_file() {
        let existing = std::fs::read(path).map_err(|e| io_err(path, e))?;
        if sha256_hex(&existing) == digest {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
    }

    if dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(WriteResult::WouldWrite {
            path: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.trellis.tmp", path.display()));
    std::fs::write(&tmp, &normalized).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// pull
// ---------------------------------------------------------------------------

/// Outcome of pulling one site into a theme directory.
#[derive(Debug, Default)]
pub struct PullReport {
    pub writes: Vec<WriteResult>,
    /// Remote components whose names cannot be used as file names.
    pub skipped: Vec<String>,
}

impl PullReport {
    pub fn written(&self) -> usize {
        self.count(|w| matches!(w, WriteResult::Written { .. } | WriteResult::WouldWrite { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|w| matches!(w, WriteResult::Unchanged { .. }))
    }

    fn count(&self, pred: impl Fn(&WriteResult) -> bool) -> usize {
        self.writes.iter().filter(|w| pred(w)).count()
    }
}

/// A component name that maps to a single file inside the layout.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && name.trim() == name
}

/// Fields as they should appear in a local schema: without remote ids.
fn local_fields(fields: &[Field]) -> Vec<Field> {
    fields
        .iter()
        .map(|field| {
            let mut field = field.clone();
            field.id = None;
            field.extra.remove("_id");
            field
        })
        .collect()
}

fn pretty_json(value: &impl serde::Serialize) -> Result<String, SyncError> {
    Ok(format!("{}\n", serde_json::to_string_pretty(value)?))
}

/// Write the remote blocks, partials, and theme of `site` into `theme_dir`.
///
/// Local files for components that no longer exist remotely are left alone.
pub fn pull(
    client: &dyn RemoteState,
    site: &SiteId,
    theme_dir: &Path,
    dry_run: bool,
) -> Result<PullReport, SyncError> {
    let remote = fetch_remote_view(client, site)?;
    let mut report = PullReport::default();

    for block in &remote.blocks {
        if !is_safe_name(&block.name) {
            tracing::warn!("skipping block with unusable name {:?}", block.name);
            report.skipped.push(block.name.clone());
            continue;
        }
        let mut local = LocalBlock::from(block);
        local.fields = local_fields(&local.fields);

        let template = local::block_template_path(theme_dir, &block.name);
        report.writes.push(atomic_write(&template, &local.template, dry_run)?);
        let schema = local::block_schema_path(theme_dir, &block.name);
        let json = pretty_json(&BlockSchema::from(&local))?;
        report.writes.push(atomic_write(&schema, &json, dry_run)?);
    }

    for partial in &remote.partials {
        if !is_safe_name(&partial.name) {
            tracing::warn!("skipping partial with unusable name {:?}", partial.name);
            report.skipped.push(partial.name.clone());
            continue;
        }
        let path = local::partial_template_path(theme_dir, &partial.name);
        report.writes.push(atomic_write(&path, &partial.template, dry_run)?);
    }

    let theme_path = local::theme_config_path(theme_dir);
    report
        .writes
        .push(atomic_write(&theme_path, &pretty_json(&remote.theme)?, dry_run)?);

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
