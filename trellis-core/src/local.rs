//! Local theme reader.
//!
//! # Working-directory layout
//!
//! ```text
//! <themes_root>/
//!   <theme>/
//!     theme.json                     (design tokens, optional)
//!     converted/
//!       blocks/<Name>.html           (template)
//!       blocks/<Name>.json           (fields, description, thumbnailType)
//!       partials/<Name>.html         (template)
//!     .snapshots/                    (written by trellis-sync)
//! ```
//!
//! Everything is read fresh on every call; nothing is cached.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ThemeError};
use crate::types::{Field, LocalBlock, LocalPartial, LocalTheme, ThemeConfig, ThemeName};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<themes_root>/<theme>/`. Pure, no I/O.
pub fn theme_dir_at(themes_root: &Path, theme: &ThemeName) -> PathBuf {
    themes_root.join(&theme.0)
}

/// `<theme_dir>/converted/blocks/`
pub fn blocks_dir(theme_dir: &Path) -> PathBuf {
    theme_dir.join("converted").join("blocks")
}

/// `<theme_dir>/converted/partials/`
pub fn partials_dir(theme_dir: &Path) -> PathBuf {
    theme_dir.join("converted").join("partials")
}

/// `<theme_dir>/theme.json`
pub fn theme_config_path(theme_dir: &Path) -> PathBuf {
    theme_dir.join("theme.json")
}

/// `<theme_dir>/converted/blocks/<name>.html`
pub fn block_template_path(theme_dir: &Path, name: &str) -> PathBuf {
    blocks_dir(theme_dir).join(format!("{name}.html"))
}

/// `<theme_dir>/converted/blocks/<name>.json`
pub fn block_schema_path(theme_dir: &Path, name: &str) -> PathBuf {
    blocks_dir(theme_dir).join(format!("{name}.json"))
}

/// `<theme_dir>/converted/partials/<name>.html`
pub fn partial_template_path(theme_dir: &Path, name: &str) -> PathBuf {
    partials_dir(theme_dir).join(format!("{name}.html"))
}

// ---------------------------------------------------------------------------
// 2. Block schema sidecar
// ---------------------------------------------------------------------------

/// Contents of `<Name>.json` next to a block template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSchema {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_type: Option<String>,
}

impl From<&LocalBlock> for BlockSchema {
    fn from(block: &LocalBlock) -> Self {
        Self {
            fields: block.fields.clone(),
            description: block.description.clone(),
            thumbnail_type: block.thumbnail_type.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Read blocks, partials, and theme tokens from `theme_dir`.
///
/// Returns [`ThemeError::ThemeNotFound`] if the directory itself is missing.
/// Missing `blocks/` or `partials/` subdirectories read as empty.
pub fn read_local_theme(theme_dir: &Path) -> Result<LocalTheme, ThemeError> {
    if !theme_dir.is_dir() {
        return Err(ThemeError::ThemeNotFound {
            path: theme_dir.to_path_buf(),
        });
    }
    Ok(LocalTheme {
        blocks: read_blocks(theme_dir)?,
        partials: read_partials(theme_dir)?,
        theme: read_theme_config(theme_dir)?,
    })
}

/// Every `*.html` under `converted/blocks/`, joined with its `.json` sidecar.
///
/// A block without a sidecar has no fields and asserts no description or
/// thumbnail type. Sorted by name.
pub fn read_blocks(theme_dir: &Path) -> Result<Vec<LocalBlock>, ThemeError> {
    let mut blocks = Vec::new();
    for name in list_template_names(&blocks_dir(theme_dir))? {
        let template_path = block_template_path(theme_dir, &name);
        let template =
            std::fs::read_to_string(&template_path).map_err(|e| io_err(&template_path, e))?;

        let schema_path = block_schema_path(theme_dir, &name);
        let schema = if schema_path.exists() {
            read_json::<BlockSchema>(&schema_path)?
        } else {
            BlockSchema::default()
        };

        blocks.push(LocalBlock {
            name,
            template,
            fields: schema.fields,
            description: schema.description,
            thumbnail_type: schema.thumbnail_type,
        });
    }
    Ok(blocks)
}

/// Every `*.html` under `converted/partials/`, sorted by name.
pub fn read_partials(theme_dir: &Path) -> Result<Vec<LocalPartial>, ThemeError> {
    let mut partials = Vec::new();
    for name in list_template_names(&partials_dir(theme_dir))? {
        let path = partial_template_path(theme_dir, &name);
        let template = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        partials.push(LocalPartial { name, template });
    }
    Ok(partials)
}

/// `theme.json`, or `None` if the theme does not manage its tokens locally.
pub fn read_theme_config(theme_dir: &Path) -> Result<Option<ThemeConfig>, ThemeError> {
    let path = theme_config_path(theme_dir);
    if !path.exists() {
        return Ok(None);
    }
    read_json::<ThemeConfig>(&path).map(Some)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// File stems of `*.html` entries in `dir`, sorted. Missing dir → empty.
///
/// An entry that cannot be inspected is an error: treating it as absent
/// would plan a remote delete.
fn list_template_names(dir: &Path) -> Result<Vec<String>, ThemeError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|x| x.to_str()) != Some("html") {
            continue;
        }
        let metadata = std::fs::metadata(&path).map_err(|e| io_err(&path, e))?;
        if !metadata.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            names.push(stem.to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ThemeError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|source| ThemeError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
