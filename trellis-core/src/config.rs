//! User configuration at `~/.trellis/config.yaml`.
//!
//! ```yaml
//! api_url: https://cms.example.com/api
//! api_token: s3cret
//! themes_dir: /work/themes
//! default_site: 64f0c0ffee
//! sites:
//!   aurora: 64f0c0ffee
//! ```
//!
//! Every key is optional. `TRELLIS_API_URL`, `TRELLIS_API_TOKEN`, and
//! `TRELLIS_SITE` override the file.
//!
//! Like the rest of this crate, loaders come in two forms: `load_at(home)`
//! for tests and `load()` which resolves the home directory itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ThemeError};
use crate::local::theme_dir_at;
use crate::types::{SiteId, ThemeName};

pub const ENV_API_URL: &str = "TRELLIS_API_URL";
pub const ENV_API_TOKEN: &str = "TRELLIS_API_TOKEN";
pub const ENV_SITE: &str = "TRELLIS_SITE";

const DEFAULT_THEMES_DIR: &str = "themes";

/// Parsed configuration file plus environment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_site: Option<String>,
    /// Theme name → site id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sites: BTreeMap<String, String>,
    /// `TRELLIS_SITE`, kept apart so it ranks above `sites` but below `--site`.
    #[serde(skip)]
    pub env_site: Option<String>,
}

/// API endpoint and bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_url: String,
    pub api_token: String,
}

/// `<home>/.trellis/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".trellis").join("config.yaml")
}

/// Load the config file under `home`. A missing file yields the defaults.
pub fn load_at(home: &Path) -> Result<Config, ThemeError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ThemeError::Config { path, source })
}

/// [`load_at`] for the current user, with environment overrides applied.
pub fn load() -> Result<Config, ThemeError> {
    let home = dirs::home_dir().ok_or(ThemeError::HomeNotFound)?;
    Ok(load_at(&home)?.with_env(|key| std::env::var(key).ok()))
}

impl Config {
    /// Apply overrides from `lookup` (normally `std::env::var`). Empty values are ignored.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_API_URL) {
            self.api_url = Some(url);
        }
        if let Some(token) = get(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(site) = get(ENV_SITE) {
            self.env_site = Some(site);
        }
        self
    }

    /// Directory holding theme working directories.
    pub fn themes_root(&self) -> PathBuf {
        self.themes_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_THEMES_DIR))
    }

    /// `<themes_root>/<theme>`, which must exist.
    pub fn resolve_theme_dir(&self, theme: &ThemeName) -> Result<PathBuf, ThemeError> {
        let dir = theme_dir_at(&self.themes_root(), theme);
        if !dir.is_dir() {
            return Err(ThemeError::ThemeNotFound { path: dir });
        }
        Ok(dir)
    }

    /// `--site` → `TRELLIS_SITE` → `sites[theme]` → `default_site`.
    pub fn resolve_site(
        &self,
        theme: &ThemeName,
        explicit: Option<&str>,
    ) -> Result<SiteId, ThemeError> {
        explicit
            .map(str::to_owned)
            .or_else(|| self.env_site.clone())
            .or_else(|| self.sites.get(&theme.0).cloned())
            .or_else(|| self.default_site.clone())
            .filter(|s| !s.trim().is_empty())
            .map(SiteId::from)
            .ok_or_else(|| ThemeError::MissingSite {
                theme: theme.0.clone(),
            })
    }

    /// API URL and token, both required before any network call.
    pub fn credentials(&self) -> Result<Credentials, ThemeError> {
        let api_url = self
            .api_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ThemeError::MissingCredentials {
                what: "api_url",
                env: ENV_API_URL,
            })?;
        let api_token = self
            .api_token
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ThemeError::MissingCredentials {
                what: "api_token",
                env: ENV_API_TOKEN,
            })?;
        Ok(Credentials { api_url, api_token })
    }
}
