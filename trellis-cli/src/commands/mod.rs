pub mod pull;
pub mod rollback;
pub mod snapshots;
pub mod sync;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use trellis_client::HttpRemote;
use trellis_core::{config, Config, SiteId, ThemeName};
use trellis_sync::ChangeSummary;

/// A theme resolved against the user configuration.
pub struct ThemeTarget {
    pub config: Config,
    pub theme: ThemeName,
    pub dir: PathBuf,
}

impl ThemeTarget {
    /// Load the config and require `<themes_dir>/<theme>` to exist.
    pub fn resolve(theme: &str) -> Result<Self> {
        let config = config::load().context("failed to load ~/.trellis/config.yaml")?;
        let theme = ThemeName::from(theme);
        let dir = config.resolve_theme_dir(&theme)?;
        Ok(Self { config, theme, dir })
    }

    /// Site id and an authenticated client. Fails before any network call
    /// when either is missing.
    pub fn connect(&self, site: Option<&str>) -> Result<(HttpRemote, SiteId)> {
        let site = self.config.resolve_site(&self.theme, site)?;
        let credentials = self.config.credentials()?;
        Ok((HttpRemote::new(&credentials)?, site))
    }
}

/// `y`/`yes` on stdin; anything else (including EOF) declines.
pub fn prompt_yes_no(question: &str) -> bool {
    print!("{question} [y/N] ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

pub fn colored_summary(summary: &ChangeSummary) -> String {
    format!(
        "{} to create, {} to update, {} to delete, {} theme change(s)",
        summary.creates.to_string().green(),
        summary.updates.to_string().yellow(),
        summary.deletes.to_string().red(),
        summary.theme_changes.to_string().cyan(),
    )
}
