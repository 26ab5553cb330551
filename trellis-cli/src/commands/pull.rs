//! `trellis pull` — write remote state into the local theme layout.

use anyhow::{Context, Result};
use clap::Args;

use trellis_core::{config, local::theme_dir_at, ThemeName};
use trellis_client::HttpRemote;
use trellis_sync::{pull, WriteResult};

/// Arguments for `trellis pull`.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Theme directory name; created if missing.
    #[arg(long)]
    pub theme: String,

    #[arg(long)]
    pub site: Option<String>,

    /// Show what would be written without writing any files.
    #[arg(long)]
    pub dry_run: bool,
}

impl PullArgs {
    pub fn run(self) -> Result<()> {
        let config = config::load().context("failed to load ~/.trellis/config.yaml")?;
        let theme = ThemeName::from(self.theme.as_str());
        let dir = theme_dir_at(&config.themes_root(), &theme);
        let site = config.resolve_site(&theme, self.site.as_deref())?;
        let client = HttpRemote::new(&config.credentials()?)?;

        let report = pull(&client, &site, &dir, self.dry_run)
            .with_context(|| format!("pull failed for theme '{theme}'"))?;

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        println!(
            "{prefix}✓ '{theme}' pulled from site {site} ({} written, {} unchanged)",
            report.written(),
            report.unchanged()
        );
        for write in &report.writes {
            match write {
                WriteResult::Written { path } => println!("  ✎  {}", path.display()),
                WriteResult::WouldWrite { path } => println!("  ~  {}", path.display()),
                WriteResult::Unchanged { .. } => {}
            }
        }
        for name in &report.skipped {
            println!("  !  skipped component with unusable name {name:?}");
        }
        Ok(())
    }
}
