//! `trellis sync` — preview, and optionally apply, the theme changeset.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use trellis_sync::{
    diff::template_diffs, run_sync, ComponentChange, Preview, SyncOptions, SyncOutcome,
};

use super::{colored_summary, prompt_yes_no, ThemeTarget};

/// Arguments for `trellis sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Theme directory name under `themes_dir`.
    #[arg(long)]
    pub theme: String,

    /// Remote site id (defaults from TRELLIS_SITE or the config file).
    #[arg(long)]
    pub site: Option<String>,

    /// Apply the changeset after confirmation. Without it nothing is sent.
    #[arg(long)]
    pub apply: bool,

    /// Also delete remote blocks and partials that have no local file.
    #[arg(long)]
    pub delete: bool,

    /// Restrict to these block/partial names or top-level theme keys.
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Show unified diffs of changed templates.
    #[arg(long)]
    pub diff: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let target = ThemeTarget::resolve(&self.theme)?;
        let (client, site) = target.connect(self.site.as_deref())?;

        let options = SyncOptions {
            apply: self.apply,
            allow_delete: self.delete,
            only: (!self.only.is_empty()).then(|| self.only.clone()),
        };
        let mut confirm = |preview: &Preview, allow_delete: bool| {
            print_plan(preview, allow_delete, self.diff);
            self.yes || prompt_yes_no("Apply these changes?")
        };

        let outcome = run_sync(&client, &site, &target.dir, &options, &mut confirm)
            .with_context(|| format!("sync failed for theme '{}'", target.theme))?;

        match outcome {
            SyncOutcome::DryRun(preview) => {
                print_plan(&preview, self.delete, self.diff);
                if !preview.changeset.is_empty() {
                    println!("\n{}", "Dry run — pass --apply to make these changes.".dimmed());
                }
            }
            SyncOutcome::NothingToDo(preview) => {
                if !preview.changeset.is_empty() {
                    print_plan(&preview, self.delete, self.diff);
                }
                println!("✓ '{}' is in sync with site {site} — nothing to do", target.theme);
            }
            SyncOutcome::Aborted(_) => println!("Aborted; nothing was changed."),
            SyncOutcome::Applied {
                applied,
                snapshot,
                report,
                drifted,
                ..
            } => {
                if drifted {
                    println!(
                        "{} the remote changed while you were confirming; applied the recomputed plan ({})",
                        "!".yellow().bold(),
                        colored_summary(&applied.summary())
                    );
                }
                match snapshot {
                    Some(path) => {
                        tracing::info!(
                            site = %site,
                            calls = report.total_calls(),
                            snapshot = %path.display(),
                            "sync applied"
                        );
                        println!(
                            "✓ applied {} call(s) to site {site}",
                            report.total_calls()
                        );
                        println!("  snapshot: {}", path.display());
                        if report.skipped_deletes > 0 {
                            println!(
                                "  {} remote-only component(s) kept; pass --delete to remove them",
                                report.skipped_deletes
                            );
                        }
                    }
                    None => println!("✓ nothing left to apply after re-checking the remote"),
                }
            }
        }
        Ok(())
    }
}

fn print_plan(preview: &Preview, allow_delete: bool, show_diff: bool) {
    let changeset = &preview.changeset;
    println!("Changeset: {}", colored_summary(&changeset.summary()));

    for (kind, changes) in [("block", &changeset.blocks), ("partial", &changeset.partials)] {
        for change in changes {
            match change {
                ComponentChange::Create { name } => {
                    println!("  {} {kind} {name}", "+".green().bold())
                }
                ComponentChange::Update { name, changes, .. } => {
                    let props: Vec<String> = changes.iter().map(ToString::to_string).collect();
                    println!("  {} {kind} {name} ({})", "~".yellow().bold(), props.join(", "))
                }
                ComponentChange::Delete { name, .. } if allow_delete => {
                    println!("  {} {kind} {name}", "-".red().bold())
                }
                ComponentChange::Delete { name, .. } => println!(
                    "  {}",
                    format!("· {kind} {name} exists only remotely (kept; pass --delete to remove)")
                        .dimmed()
                ),
            }
        }
    }

    for change in &changeset.theme_changes {
        println!(
            "  {} theme {}: {} → {}",
            "~".cyan().bold(),
            change.path,
            show_value(change.remote.as_ref()),
            show_value(change.local.as_ref()),
        );
    }

    if show_diff {
        for diff in template_diffs(preview) {
            println!();
            print!("{}", diff.unified_diff);
        }
    }
}

fn show_value(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "(unset)".to_string(),
    }
}
