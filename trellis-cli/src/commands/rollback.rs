//! `trellis rollback` — list snapshots, or restore the site from one.

use anyhow::{Context, Result};
use clap::Args;

use trellis_sync::{load_snapshot, plan_rollback, rollback_from_snapshot, RollbackOptions};

use super::snapshots::print_snapshot_table;
use super::{colored_summary, prompt_yes_no, ThemeTarget};

/// Arguments for `trellis rollback`.
#[derive(Args, Debug)]
pub struct RollbackArgs {
    #[arg(long)]
    pub theme: String,

    #[arg(long)]
    pub site: Option<String>,

    /// Snapshot file name or path. Omit to list available snapshots.
    #[arg(long)]
    pub snapshot: Option<String>,

    /// Also delete components created after the snapshot was taken.
    #[arg(long)]
    pub delete: bool,

    /// Skip the confirmation prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl RollbackArgs {
    pub fn run(self) -> Result<()> {
        let target = ThemeTarget::resolve(&self.theme)?;
        let Some(id) = self.snapshot.as_deref() else {
            return print_snapshot_table(&target.dir);
        };

        let snapshot = load_snapshot(&target.dir, id)
            .with_context(|| format!("cannot load snapshot '{id}'"))?;
        let (client, site) = target.connect(self.site.as_deref())?;

        let plan = plan_rollback(&client, &site, &snapshot)?;
        if plan.is_noop(self.delete) {
            println!("✓ site {site} already matches snapshot {id}");
            return Ok(());
        }
        println!(
            "Rollback to {} (captured {}): {}",
            id,
            snapshot.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
            colored_summary(&plan.summary())
        );
        if !self.delete && plan.summary().deletes > 0 {
            println!("  components created since the snapshot are kept; pass --delete to remove them");
        }
        if !self.yes && !prompt_yes_no("Restore the remote site?") {
            println!("Aborted; nothing was changed.");
            return Ok(());
        }

        let report = rollback_from_snapshot(
            &client,
            &site,
            &snapshot,
            RollbackOptions {
                prune_created: self.delete,
            },
        )
        .with_context(|| format!("rollback of site {site} stopped part-way"))?;

        tracing::info!(site = %site, snapshot = id, removed = report.removed, "rollback applied");
        println!(
            "✓ restored {} block(s), {} partial(s){}; removed {}",
            report.blocks_restored,
            report.partials_restored,
            if report.theme_restored { ", theme" } else { "" },
            report.removed
        );
        Ok(())
    }
}
