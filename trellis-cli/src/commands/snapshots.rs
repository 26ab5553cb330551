//! `trellis snapshots` — list and prune stored snapshots.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use tabled::{settings::Style, Table, Tabled};

use trellis_sync::{list_snapshots, load_snapshot, prune_snapshots};

use super::ThemeTarget;

/// Subcommands for `trellis snapshots`.
#[derive(Subcommand, Debug)]
pub enum SnapshotsCommand {
    /// List snapshots for a theme, newest first.
    List {
        #[arg(long)]
        theme: String,
    },

    /// Delete all but the newest `--keep` snapshots.
    Prune {
        #[arg(long)]
        theme: String,

        #[arg(long)]
        keep: usize,
    },
}

pub fn run(command: SnapshotsCommand) -> Result<()> {
    match command {
        SnapshotsCommand::List { theme } => {
            let target = ThemeTarget::resolve(&theme)?;
            print_snapshot_table(&target.dir)
        }
        SnapshotsCommand::Prune { theme, keep } => {
            let target = ThemeTarget::resolve(&theme)?;
            let removed = prune_snapshots(&target.dir, keep)
                .with_context(|| format!("failed to prune snapshots for '{theme}'"))?;
            println!("✓ removed {} snapshot(s), kept up to {keep}", removed.len());
            for path in removed {
                println!("  ✗  {}", path.display());
            }
            Ok(())
        }
    }
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "snapshot")]
    id: String,
    #[tabled(rename = "captured")]
    captured: String,
    #[tabled(rename = "age")]
    age: String,
    #[tabled(rename = "site")]
    site: String,
    #[tabled(rename = "blocks")]
    blocks: String,
    #[tabled(rename = "partials")]
    partials: String,
}

/// Print every snapshot under `theme_dir`. Unreadable files are listed too.
pub fn print_snapshot_table(theme_dir: &Path) -> Result<()> {
    let names = list_snapshots(theme_dir).context("failed to list snapshots")?;
    if names.is_empty() {
        println!("No snapshots for {}.", theme_dir.display());
        return Ok(());
    }

    let now = Utc::now();
    let rows: Vec<SnapshotRow> = names
        .into_iter()
        .map(|name| match load_snapshot(theme_dir, &name) {
            Ok(snapshot) => SnapshotRow {
                id: name,
                captured: snapshot
                    .captured_at
                    .format("%Y-%m-%d %H:%M:%S UTC")
                    .to_string(),
                age: humanize_age(snapshot.captured_at, now),
                site: snapshot.site_id,
                blocks: snapshot.blocks.len().to_string(),
                partials: snapshot.partials.len().to_string(),
            },
            Err(err) => SnapshotRow {
                id: name,
                captured: format!("unreadable: {err}"),
                age: "-".into(),
                site: "-".into(),
                blocks: "-".into(),
                partials: "-".into(),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn humanize_age(captured_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(captured_at);
    if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{}m ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn age_picks_largest_whole_unit() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(humanize_age(now - Duration::days(3), now), "3d ago");
        assert_eq!(humanize_age(now - Duration::minutes(90), now), "1h ago");
        assert_eq!(humanize_age(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(humanize_age(now - Duration::seconds(10), now), "just now");
        // Clock skew: a snapshot "from the future" is not negative.
        assert_eq!(humanize_age(now + Duration::minutes(5), now), "just now");
    }
}
