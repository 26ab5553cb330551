//! Trellis — sync a file-based website theme with a content service.
//!
//! # Usage
//!
//! ```text
//! trellis sync --theme <name> [--site <id>] [--apply] [--delete] [--only a,b] [--yes] [--diff]
//! trellis rollback --theme <name> [--site <id>] [--snapshot <file>] [--delete] [--yes]
//! trellis pull --theme <name> [--site <id>] [--dry-run]
//! trellis snapshots list|prune --theme <name> [--keep <n>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    pull::PullArgs, rollback::RollbackArgs, snapshots::SnapshotsCommand, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "trellis",
    version,
    about = "Reconcile a local website theme with its remote site",
    long_about = None,
)]
struct Cli {
    /// Log progress (`info`); `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Preview the changeset between local files and the remote site; apply with `--apply`.
    Sync(SyncArgs),

    /// List snapshots, or restore the remote site from one.
    Rollback(RollbackArgs),

    /// Write the remote blocks, partials, and theme into the local layout.
    Pull(PullArgs),

    /// Manage stored snapshots.
    Snapshots {
        #[command(subcommand)]
        command: SnapshotsCommand,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Rollback(args) => args.run(),
        Commands::Pull(args) => args.run(),
        Commands::Snapshots { command } => commands::snapshots::run(command),
    }
}
