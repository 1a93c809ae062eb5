use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod flows;
mod render;


#[derive(Parser, Debug)]
#[command(name = "uplift")]
#[command(about = "Versioned migration and backup for locally persisted app state", long_about = None)]
struct Cli {
    /// Override the state directory (default: ~/.uplift/state).
    #[arg(long)]
    state_root: Option<PathBuf>,
    /// Load the release registry from a TOML file instead of the builtin history.
    #[arg(long)]
    registry: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the recorded version and any pending updates.
    Status,
    /// Run every pending migration in release order.
    Update,
    /// Clear the version record and re-run the full migration pass.
    Recheck,
    /// Write a snapshot of the persisted state to a file.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Restore a snapshot file over the persisted state.
    Import { path: PathBuf },
    /// Rewind the version pointer without touching domain data.
    Rollback { version: String },
    /// Delete all local state, keeping a timestamped backup entry.
    Reset,
    /// Print the resolved state layout.
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let registry = flows::load_registry(cli.registry.as_deref())?;
    let mut store = flows::open_store(cli.state_root.clone())?;

    match cli.command {
        Commands::Status => flows::run_status(&mut store, &registry),
        Commands::Update => flows::run_update(&mut store, &registry),
        Commands::Recheck => flows::run_recheck(&mut store, &registry),
        Commands::Export { out } => flows::run_export(&mut store, out),
        Commands::Import { path } => flows::run_import(&mut store, &path),
        Commands::Rollback { version } => flows::run_rollback(&mut store, &version),
        Commands::Reset => flows::run_reset(&mut store),
        Commands::Doctor => flows::run_doctor(&store, cli.registry.as_deref()),
    }
}
