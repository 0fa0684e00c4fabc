use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod completion;
mod context;
mod dispatch;
mod logging;
mod prompt;
mod render;
mod worker;

use dispatch::run_cli;

#[derive(Parser, Debug)]
#[command(name = "sysswap")]
#[command(
    about = "Replace a protected system library and roll back with the system file checker",
    long_about = None
)]
struct Cli {
    /// Config file (default: ./sysswap.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// File name of the protected library; overrides [target] library.
    #[arg(long, global = true)]
    library: Option<String>,
    /// Root of the bundled replacement assets; overrides [assets] root.
    #[arg(long, global = true)]
    assets: Option<PathBuf>,
    /// Append-only log file; overrides [log] file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Run even when the process is not elevated (for testing on non-Windows hosts).
    #[arg(long, global = true, hide = true)]
    skip_elevation_check: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which files an unlock would touch.
    Targets,
    /// Report host, configuration and asset status.
    Doctor,
    /// Back up, take ownership of, delete and replace the target library.
    Unlock {
        #[arg(long)]
        dry_run: bool,
        /// Print the final report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Repair protected system files with the system file checker.
    Restore {
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Give ownership of the target files back to TrustedInstaller.
    RestoreOwner,
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    run_cli(cli).await
}
