mod cmd_check;
mod cmd_notify;
mod cmd_run;
mod cmd_status;
mod sink;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commitwatch_store::WatchPaths;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "commitwatch",
    version,
    about = "Watch GitHub projects for new commits"
)]
struct Cli {
    /// Configuration directory (default: $COMMITWATCH_PREFIX, then the user config dir)
    #[arg(long, global = true)]
    prefix: Option<PathBuf>,
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the configuration and watch every project until Ctrl+C
    Run,
    /// Validate the configuration and show what `run` would change
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the watchers recorded in the lock file
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Notification channel diagnostics
    Notify {
        #[command(subcommand)]
        cmd: cmd_notify::NotifyCmd,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let paths = WatchPaths::resolve(cli.prefix.as_deref());

    match cli.cmd {
        Command::Run => cmd_run::execute(&paths),
        Command::Check { json } => cmd_check::execute(&paths, json),
        Command::Status { json } => cmd_status::execute(&paths, json),
        Command::Notify { cmd } => cmd_notify::run(cmd, &paths),
    }
}
