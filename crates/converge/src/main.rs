mod commands;
mod config;
mod session;

use clap::{Parser, Subcommand};
use converge_cloud::ResourceKind;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "converge")]
#[command(about = "Create, update and delete cloud resources and wait until they converge", long_about = None)]
struct Cli {
    /// Config file (defaults: $CONVERGE_CONFIG, ./converge.yaml, ~/.config/converge/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding .converge/state.json
    #[arg(long, global = true, env = "CONVERGE_STATE_DIR", default_value = ".")]
    state_dir: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a resource and wait until it is active
    Create {
        /// Resource kind (database-cluster, database-replica, kubernetes-cluster, node-pool, route, vpc)
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        /// JSON payload file ("-" for stdin)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Show the current status of a resource
    Read {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        id: String,
    },
    /// Apply changed fields and wait until the resource is active again
    Update {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        id: String,
        /// JSON file with the planned resource body ("-" for stdin)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete a resource and wait until it is gone
    Delete {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        id: String,
    },
    /// Wait until an existing resource reaches a target status
    Wait {
        #[arg(value_parser = parse_kind)]
        kind: ResourceKind,
        id: String,
        /// Accepted status (repeatable; defaults to the kind's active statuses)
        #[arg(short, long = "target")]
        targets: Vec<String>,
        /// Seconds between observations
        #[arg(long)]
        interval: Option<u64>,
        /// Seconds before giving up
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// List resources recorded in the local state
    State {
        /// Only this kind
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<ResourceKind>,
    },
    /// Show version information
    Version,
}

fn parse_kind(s: &str) -> Result<ResourceKind, String> {
    s.parse::<ResourceKind>().map_err(|e| e.to_string())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Exit status for a forced second interrupt (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancel the returned token on Ctrl-C; a second Ctrl-C exits at once
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("interrupt received, cancelling (press Ctrl-C again to exit now)");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("second interrupt, exiting without saving state");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Neither needs the API config
    match cli.command {
        Commands::Version => {
            println!("converge {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::State { kind } => {
            return commands::state::handle(&cli.state_dir, kind).await;
        }
        _ => {}
    }

    let config = config::Config::load(cli.config.as_deref())?;
    let cancel = cancel_on_interrupt();
    let ctx = commands::Context::new(&config, &cli.state_dir, cancel)?;

    match cli.command {
        Commands::Create { kind, file } => commands::create::handle(&ctx, kind, &file).await,
        Commands::Read { kind, id } => commands::read::handle(&ctx, kind, &id).await,
        Commands::Update { kind, id, file } => {
            commands::update::handle(&ctx, kind, &id, &file).await
        }
        Commands::Delete { kind, id } => commands::delete::handle(&ctx, kind, &id).await,
        Commands::Wait {
            kind,
            id,
            targets,
            interval,
            timeout,
        } => commands::wait::handle(&ctx, kind, &id, targets, interval, timeout).await,
        Commands::State { .. } | Commands::Version => Ok(()),
    }
}
