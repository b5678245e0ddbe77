use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use dnspilot::application::Pilot;
use dnspilot::cli;
use dnspilot::domain::ServiceName;
use dnspilot::infrastructure::config::SettingsStore;
use dnspilot::infrastructure::tracing::{TracingOutput, init_tracing};

#[derive(Parser)]
#[command(name = "dnspilot")]
#[command(about = "Transactional upstream configuration for an Unbound resolver")]
#[command(version)]
struct Cli {
    /// Settings file (default: $DNSPILOT_CONFIG or /etc/dnspilot/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply an upstream configuration (JSON) with validation and rollback
    Apply {
        /// Upstream configuration document
        file: PathBuf,

        /// Skip the post-reload self-test
        #[arg(long)]
        no_self_test: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the resolver config a document would produce
    Render {
        /// Upstream configuration document
        file: PathBuf,
    },

    /// Show the applied upstream configuration
    Show,

    /// List snapshots, newest first
    Snapshots,

    /// Restore a snapshot and reload the resolver
    Rollback {
        /// Snapshot id as shown by `dnspilot snapshots`
        id: String,
    },

    /// Run resolver diagnostics
    SelfTest {
        /// Only validate config and check the resolver is alive
        #[arg(long)]
        quick: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show resolver statistics
    Stats {
        /// Print every counter
        #[arg(long)]
        all: bool,
    },

    /// Show service and resolver state
    Status,

    /// Restart a managed service
    Restart {
        /// unbound, cloudflared or dnscrypt-proxy
        #[arg(long, default_value = "unbound")]
        service: ServiceName,
    },

    /// Flush resolver caches
    Flush {
        /// Drop cached records at and below this zone
        #[arg(long, conflicts_with = "infra", required_unless_present = "infra")]
        zone: Option<String>,

        /// Drop the upstream infrastructure cache
        #[arg(long)]
        infra: bool,
    },

    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "dnspilot", &mut io::stdout());
        return Ok(());
    }

    init_tracing(cli.verbose, TracingOutput::Stderr).context("Failed to initialize logging")?;

    let store = SettingsStore::locate(cli.config);
    let settings = store
        .load()
        .with_context(|| format!("Failed to load settings from {}", store.path().display()))?;
    let pilot = Pilot::new(settings);

    match cli.command {
        Commands::Apply {
            file,
            no_self_test,
            json,
        } => cli::apply::execute(&pilot, &file, no_self_test, json).await,
        Commands::Render { file } => cli::render::execute(&pilot, &file),
        Commands::Show => cli::show::execute(&pilot),
        Commands::Snapshots => cli::snapshots::execute(&pilot),
        Commands::Rollback { id } => cli::rollback::execute(&pilot, &id).await,
        Commands::SelfTest { quick, json } => cli::self_test::execute(&pilot, quick, json).await,
        Commands::Stats { all } => cli::stats::execute(&pilot, all).await,
        Commands::Status => cli::status::execute(&pilot).await,
        Commands::Restart { service } => cli::restart::execute(&pilot, service).await,
        Commands::Flush { zone, infra } => cli::flush::execute(&pilot, zone, infra).await,
        Commands::Completions { .. } => Ok(()),
    }
}
