mod config_commands;
mod plugin_commands;
mod relocation_commands;
mod snapshot;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    massmover_config::MassMoverConfig,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "massmover", about = "MassMover: move every occupant of a channel tree into one channel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the config value.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file, or a directory to search for one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the channels a mass move on the target would cover.
    Scope {
        #[command(flatten)]
        target: relocation_commands::TargetArgs,
    },
    /// Run a mass move against a server snapshot and print the outcome.
    Move {
        #[command(flatten)]
        target: relocation_commands::TargetArgs,
        /// Occupant id of the invoking client (defaults to the snapshot's self_id).
        #[arg(long, conflicts_with = "unattended")]
        invoker: Option<u16>,
        /// Move everyone in one batch; nobody is held back.
        #[arg(long)]
        unattended: bool,
    },
    /// Print plugin metadata and menu items.
    Info,
    /// Validate the configuration file.
    Check,
}

fn init_telemetry(cli: &Cli, config: &MassMoverConfig) {
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output; logs go to stderr.
    if cli.json_logs || config.logging.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, config_path) = config_commands::load(cli.config.as_deref())?;

    init_telemetry(&cli, &config);
    debug!(version = env!("CARGO_PKG_VERSION"), "massmover starting");

    match cli.command {
        Commands::Scope { target } => relocation_commands::handle_scope(&config, &target),
        Commands::Move {
            target,
            invoker,
            unattended,
        } => relocation_commands::handle_move(&config, &target, invoker, unattended),
        Commands::Info => plugin_commands::handle_info(&config),
        Commands::Check => config_commands::handle_check(&config, config_path.as_deref()),
    }
}
