//! `msgharvest`: harvests an anchored range of channel messages into a file.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use harvest_engine::ExportFormat;
use harvest_logging::harvest_debug;

mod commands;
mod config;
mod logging;

use config::{AppConfig, Overrides};
use logging::LogDestination;

#[derive(Parser)]
#[command(name = "msgharvest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RON config file (defaults to ./msgharvest.ron when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Access token sent with every request
    #[arg(long, global = true, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// API base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only errors and the final result
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[arg(long, global = true, value_enum)]
    log_destination: Option<LogDestination>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every message between two anchor messages, inclusive
    Range(RangeArgs),

    /// List the text channels of a guild
    Channels(ChannelsArgs),
}

#[derive(Args)]
struct RangeArgs {
    /// Channel location, e.g. https://discord.com/channels/{guild}/{channel}
    #[arg(long, conflicts_with_all = ["guild", "channel"])]
    channel_url: Option<String>,

    /// Guild id, or @me for direct messages
    #[arg(long)]
    guild: Option<String>,

    #[arg(long)]
    channel: Option<String>,

    /// First anchor message id
    #[arg(long)]
    start: Option<String>,

    /// Second anchor message id
    #[arg(long)]
    end: Option<String>,

    /// Minimum milliseconds between the starts of two requests
    #[arg(long, allow_negative_numbers = true)]
    delay_ms: Option<i64>,

    /// Messages per request (1-100)
    #[arg(long)]
    page_size: Option<u32>,

    /// Most requests a single harvest may issue
    #[arg(long)]
    max_attempts: Option<u32>,

    /// text or structured
    #[arg(long)]
    format: Option<ExportFormat>,

    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ChannelsArgs {
    #[arg(long, required_unless_present = "channel_url")]
    guild: Option<String>,

    /// Any channel location inside the guild
    #[arg(long, conflicts_with = "guild")]
    channel_url: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let log_level = if self.quiet {
            Some("error".to_string())
        } else {
            match self.verbose {
                0 => None,
                1 => Some("debug".to_string()),
                _ => Some("trace".to_string()),
            }
        };
        let mut overrides = Overrides {
            api_base: self.api_base.clone(),
            log_level,
            log_destination: self.log_destination,
            ..Overrides::default()
        };
        if let Commands::Range(args) = &self.command {
            overrides.delay_ms = args.delay_ms;
            overrides.page_size = args.page_size;
            overrides.max_attempts = args.max_attempts;
            overrides.output_dir = args.output_dir.clone();
            overrides.format = args.format;
        }
        overrides
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply(cli.overrides());
    logging::initialize(
        config.log_destination,
        config.level_filter()?,
        &config.log_file,
    );
    harvest_debug!("Effective config: {:?}", config);

    let ui = commands::Ui { quiet: cli.quiet };
    match cli.command {
        Commands::Range(args) => commands::range(&config, &ui, args, cli.token),
        Commands::Channels(args) => commands::channels(&config, &ui, args, cli.token),
    }
}
