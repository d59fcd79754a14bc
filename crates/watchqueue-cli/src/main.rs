use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::Context;
use commands::{config, queue};
use watch_queue_config::{Config, PathManager};

mod commands;
mod logging;
mod navigator;
mod output;

#[derive(Parser)]
#[command(name = "watchqueue")]
#[command(about = "watchqueue - One watch queue across every streaming site")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the queue in play order
    List,
    /// Add one movie or episode
    Add {
        #[command(subcommand)]
        kind: AddCommands,
    },
    /// Add every item from a JSON file
    #[command(long_about = "Add items from a JSON file. The file is either an array of queue items or a page snapshot ({url, series?, item?}) as captured by a site scraper; snapshots are read through the site adapter for the page's host.")]
    Import {
        /// Path to the JSON file
        file: std::path::PathBuf,
    },
    /// Remove an item by id
    Remove {
        id: String,
    },
    /// Move an item to a new position (0 = next up)
    Move {
        id: String,
        position: usize,
    },
    /// Remove every item
    Clear,
    /// Report a finished video and open the next queued item
    Complete {
        /// URL of the page where playback finished
        url: String,
    },
    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum AddCommands {
    /// Add a movie or single video
    Movie {
        title: String,
        url: String,
        #[command(flatten)]
        common: ItemArgs,
    },
    /// Add a series episode (merged with an existing copy of the same episode)
    Episode {
        title: String,
        url: String,
        /// Series title, part of the episode identity
        #[arg(long)]
        series: String,
        #[arg(long)]
        season: u32,
        #[arg(long)]
        episode: u32,
        /// Service-specific series id
        #[arg(long)]
        series_id: Option<String>,
        #[command(flatten)]
        common: ItemArgs,
    },
}

#[derive(clap::Args)]
struct ItemArgs {
    /// Item id (generated when omitted)
    #[arg(long)]
    id: Option<String>,

    /// Streaming service (detected from the URL when omitted)
    #[arg(long)]
    service: Option<String>,

    /// Runtime, in seconds or as m:ss / h:mm:ss
    #[arg(long)]
    duration: Option<String>,

    /// Thumbnail URL
    #[arg(long)]
    thumbnail: Option<String>,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let paths = PathManager::default();
    let config = Config::load_or_default(&paths.config_file())
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))
        .wrap_err_with(|| format!("Failed to load {}", paths.config_file().display()))?;

    logging::init_logging(cli.verbose, cli.quiet, &config.logging)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Config { cmd } => config::run_config(cmd, &config, &paths, &output),
        command => {
            config
                .validate()
                .map_err(|e| color_eyre::eyre::eyre!("Invalid configuration: {}", e))?;
            let session = queue::QueueSession::open(&config, &paths)?;
            match command {
                Commands::List => queue::run_list(&session, &output).await,
                Commands::Add { kind } => queue::run_add(&session, kind, &output).await,
                Commands::Import { file } => queue::run_import(&session, &file, &output).await,
                Commands::Remove { id } => queue::run_remove(&session, &id, &output).await,
                Commands::Move { id, position } => queue::run_move(&session, &id, position, &output).await,
                Commands::Clear => queue::run_clear(&session, &output).await,
                Commands::Complete { url } => queue::run_complete(&session, &url, &output).await,
                Commands::Config { .. } => Ok(()),
            }
        }
    }
}
