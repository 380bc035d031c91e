mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use epacta_core::config::{CalendarSource, EpactaConfig};

#[derive(Parser)]
#[command(name = "epacta")]
#[command(about = "Ingest Epacta liturgical calendar feeds into a local event cache")]
struct Cli {
    /// Config file (defaults to ~/.config/epacta/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init,
    /// Expand every configured feed and reconcile it with the cache
    Sync {
        /// Only operate on this calendar (by id)
        #[arg(short, long)]
        calendar: Option<String>,

        /// Apply the feed even when it would delete every cached event
        #[arg(long)]
        force: bool,
    },
    /// List cached events
    Events {
        #[arg(short, long)]
        calendar: String,

        /// Show events from this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Show events until this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
    /// Replace or clear the description of one cached event
    Override {
        #[arg(short, long)]
        calendar: String,

        /// Occurrence id as shown by `epacta events`
        uid: String,

        /// New description, in the " / " separated convention
        #[arg(required_unless_present = "clear", conflicts_with = "clear")]
        text: Option<String>,

        /// Go back to the upstream description
        #[arg(long)]
        clear: bool,
    },
    /// Print the metadata parsed from a description as JSON
    Parse { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => EpactaConfig::config_path()?,
    };

    match cli.command {
        Commands::Init => commands::init::run(&config_path),
        Commands::Sync { calendar, force } => {
            let config = EpactaConfig::load(&config_path)?;
            let calendars = resolve_calendars(&config, calendar.as_deref())?;
            commands::sync::run(&config, calendars, force).await
        }
        Commands::Events { calendar, from, to } => {
            let config = EpactaConfig::load(&config_path)?;
            let calendar = resolve_calendar(&config, &calendar)?;
            commands::events::run(&config, &calendar, from.as_deref(), to.as_deref())
        }
        Commands::Override {
            calendar,
            uid,
            text,
            clear,
        } => {
            let config = EpactaConfig::load(&config_path)?;
            let calendar = resolve_calendar(&config, &calendar)?;
            let text = if clear { None } else { text };
            commands::set_override::run(&config, &calendar, &uid, text.as_deref())
        }
        Commands::Parse { text } => commands::parse::run(&text),
    }
}

fn resolve_calendars(
    config: &EpactaConfig,
    calendar_filter: Option<&str>,
) -> Result<Vec<CalendarSource>> {
    if config.calendars.is_empty() {
        anyhow::bail!(
            "No calendars configured.\n\n\
            Add a [[calendars]] entry to your config file. Create one with:\n  \
            epacta init"
        );
    }

    match calendar_filter {
        Some(id) => Ok(vec![resolve_calendar(config, id)?]),
        None => Ok(config.calendars.clone()),
    }
}

fn resolve_calendar(config: &EpactaConfig, id: &str) -> Result<CalendarSource> {
    match config.calendar(id) {
        Some(calendar) => Ok(calendar.clone()),
        None => {
            let available: Vec<_> = config.calendars.iter().map(|c| c.id.as_str()).collect();
            anyhow::bail!(
                "Calendar '{}' not found. Available: {}",
                id,
                available.join(", ")
            );
        }
    }
}
