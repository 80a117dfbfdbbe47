use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use table_rating::config::AppConfig;
use table_rating::format_timestamp;
use table_rating::generate::{generate_matches, Schedule};
use table_rating::standings::{rollover, standings};
use table_rating::storage::{
    MatchRepository, PlayerRepository, SheetStore, StorageConfig, WatermarkStore,
};
use table_rating::sync::RatingSync;

#[derive(Parser)]
#[command(name = "table-rating")]
#[command(about = "Incremental ratings for four-player table matches")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: String,

    /// Data directory path (overrides the configuration file)
    #[arg(long)]
    data_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rate every match that ended after the watermark
    Process {
        /// Compute updates but don't write anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Print players ordered by rating
    Standings {
        /// Only show the top N players
        #[arg(long)]
        limit: Option<usize>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start a new reporting period
    Snapshot,

    /// Append randomly generated matches between existing players
    Generate {
        /// Number of matches to generate
        #[arg(long, default_value = "10")]
        count: usize,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Check every stored match without changing anything
    Validate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&PathBuf::from(&cli.config))
        .with_context(|| format!("Failed to load config from {}", cli.config))?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = PathBuf::from(dir);
    }
    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting table-rating v{}", env!("CARGO_PKG_VERSION"));

    let store = SheetStore::new(StorageConfig::new(config.data_dir.clone()));

    match cli.command {
        Commands::Process { dry_run } => {
            let sync = RatingSync::from_store(&store, &config);
            let report = sync.run(dry_run)?;

            println!("\n=== Rating Run ===");
            println!("New matches:      {}", report.new_matches);
            println!("New players:      {}", report.new_players);
            println!("Processed:        {}", report.processed);
            println!("Players updated:  {}", report.updated_players);
            println!(
                "Watermark:        {}",
                report
                    .watermark
                    .as_ref()
                    .map(format_timestamp)
                    .unwrap_or_else(|| "-".to_string())
            );
            println!("Duration:         {:.2?}", report.duration);

            if !report.errors.is_empty() {
                println!("\nErrors:");
                for error in &report.errors {
                    println!("  {}", error);
                }
            }

            if dry_run {
                println!("\n(dry run - no data written to disk)");
            } else if !report.persisted {
                println!("\nNo updates written");
            }

            if !report.success() {
                std::process::exit(1);
            }
        }

        Commands::Standings { limit, json } => {
            let players: Vec<_> = store
                .load_players()?
                .into_iter()
                .map(|stored| stored.player)
                .collect();

            let mut table = standings(&players);
            if let Some(limit) = limit {
                table.truncate(limit);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else if table.is_empty() {
                println!("No players");
            } else {
                println!(
                    "{:>4}  {:<24} {:>9} {:>6} {:>9} {:>6}",
                    "#", "Player", "Rating", "Games", "Period", "Played"
                );
                for row in &table {
                    println!(
                        "{:>4}  {:<24} {:>9.2} {:>6} {:>+9.2} {:>6}",
                        row.position,
                        row.name,
                        row.rating,
                        row.games,
                        row.period_change,
                        row.period_games
                    );
                }
            }
        }

        Commands::Snapshot => {
            let mut players: Vec<_> = store
                .load_players()?
                .into_iter()
                .map(|stored| stored.player)
                .collect();

            let changed = rollover(&mut players);
            store.replace_players(&players)?;

            println!(
                "Snapshot taken: {} players ({} changed since the last period)",
                players.len(),
                changed
            );
        }

        Commands::Generate { count, seed } => {
            let players: Vec<_> = store
                .load_players()?
                .into_iter()
                .map(|stored| stored.player)
                .collect();

            let existing = store.load_matches()?;
            let start = existing
                .iter()
                .filter_map(|m| m.end_instant())
                .chain(store.get_watermark()?)
                .max()
                .map(|latest| latest + Duration::minutes(30))
                .unwrap_or_else(Utc::now);

            let schedule = Schedule::starting_at(start);
            let generated = match seed {
                Some(seed) => {
                    generate_matches(&players, count, &schedule, &mut StdRng::seed_from_u64(seed))?
                }
                None => generate_matches(&players, count, &schedule, &mut rand::rng())?,
            };

            let appended = store.append_matches(&generated)?;
            println!("Generated {} matches", appended);
        }

        Commands::Validate => {
            let sync = RatingSync::from_store(&store, &config);
            let issues = sync.check_matches()?;

            if issues.is_empty() {
                println!("All matches valid");
            } else {
                for issue in &issues {
                    println!("Match {}:", issue.row);
                    for error in &issue.errors {
                        println!("  {}", error);
                    }
                }
                println!("\n{} invalid matches", issues.len());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
