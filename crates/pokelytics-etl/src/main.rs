//! Pokelytics CLI - Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pokelytics_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use pokelytics_etl::analytics::{self, AnalyticsGraph};
use pokelytics_etl::config::PipelineConfig;
use pokelytics_etl::pipeline;
use pokelytics_etl::store::{CreatureFilter, Store};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error};

#[derive(Parser, Debug)]
#[command(name = "pokelytics")]
#[command(author, version, about = "Creature ETL pipeline and analytics")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, shape and store creatures 1..=N, then print the run summary
    Run {
        /// Number of ids to process
        #[arg(short, long)]
        count: Option<u32>,

        /// SQLite database file
        #[arg(short, long)]
        database: Option<String>,

        /// API base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Pause between API calls and between ids
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// List stored creature names
    List {
        /// SQLite database file
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Filter stored creatures
    Filter {
        /// SQLite database file
        #[arg(short, long)]
        database: Option<String>,

        /// Only evolved (true) or unevolved (false) creatures
        #[arg(long)]
        evolved: Option<bool>,

        /// Only creatures of this type
        #[arg(long = "type")]
        type_name: Option<String>,

        /// Minimum base hp
        #[arg(long)]
        hp_min: Option<i64>,

        /// Minimum base attack
        #[arg(long)]
        attack_min: Option<i64>,
    },

    /// Print dashboard analytics (all graphs, or one by name)
    Analytics {
        /// Graph name, e.g. type_distribution
        graph: Option<AnalyticsGraph>,

        /// SQLite database file
        #[arg(short, long)]
        database: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix("pokelytics")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok();

    match execute(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

async fn execute(command: Command) -> Result<ExitCode> {
    match command {
        Command::Run {
            count,
            database,
            base_url,
            delay_ms,
        } => {
            let mut config = PipelineConfig::from_env()?;
            if let Some(count) = count {
                config = config.with_fetch_count(count);
            }
            if let Some(database) = database {
                config = config.with_database_path(database);
            }
            if let Some(base_url) = base_url {
                config = config.with_base_url(base_url);
            }
            if let Some(delay_ms) = delay_ms {
                config = config.with_delay_ms(delay_ms);
            }
            config.validate()?;
            ensure_parent_dir(&config.database_path)?;
            debug!(?config, "Resolved pipeline configuration");

            let summary = pipeline::execute(config).await;
            print_json(&summary)?;

            Ok(if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        },

        Command::List { database } => {
            let store = open_store(database).await?;
            let names = store.list_names().await;
            store.close().await?;
            print_json(&names)?;
            Ok(ExitCode::SUCCESS)
        },

        Command::Filter {
            database,
            evolved,
            type_name,
            hp_min,
            attack_min,
        } => {
            let filter = CreatureFilter {
                is_evolved: evolved,
                type_name,
                hp_min,
                attack_min,
            };
            let store = open_store(database).await?;
            let creatures = store.filter_creatures(&filter).await;
            store.close().await?;
            print_json(&creatures)?;
            Ok(ExitCode::SUCCESS)
        },

        Command::Analytics { graph, database } => {
            let store = open_store(database).await?;
            match graph {
                Some(graph) => print_json(&analytics::graph(&store, graph).await)?,
                None => print_json(&analytics::generate(&store).await)?,
            }
            store.close().await?;
            Ok(ExitCode::SUCCESS)
        },
    }
}

/// Open the database named on the command line, or the configured one.
async fn open_store(database: Option<String>) -> Result<Store> {
    let location = match database {
        Some(database) => database,
        None => PipelineConfig::from_env()?.database_path,
    };

    Store::connect(&location)
        .await
        .with_context(|| format!("Failed to open database {}", location))
}

fn ensure_parent_dir(database_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(database_path)
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
