//! modelmeta cataloguer.
//!
//! Indexes climate data files into a modelmeta catalogue, manages
//! ensembles and produces listings of what is catalogued.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::{CataloguerConfig, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "cataloguer")]
#[command(about = "Catalogue climate data files into a modelmeta database")]
struct Args {
    /// Configuration file path (environment variables are used otherwise)
    #[arg(short, long, env = "MODELMETA_CONFIG")]
    config: Option<PathBuf>,

    /// Catalogue database path
    #[arg(long)]
    database: Option<String>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update the catalogue schema
    Migrate,

    /// Index data files, each described by a JSON sidecar
    Index {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Manage ensembles
    #[command(subcommand)]
    Ensemble(EnsembleCommand),

    /// Associate an ensemble to indexed files
    Associate {
        #[arg(long)]
        name: String,

        #[arg(long = "version", id = "ensemble_version")]
        ensemble_version: f64,

        /// Only these variables (default: all variables of each file)
        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,

        /// Treat each path as a regular expression
        #[arg(long)]
        regex: bool,

        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// List indexed files
    List {
        #[arg(long)]
        ensemble: Option<String>,

        #[arg(long)]
        multi_variable: Option<bool>,

        #[arg(long)]
        multi_year_mean: Option<bool>,

        #[arg(long)]
        mym_concatenated: Option<bool>,

        /// Show the ensembles of each file
        #[arg(long)]
        list_ensembles: bool,

        /// Print counts instead of paths
        #[arg(long)]
        count: bool,

        /// List directories instead of files
        #[arg(long)]
        dirs: bool,

        #[arg(long, default_value_t = 4)]
        depth: usize,
    },

    /// Files in the given ensembles indexed since a date
    Manifest {
        /// Ensemble names, or `all`
        #[arg(long, value_delimiter = ',', required = true)]
        ensemble: Vec<String>,

        #[arg(long)]
        since: NaiveDate,
    },

    /// Write one CSV row per indexed file
    ExportCsv {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum EnsembleCommand {
    /// Create an ensemble unless it already exists
    Create {
        #[arg(long)]
        name: String,

        #[arg(long = "version", id = "ensemble_version")]
        ensemble_version: f64,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, default_value = "")]
        changes: String,
    },
}

fn init_tracing(config: &CataloguerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CataloguerConfig::from_yaml(path)?,
        None => CataloguerConfig::from_env()?,
    }
    .with_overrides(args.database, args.log_level);

    init_tracing(&config)?;
    info!(database = %config.database_url, "Starting cataloguer");

    let catalog = commands::open_catalog(&config).await?;

    match args.command {
        Command::Migrate => Ok(()),
        Command::Index { files } => commands::index(catalog, &config, &files).await,
        Command::Ensemble(EnsembleCommand::Create {
            name,
            ensemble_version,
            description,
            changes,
        }) => {
            commands::create_ensemble(&catalog, &name, ensemble_version, description.as_deref(), &changes)
                .await
        }
        Command::Associate {
            name,
            ensemble_version,
            variables,
            regex,
            paths,
        } => commands::associate(&catalog, &name, ensemble_version, &paths, regex, &variables).await,
        Command::List {
            ensemble,
            multi_variable,
            multi_year_mean,
            mym_concatenated,
            list_ensembles,
            count,
            dirs,
            depth,
        } => {
            let filter = catalog::FileFilter {
                ensemble,
                multi_variable,
                multi_year_mean,
                mym_concatenated,
            };
            let mode = if dirs {
                commands::ListMode::Dirs { depth }
            } else if count {
                commands::ListMode::Count { by_ensemble: list_ensembles }
            } else if list_ensembles {
                commands::ListMode::WithEnsembles
            } else {
                commands::ListMode::Files
            };
            commands::list(&catalog, &filter, mode).await
        }
        Command::Manifest { ensemble, since } => commands::manifest(&catalog, &ensemble, since).await,
        Command::ExportCsv { output } => commands::export_csv(&catalog, output.as_deref()).await,
    }
}
