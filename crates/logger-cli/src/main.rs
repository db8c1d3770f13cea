//! Stream Logger - record data points offline and sync them in the background.

mod commands;
mod logging;
mod paths;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Stream logger command-line interface.
#[derive(Parser)]
#[command(name = "stream-logger")]
#[command(about = "Buffer data points locally and sync them to a time-series service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Logger database. Defaults to ~/.stream-logger/logger.sqlite
    #[arg(long, global = true, env = "STREAM_LOGGER_DB")]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or open the store and set connection settings
    Init {
        /// API key for the remote service
        #[arg(long)]
        credential: Option<String>,
        /// Remote service URL
        #[arg(long)]
        url: Option<String>,
        /// Seconds between background syncs
        #[arg(long)]
        period: Option<f64>,
    },
    /// Register a stream
    Register {
        stream: String,
        /// JSON schema used to create the stream remotely
        #[arg(long)]
        schema: Option<String>,
        /// Register locally without contacting the service
        #[arg(long)]
        force: bool,
    },
    /// Buffer one JSON value for a stream
    Record { stream: String, value: String },
    /// Upload everything buffered now
    Sync,
    /// Show buffered counts and settings
    Status,
    /// Read or replace the application data blob
    Data {
        /// New JSON value
        #[arg(long)]
        set: Option<String>,
    },
    /// Sync in the background until interrupted
    Run,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init_logging(&cli.log_level);

    let db = match cli.db {
        Some(path) => path,
        None => paths::default_database_path()?,
    };

    match cli.command {
        Commands::Init {
            credential,
            url,
            period,
        } => commands::init(&db, credential, url, period),
        Commands::Register {
            stream,
            schema,
            force,
        } => commands::register(&db, &stream, schema.as_deref(), force),
        Commands::Record { stream, value } => commands::record(&db, &stream, &value),
        Commands::Sync => commands::sync(&db),
        Commands::Status => commands::status(&db),
        Commands::Data { set } => commands::data(&db, set.as_deref()),
        Commands::Run => commands::run(&db),
    }
}
