//! Subcommand handlers. Each opens the store, does its work and closes it.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use stream_logger::{Logger, SyncOutcome};
use tracing::info;

fn open(db: &Path) -> Result<Logger> {
    Logger::open(db).with_context(|| format!("failed to open logger store at {}", db.display()))
}

fn parse_json(label: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text).with_context(|| format!("{label} is not valid JSON: {text}"))
}

fn parse_period(seconds: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(anyhow!("period must be a positive number of seconds, got {seconds}")),
    }
}

fn format_timestamp(seconds: f64) -> String {
    if seconds <= 0.0 {
        return "never".to_string();
    }
    let nanos = (seconds.fract() * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(seconds.trunc() as i64, nanos)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| seconds.to_string())
}

pub fn init(db: &Path, credential: Option<String>, url: Option<String>, period: Option<f64>) -> Result<()> {
    let created = Arc::new(AtomicBool::new(false));
    let flag = created.clone();

    let mut builder = Logger::builder(db).on_create(move |_| {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });
    if let Some(credential) = credential {
        builder = builder.credential(credential);
    }
    let logger = builder
        .open()
        .with_context(|| format!("failed to open logger store at {}", db.display()))?;

    if let Some(url) = url {
        logger.set_endpoint_url(&url)?;
    }
    if let Some(seconds) = period {
        logger.set_sync_period(parse_period(seconds)?)?;
    }

    if created.load(Ordering::SeqCst) {
        println!("Created logger store at {}", db.display());
    } else {
        println!("Updated logger store at {}", db.display());
    }
    logger.close()?;
    Ok(())
}

pub fn register(db: &Path, stream: &str, schema: Option<&str>, force: bool) -> Result<()> {
    let schema = schema.map(|text| parse_json("schema", text)).transpose()?;
    let logger = open(db)?;

    if force {
        logger.register_without_verification(stream, schema)?;
    } else {
        logger.register(stream, schema)?;
    }

    println!("Registered stream '{stream}'");
    logger.close()?;
    Ok(())
}

pub fn record(db: &Path, stream: &str, value: &str) -> Result<()> {
    let value = parse_json("value", value)?;
    let logger = open(db)?;

    let timestamp = logger.record(stream, &value)?;
    println!("Recorded to '{stream}' at {}", format_timestamp(timestamp));
    logger.close()?;
    Ok(())
}

pub fn sync(db: &Path) -> Result<()> {
    let logger = open(db)?;

    match logger.sync()? {
        SyncOutcome::Completed(report) => println!(
            "Uploaded {} points from {} streams",
            report.points_uploaded, report.streams_synced
        ),
        SyncOutcome::Suppressed => println!("Sync failed; see log for details"),
    }
    logger.close()?;
    Ok(())
}

pub fn status(db: &Path) -> Result<()> {
    let logger = open(db)?;

    println!("Store:       {}", db.display());
    println!("Endpoint:    {}", logger.endpoint_url()?);
    let credential = if logger.credential()?.is_empty() { "not set" } else { "set" };
    println!("Credential:  {credential}");
    println!("Sync period: {}s", logger.sync_period()?.as_secs_f64());
    println!("Last sync:   {}", format_timestamp(logger.last_sync_time()?));
    println!("Pending:     {}", logger.pending_count()?);

    let streams = logger.streams()?;
    if !streams.is_empty() {
        println!("Streams:");
        for stream in streams {
            let schema = match &stream.schema {
                Some(schema) => schema.to_string(),
                None => "-".to_string(),
            };
            println!(
                "  {:<20} {:>6} pending  schema {}",
                stream.name,
                logger.pending_count_for(&stream.name)?,
                schema
            );
        }
    }
    logger.close()?;
    Ok(())
}

pub fn data(db: &Path, set: Option<&str>) -> Result<()> {
    let logger = open(db)?;

    if let Some(text) = set {
        logger.set_user_data(parse_json("data", text)?)?;
    }
    println!("{}", serde_json::to_string_pretty(&logger.user_data()?)?);
    logger.close()?;
    Ok(())
}

pub fn run(db: &Path) -> Result<()> {
    let logger = open(db)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, shutdown.clone())
            .with_context(|| format!("failed to install handler for signal {signal}"))?;
    }

    logger.start()?;
    let period = logger.sync_period()?;
    info!(period_secs = period.as_secs_f64(), db = %db.display(), "Background sync running");
    println!("Syncing every {}s, press Ctrl-C to stop", period.as_secs_f64());

    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(200));
    }

    info!("Received shutdown signal, exiting...");
    logger.close()?;
    Ok(())
}
