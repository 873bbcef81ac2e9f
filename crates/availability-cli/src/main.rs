//! availctl entry point.

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use availability_engine::{
    bucketize_with, region_matches_in, AvailabilityRecord, EngineConfig, Interval, OffsetAnchor,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde_json::{json, Value};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String> {
    let config = match cli.config {
        Some(ref path) => EngineConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let input = cli.input;
    let output = execute(cli.command, || load_record(input.as_deref()), &config)?;

    Ok(serde_json::to_string_pretty(&output)?)
}

/// Run one command. The record is only loaded by commands that need it.
fn execute<F>(command: Command, load: F, config: &EngineConfig) -> Result<Value>
where
    F: FnOnce() -> Result<AvailabilityRecord>,
{
    let value = match command {
        Command::Add { day, start, end } => {
            serde_json::to_value(load()?.add_interval(&day, Interval::new(start, end))?)?
        }
        Command::AddSession { day, start } => serde_json::to_value(load()?.add_session(&day, start)?)?,
        Command::Remove { day, slot } => serde_json::to_value(load()?.remove_interval(&day, slot)?)?,
        Command::Blocks { day } => {
            let blocks: Vec<Value> = load()?
                .day_selections
                .day_blocks(&day)?
                .into_iter()
                .map(|iv| json!({ "start": iv.start, "end": iv.end, "label": iv.label() }))
                .collect();
            Value::Array(blocks)
        }
        Command::Convert { to, at } => {
            let record = load()?;
            let anchor = match at {
                Some(at) => OffsetAnchor::At(parse_instant(Some(&at))?),
                None => OffsetAnchor::DayNoon,
            };
            let converted = record
                .with_time_zone(&to, anchor)
                .with_context(|| format!("converting from {} to {}", record.time_zone, to))?;
            serde_json::to_value(converted)?
        }
        Command::Earliest { now } => {
            let now = parse_instant(now.as_deref())?;
            let record = load()?;
            let earliest = record.earliest_available(now, config);
            json!({
                "earliest": earliest.map(|at| at.to_rfc3339()),
                "bucket": earliest.map(|at| bucketize_with(at, now, &config.buckets).as_str()),
            })
        }
        Command::Region { region, at } => {
            let at = parse_instant(at.as_deref())?;
            let record = load()?;
            let matches = region_matches_in(&config.regions, &record.time_zone, &region, at);
            json!({ "timeZone": record.time_zone, "region": region, "matches": matches })
        }
        Command::Zones { at } => serde_json::to_value(config.zone_options(parse_instant(at.as_deref())?))?,
    };
    Ok(value)
}

fn load_record(input: Option<&Path>) -> Result<AvailabilityRecord> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading record from stdin")?;
            buf
        }
    };
    let record: AvailabilityRecord =
        serde_json::from_str(&text).context("parsing availability record")?;
    debug!(time_zone = %record.time_zone, days = record.day_selections.day_count(), "loaded record");
    Ok(record)
}

/// Parse an RFC 3339 instant, or take the current time when none is given.
fn parse_instant(s: Option<&str>) -> Result<DateTime<Utc>> {
    match s {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("invalid instant '{s}'")),
        None => Ok(Utc::now()),
    }
}
