use anyhow::{Context, Result};
use clap::Parser;
use pipetime::cli::{Cli, Command, OutputFormat};
use pipetime::config::PipetimeConfig;
use pipetime::report;
use pipetime::snapshot::MetricsSnapshot;
use serde::Serialize;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<PipetimeConfig> {
    match &cli.config {
        Some(path) => PipetimeConfig::from_file(path),
        None => Ok(PipetimeConfig::default()),
    }
}

fn write_json<T: Serialize, W: Write>(out: &mut W, value: &T, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let path = cli.command.snapshot_path();
    let snapshot = MetricsSnapshot::from_file(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        operations = snapshot.timeline.len(),
        "snapshot loaded"
    );

    let pretty = config.export.pretty;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match (&cli.command, cli.format) {
        (Command::Summary { .. }, OutputFormat::Text) => {
            report::write_summary(&snapshot, &mut out)?
        }
        (Command::Summary { .. }, OutputFormat::Json) => {
            write_json(&mut out, &snapshot.summary, pretty)?
        }
        (Command::Timeline { .. }, OutputFormat::Text) => {
            report::write_timeline(&snapshot, &mut out)?
        }
        (Command::Timeline { .. }, OutputFormat::Json) => {
            write_json(&mut out, &snapshot.timeline, pretty)?
        }
        (Command::Breakdown { .. }, OutputFormat::Text) => {
            report::write_breakdown(&snapshot, &mut out)?
        }
        (Command::Breakdown { .. }, OutputFormat::Json) => {
            write_json(&mut out, &snapshot.category_breakdown(), pretty)?
        }
        (Command::Stacked { resolution, .. }, format) => {
            let resolution = resolution.unwrap_or(config.timeline.resolution_secs);
            let grid = snapshot
                .stacked_timeline(resolution)
                .context("Failed to build stacked timeline")?;
            match format {
                OutputFormat::Text => report::write_stacked(&grid, &mut out)?,
                OutputFormat::Json => write_json(&mut out, &grid, pretty)?,
            }
        }
    }

    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    run(cli)
}
