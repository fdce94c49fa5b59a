mod cli;
mod commands;

use std::{
    fs::{self, OpenOptions},
    path::Path,
    process::ExitCode,
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

use railnet_core::{
    config::{self, AppConfig},
    Railway,
};

use crate::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{}", render(&output));
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("command failed: {err:#}");
            eprintln!("{}", render(&commands::error_body(&err)));
            ExitCode::from(commands::exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<Value> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => {
            config::ensure_default_config()?;
            AppConfig::load()?
        }
    };
    if let Some(data_file) = cli.data_file {
        config.data_file = data_file;
    }

    init_logging(&config.data_file, cli.verbose)?;
    tracing::debug!(data_file = %config.data_file.display(), "configuration loaded");

    let railway = Railway::from_config(&config)?;
    commands::execute(&railway, cli.command)
}

fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn init_logging(data_file: &Path, verbose: bool) -> Result<()> {
    let log_dir = data_file
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("logs");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("railnet.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(if verbose {
            LevelFilter::TRACE
        } else {
            LevelFilter::WARN
        });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
