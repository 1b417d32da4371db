//! 🚀 tkx-cli: the front door, the bouncer, the maitre d' of tickex.
//!
//! 🎬 *[narrator voice]* "It all started with a cron job and a simple main() function..."
//! 📦 Thin wrapper: parse args, set up logging, load config, run one pipeline,
//! print a table of what happened. The real work lives in the `tkx` crate. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use tkx::app_config::LoggingConfig;
use tkx::{Pipeline, PipelineReport};
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 🎫 Run one tickex ETL pipeline.
#[derive(Debug, Parser)]
#[command(name = "tkx", version)]
struct Args {
    /// Which pipeline to run (e.g. tickets-by-status).
    #[arg(value_parser = parse_pipeline)]
    pipeline: Pipeline,

    /// TOML config file. Used only if it exists; TKX_* env vars fill in the rest.
    #[arg(long, short, default_value = "tkx.toml")]
    config: PathBuf,
}

fn parse_pipeline(raw: &str) -> Result<Pipeline, String> {
    raw.parse::<Pipeline>().map_err(|e| e.to_string())
}

/// 📊 One row per task, plus the SLA verdict when there was one.
fn render_summary(report: &PipelineReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["task", "target", "state", "load"]);
    for outcome in &report.summary.outcomes {
        table.add_row(vec![
            outcome.label.clone(),
            outcome.target.clone(),
            outcome.state.to_string(),
            outcome.load.to_string(),
        ]);
    }
    if report.sla != tkx::SlaRefresh::NotRequested {
        table.add_row(vec![
            "sla".to_string(),
            tkx::sla::SLA_DETAIL_TABLE.to_string(),
            String::new(),
            report.sla.to_string(),
        ]);
    }
    table
}

/// 🪵 Daily-rotated `etl_process.log.YYYY-MM-DD` files, oldest pruned past `max_files`.
fn file_appender(logging: &LoggingConfig) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(logging.file_name.as_str())
        .max_log_files(logging.max_files.max(1))
        .build(&logging.directory)
        .with_context(|| {
            format!(
                "💀 Couldn't open the log file in '{}'. Does the directory exist, and may we write to it?",
                logging.directory.display()
            )
        })
}

/// 📡 Console always, file when enabled. Hold on to the guard: dropping it stops the file writer.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (file_layer, guard) = if logging.file_enabled {
        let (writer, guard) = tracing_appender::non_blocking(file_appender(logging)?);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

/// 🕵️ Sniff the error chain like a truffle pig hunting for connection problems.
fn smells_like_connectivity(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let cause = cause.to_string();
        cause.contains("error sending request")
            || cause.contains("connection refused")
            || cause.contains("Connection refused")
            || cause.contains("tcp connect error")
            || cause.contains("dns error")
            || cause.contains("pool timed out")
    })
}

/// 🚀 main(): the "I pressed F5 and held my breath" moment.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 🔒 the file is optional. env vars alone are a perfectly valid lifestyle.
    let config_file = args
        .config
        .try_exists()
        .with_context(|| {
            format!(
                "💀 Couldn't check whether the config file exists. Maybe a permissions thing, maybe a cwd thing. Was checking here: '{}'",
                args.config.display()
            )
        })?
        .then_some(args.config.as_path());

    // -- 🥚🐔 config first: it decides where the log file goes
    let app_config = tkx::app_config::load_config(config_file)
        .context("💀 In tkx-cli, main, we couldn't load the config. Check the file and the TKX_* env vars.")?;

    // 📡 the guard lives until main returns, so the last lines reach the file
    let log_guard = init_logging(&app_config.logging)?;

    match tkx::run_pipeline(args.pipeline, &app_config).await {
        Ok(report) => {
            println!("{}", render_summary(&report));
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            if smells_like_connectivity(&err) {
                error!(
                    "🔧 hint: looks like a service isn't reachable. \
                    Double-check that the ticketing API and PostgreSQL are actually up. \
                    If you're using Docker, `docker ps` is your friend. ☕"
                );
            }
            // -- 🚽 exit() skips destructors, so flush the file writer by hand
            drop(log_guard);
            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }
}
