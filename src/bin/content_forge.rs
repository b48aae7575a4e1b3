//! content-forge: 批量内容生成引擎命令行工具
//!
//! Usage:
//!   content-forge run [--config <path>]           Start the engine and its schedules
//!   content-forge check-config [--config <path>]  Load and validate a configuration
//!   content-forge next-runs <rule> [count]         Preview a recurrence rule

use anyhow::{bail, Context};
use chrono::Utc;
use content_forge::schedule::Recurrence;
use content_forge::{ContentEngine, EngineConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "run" => cmd_run(&args[2..]),
        "check-config" => cmd_check_config(&args[2..]),
        "next-runs" => cmd_next_runs(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("content-forge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"content-forge: batched content generation engine

USAGE:
    content-forge <COMMAND> [OPTIONS]

COMMANDS:
    run [--config <path>]           Start the engine and its schedules until Ctrl-C
    check-config [--config <path>]  Load, apply environment overrides and validate
    next-runs <rule> [count]        Show the next runs of daily/weekly/bi-weekly/monthly or a cron rule
    version                         Show version information
    help                            Show this help message

ENVIRONMENT:
    CONTENT_FORGE_CONFIG            Configuration file used when --config is absent
    OPENAI_API_KEY                  API key (variable name set by backend.api_key_env)
    RUST_LOG                        Log filter (default: info)"#
    );
}

fn config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            match iter.next() {
                Some(path) => return Ok(Some(PathBuf::from(path))),
                None => bail!("--config requires a path"),
            }
        }
    }
    Ok(std::env::var("CONTENT_FORGE_CONFIG").ok().map(PathBuf::from))
}

fn load_config(args: &[String]) -> anyhow::Result<EngineConfig> {
    let mut config = match config_path(args)? {
        Some(path) => EngineConfig::from_path(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.apply_env().context("applying environment overrides")?;
    config.validate()?;
    Ok(config)
}

fn cmd_check_config(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    println!("configuration OK");
    println!(
        "  batch: max {} requests, flush every {} ms",
        config.batch.max_batch_size, config.batch.flush_interval_ms
    );
    println!(
        "  backend: {} ({}), api key {}",
        config.backend.base_url,
        config.backend.model,
        if config.backend.api_key().is_some() {
            "set"
        } else {
            "missing"
        }
    );
    println!("  schedules: {}", config.schedules.len());
    for schedule in &config.schedules {
        let state = if schedule.active { "active" } else { "inactive" };
        let rule = &schedule.recurrence;
        if !rule.is_valid() {
            println!(
                "    {} [{}] rule '{}' is invalid; daily at 09:00 will be used",
                schedule.id, state, rule
            );
        } else {
            println!("    {} [{}] {}", schedule.id, state, rule);
        }
    }
    Ok(())
}

fn cmd_next_runs(args: &[String]) -> anyhow::Result<()> {
    let Some(rule) = args.first() else {
        bail!("usage: content-forge next-runs <rule> [count]");
    };
    let count = match args.get(1) {
        Some(n) => n.parse::<usize>().context("count must be a number")?,
        None => 5,
    };
    let recurrence = Recurrence::from(rule.as_str());
    if !recurrence.is_valid() {
        bail!("'{}' is not a valid recurrence rule", rule);
    }
    let cron = recurrence.resolve();
    println!("{} ({})", recurrence, cron);
    for at in cron.upcoming(Utc::now(), count) {
        println!("  {}", at.to_rfc3339());
    }
    Ok(())
}

fn cmd_run(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(async move {
        let engine = ContentEngine::builder(config).build()?;
        let installed = engine.start().await?;
        tracing::info!(schedules = installed, "running; press Ctrl-C to stop");

        tokio::signal::ctrl_c()
            .await
            .context("waiting for Ctrl-C")?;

        engine.shutdown();
        if let Some(batch) = engine.process_batch().await {
            tracing::info!(flushed = batch.len(), "flushed pending requests");
        }
        let stats = engine.stats().await;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        Ok(())
    })
}
