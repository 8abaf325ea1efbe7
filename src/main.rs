use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use punchr::config::Config;
use punchr::estimator::{AttendanceSnapshot, CompletionEstimator, CompletionStatus};
use punchr::store::{SqliteStore, TaskStore};
use punchr::timeparse;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("punchr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("punchr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn open_store(config: &Config) -> Result<TaskStore> {
    let kv = SqliteStore::open_at(&config.storage.data_dir)
        .context("Failed to open task store")?;
    Ok(TaskStore::new(Arc::new(kv)))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Project {
            effective,
            gross,
            required_hours,
        } => handle_project(effective, gross, *required_hours, config),
        Commands::Tasks => handle_tasks(config).await,
        Commands::Failed => handle_failed(config).await,
        Commands::Cancel { id } => handle_cancel(id, config).await,
        Commands::Debug => handle_debug(config).await,
    }
}

fn handle_project(
    effective: &str,
    gross: &str,
    required_hours: Option<u32>,
    config: &Config,
) -> Result<()> {
    let required_minutes = required_hours
        .map(|h| h * 60)
        .unwrap_or_else(|| config.work.required_minutes());

    let snapshot = AttendanceSnapshot::new(timeparse::parse(effective), timeparse::parse(gross));
    let estimator = CompletionEstimator::new(required_minutes);
    let estimate = estimator.estimate(&snapshot, chrono::Utc::now());

    println!(
        "Effective: {}  Gross: {}  Breaks: {}",
        timeparse::format(snapshot.effective_minutes).cyan(),
        timeparse::format(snapshot.gross_minutes).cyan(),
        timeparse::format(snapshot.break_minutes()).cyan(),
    );

    match estimate.status {
        CompletionStatus::Completed => {
            println!("{}", "Required hours complete.".green().bold());
        }
        CompletionStatus::InProgress => {
            let projected = estimate
                .projected_completion
                .expect("in-progress estimate has a projection")
                .with_timezone(&chrono::Local);
            println!(
                "Remaining: {}  (break rate {:.1}%)",
                timeparse::format(estimate.remaining_minutes).yellow().bold(),
                estimate.break_rate * 100.0,
            );
            println!(
                "Projected completion: {}",
                projected.format("%H:%M").to_string().green().bold()
            );
        }
    }

    let clock_in = estimate.estimated_clock_in.with_timezone(&chrono::Local);
    println!("Estimated clock-in: {}", clock_in.format("%H:%M"));
    Ok(())
}

async fn handle_tasks(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let tasks = store.list_tasks().await?;

    if tasks.is_empty() {
        println!("{}", "No scheduled tasks.".dimmed());
        return Ok(());
    }

    for task in tasks {
        let due = task.due_at.with_timezone(&chrono::Local);
        println!(
            "{}  {}  punch-{}  due {}  [{}]",
            task.id.bold(),
            task.kind.as_str(),
            task.direction.as_str(),
            due.format("%Y-%m-%d %H:%M"),
            task.status.as_str().yellow(),
        );
    }
    Ok(())
}

async fn handle_failed(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let failed = store.failed_tasks().await?;

    if failed.is_empty() {
        println!("{}", "No failed tasks.".green());
        return Ok(());
    }

    for record in failed {
        let when = record.failed_at.with_timezone(&chrono::Local);
        println!(
            "{}  {}  punch-{}  {}",
            when.format("%Y-%m-%d %H:%M").to_string().bold(),
            record.task.id,
            record.task.direction.as_str(),
            record.reason.red(),
        );
    }
    Ok(())
}

async fn handle_cancel(id: &str, config: &Config) -> Result<()> {
    let store = open_store(config)?;

    // The alarm itself lives in the host automation process; removing the
    // record is enough, because a fired alarm re-validates against storage
    // and exits when its record is gone.
    let key = if id.starts_with("task-") || id == "auto-clockout" {
        id.to_string()
    } else {
        format!("task-{}", id)
    };

    match store.get_task(&key).await? {
        Some(task) => {
            store.remove(&key).await?;
            println!("{} {}", "Cancelled".green(), task.id);
        }
        None => println!("{} {}", "No such task:".red(), id),
    }
    Ok(())
}

async fn handle_debug(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let entries = store.entries().await?;

    println!("{} ({} entries)", "Storage".bold(), entries.len());
    for (key, value) in entries {
        println!("  {} = {}", key.cyan(), value);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    run_application(&cli, &config).await
}
