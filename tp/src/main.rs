//! tp - collaborative trip planner
//!
//! Headless driver over the planner session: watch live plans, print
//! reports and month grids, and make edits from the command line.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{info, warn};

use tripplanner::cli::{Cli, Command};
use tripplanner::config::Config;
use tripplanner::domain::PlanCollection;
use tripplanner::session::{PlannerSession, SessionContext};
use tripplanner::sync::SyncEvent;

fn setup_logging(level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to log file, not stdout/stderr
    let level: tracing::Level = level
        .parse()
        .map_err(|_| eyre::eyre!("Invalid log level '{}', use TRACE, DEBUG, INFO, WARN or ERROR", level))?;
    let log_file = fs::File::create(log_dir.join("tripplanner.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI > config > INFO
    let level = cli
        .log_level
        .clone()
        .or_else(|| Config::load_log_level(cli.config.as_ref()))
        .unwrap_or_else(|| "INFO".to_string());
    setup_logging(&level).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        "tp loaded config: store={:?}, identity={:?}, collection={}",
        config.store.backend,
        config.identity.provider,
        config.collection_path()
    );

    let context = SessionContext::start(&config)
        .await
        .context("Failed to start planner session")?;
    let mut session = PlannerSession::new(context.clone());
    if let Some(warning) = context.identity_warning() {
        eprintln!("{} {}", "Warning:".yellow(), warning);
    }

    let ready_timeout = Duration::from_millis(config.store.timeout_ms);
    let result = match cli.command {
        Command::Watch => cmd_watch(&mut session).await,
        Command::Report { from, to } => cmd_report(&mut session, ready_timeout, from, to).await,
        Command::Set {
            date,
            title,
            description,
        } => cmd_set(&mut session, ready_timeout, date, title, description).await,
        Command::Delete { date } => cmd_delete(&mut session, ready_timeout, date).await,
        Command::Month { offset } => cmd_month(&mut session, ready_timeout, offset).await,
    };

    context.teardown().await;
    result
}

async fn ready(session: &mut PlannerSession, timeout: Duration) -> Result<()> {
    if let Err(e) = session.wait_ready(timeout).await {
        let detail = session.state().error_message.clone().unwrap_or_else(|| e.to_string());
        return Err(eyre::eyre!("No plans received from the store: {}", detail));
    }
    Ok(())
}

/// Print every snapshot until Ctrl-C or until the store ends the feed
async fn cmd_watch(session: &mut PlannerSession) -> Result<()> {
    println!(
        "Watching plans as {} (Ctrl-C to stop)",
        session.identity().user_id.cyan()
    );
    if let Some(err) = session.state().error_message.clone() {
        eprintln!("{} {}", "Error:".red(), err);
    }

    let mut plans = session.context().engine().plans();
    if plans.borrow_and_update().is_loaded() {
        print_snapshot(&plans.borrow());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("cmd_watch: interrupted");
                break;
            }
            changed = plans.changed() => {
                if changed.is_err() {
                    warn!("cmd_watch: plan feed closed");
                    break;
                }
                let snapshot = plans.borrow_and_update().clone();
                print_snapshot(&snapshot);
            }
            event = session.next_event() => match event {
                Some(SyncEvent::SubscriptionFailed { message }) => {
                    eprintln!("{} {}", "Error:".red(), message);
                }
                Some(SyncEvent::WriteFailed { message, .. }) => {
                    eprintln!("{} {}", "Write failed:".red(), message);
                }
                Some(SyncEvent::SubscriptionClosed) | None => {
                    warn!("cmd_watch: subscription ended");
                    return Err(eyre::eyre!("Live updates stopped by the store"));
                }
                Some(SyncEvent::SnapshotApplied { .. }) => {}
            },
        }
    }

    Ok(())
}

fn print_snapshot(plans: &PlanCollection) {
    println!();
    println!(
        "{} revision {} ({} plans)",
        "Snapshot".bold(),
        plans.revision(),
        plans.len()
    );
    let mut entries: Vec<_> = plans.iter().collect();
    entries.sort_by_key(|(key, _)| **key);
    for (key, plan) in entries {
        let title = if plan.title().is_empty() { "(untitled)" } else { plan.title() };
        println!("  {}  {}  {}", key.to_string().cyan(), title.bold(), plan.last_updated_by.dimmed());
    }
}

async fn cmd_report(session: &mut PlannerSession, timeout: Duration, from: NaiveDate, to: NaiveDate) -> Result<()> {
    ready(session, timeout).await?;
    session.open_print_picker();
    session.set_print_range(from, to);
    session.show_report()?;

    let report = &session.state().report;
    println!("{} {} to {}", "Trip plans".bold(), from, to);
    if report.is_empty() {
        println!("  No plans in this range");
    }
    for entry in report {
        println!();
        println!("{}", entry.date.format("%A, %B %-d, %Y").to_string().cyan());
        if !entry.plan.title().is_empty() {
            println!("  {}", entry.plan.title().bold());
        }
        for line in entry.plan.description().lines() {
            println!("  {}", line);
        }
    }
    session.close_report();
    Ok(())
}

async fn cmd_set(
    session: &mut PlannerSession,
    timeout: Duration,
    date: NaiveDate,
    title: Option<String>,
    description: Option<String>,
) -> Result<()> {
    if title.is_none() && description.is_none() {
        return Err(eyre::eyre!("Nothing to set: pass --title and/or --description"));
    }
    ready(session, timeout).await?;

    session.select_date(date);
    if let Some(title) = title {
        session.set_draft_title(title);
    }
    if let Some(description) = description {
        session.set_draft_description(description);
    }
    session.commit_draft().await?;

    println!("{} plan for {}", "Saved".green(), date);
    Ok(())
}

async fn cmd_delete(session: &mut PlannerSession, timeout: Duration, date: NaiveDate) -> Result<()> {
    ready(session, timeout).await?;
    session.select_date(date);
    session.delete_selected().await?;

    println!("{} plan for {}", "Deleted".green(), date);
    Ok(())
}

async fn cmd_month(session: &mut PlannerSession, timeout: Duration, offset: i32) -> Result<()> {
    ready(session, timeout).await?;
    session.navigate_month(offset);

    let grid = session.month_grid();
    println!("{}", session.state().nav_month.label().bold());
    println!("Mo Tu We Th Fr Sa Su");

    let lead = grid
        .first()
        .map(|(key, _)| key.to_date().weekday().num_days_from_monday())
        .unwrap_or(0);
    let mut line = "   ".repeat(lead as usize);
    for (key, marked) in &grid {
        let date = key.to_date();
        let cell = format!("{:>2}", date.day());
        if *marked {
            line.push_str(&cell.green().bold().to_string());
        } else {
            line.push_str(&cell);
        }
        if date.weekday().num_days_from_monday() == 6 {
            println!("{}", line.trim_end());
            line.clear();
        } else {
            line.push(' ');
        }
    }
    if !line.trim().is_empty() {
        println!("{}", line.trim_end());
    }

    let plans: Arc<PlanCollection> = session.plans();
    for (key, _) in grid.iter().filter(|(_, marked)| *marked) {
        if let Some(plan) = plans.get(key) {
            println!("  {}  {}", key.to_string().green(), plan.title());
        }
    }
    Ok(())
}
