//! CLI command definitions and subcommands

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::domain::DayKey;

/// tp - collaborative trip planner
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Shared trip calendar with live plan sync",
    version,
    after_help = "Logs are written to: ~/.local/share/tripplanner/logs/tripplanner.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Print every plan snapshot as it arrives until Ctrl-C
    Watch,

    /// Print the plans between two dates
    Report {
        /// First day (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: NaiveDate,

        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: NaiveDate,
    },

    /// Create or update the plan for a day
    Set {
        /// Day (YYYY-MM-DD)
        #[arg(value_parser = parse_date)]
        date: NaiveDate,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete the plan for a day
    Delete {
        /// Day (YYYY-MM-DD)
        #[arg(value_parser = parse_date)]
        date: NaiveDate,
    },

    /// Show a month with planned days marked
    Month {
        /// Months away from the current one
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        offset: i32,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    DayKey::parse(s).map(DayKey::to_date).map_err(|e| e.to_string())
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs")
        .join("tripplanner.log")
}
