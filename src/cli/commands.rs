//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - project: run the completion estimator over given time figures
//! - tasks: list scheduled tasks
//! - failed: show the failed-task log
//! - cancel: remove a scheduled task
//! - debug: dump raw storage

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// punchr - attendance punch scheduling and reconciliation
#[derive(Parser, Debug)]
#[command(name = "punchr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project when required hours will be complete
    Project {
        /// Effective time so far, e.g. "4h 42m"
        #[arg(short, long)]
        effective: String,

        /// Gross time so far, e.g. "5h 58m"
        #[arg(short, long)]
        gross: String,

        /// Override the configured required hours
        #[arg(short, long)]
        required_hours: Option<u32>,
    },

    /// List scheduled tasks
    Tasks,

    /// Show the failed-task log
    Failed,

    /// Cancel a scheduled task by id ("auto-clockout" for the automatic one)
    Cancel {
        /// Task id to cancel
        id: String,
    },

    /// Dump raw storage for diagnostics
    Debug,
}
