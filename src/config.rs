//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use chrono::TimeDelta;
use clap::{Parser, Subcommand};

use crate::{state::NappyKind, tasks::LoopConfig};

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "baby-tracker")]
#[command(about = "Log feeding, sleep and nappy changes with a timer shared across devices")]
#[command(version)]
pub struct Config {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server that owns the shared timer and the activity log
    Serve(ServeArgs),
    /// Follow the shared timer live until interrupted
    Watch {
        #[command(flatten)]
        remote: RemoteArgs,
        /// Seconds between polls of the shared timer
        #[arg(long, default_value = "5")]
        poll_interval_secs: u64,
    },
    /// Start timing an activity (breastfeeding, bottlefeeding, sleeping)
    Start {
        #[command(flatten)]
        remote: RemoteArgs,
        activity: String,
        /// Bottle volume in ml (required for bottle feeding)
        #[arg(short, long)]
        milk_amount: Option<u32>,
    },
    /// Pause the running timer
    Pause {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Resume the paused timer
    Resume {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Stop the timer and log the activity
    Stop {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Log a nappy change
    Nappy {
        #[command(flatten)]
        remote: RemoteArgs,
        #[arg(value_parser = parse_nappy_kind)]
        kind: NappyKind,
    },
    /// Show the shared timer
    Status {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// List recent activities
    History {
        #[command(flatten)]
        remote: RemoteArgs,
        /// Only the latest entries of this type
        #[arg(short = 't', long = "type")]
        type_filter: Option<String>,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct ServeArgs {
    /// Port to bind the server to
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// SQLite database file
    #[arg(long, default_value = "baby_tracker.sqlite")]
    pub db: PathBuf,

    /// How far a client's clock may run ahead before a new timer counts as
    /// starting in the future
    #[arg(long, default_value = "5")]
    pub max_clock_skew_secs: i64,
}

impl ServeArgs {
    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_clock_skew(&self) -> TimeDelta {
        TimeDelta::seconds(self.max_clock_skew_secs.max(0))
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct RemoteArgs {
    /// Base URL of the server
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    pub server: String,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

/// Loop timing for a client polling every `poll_interval_secs`
pub fn loop_config(poll_interval_secs: u64) -> LoopConfig {
    LoopConfig {
        poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
        ..LoopConfig::default()
    }
}

fn parse_nappy_kind(raw: &str) -> Result<NappyKind, String> {
    raw.parse().map_err(|e: crate::error::AppError| e.to_string())
}
