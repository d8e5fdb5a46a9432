//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use digestor_core::DEFAULT_CONCURRENCY;

/// Turn feed-discovered URLs into plain text.
///
/// Digestor routes each URL to an extraction strategy, escalates and falls
/// back when a strategy comes up short, and remembers URLs nothing could
/// extract.
#[derive(Parser, Debug)]
#[command(name = "digestor")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/digestor/extraction.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract text from URLs given as arguments or on stdin (one per line)
    Extract(ExtractArgs),

    /// Run one URL, bypassing the failure cache, and report plan and attempts
    Test {
        /// URL to extract
        url: String,

        /// Title already known for the page
        #[arg(long)]
        title: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which extractors would handle a URL, without fetching it
    Plan {
        /// URL to plan
        url: String,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// `config` subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
}

/// Arguments for `extract`.
#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
    /// URLs to extract (reads stdin when omitted)
    pub urls: Vec<String>,

    /// Maximum URLs extracted concurrently (1-100)
    #[arg(
        short = 'c',
        long,
        default_value_t = DEFAULT_CONCURRENCY as u8,
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub concurrency: u8,

    /// Print one JSON object per URL instead of a summary line
    #[arg(long)]
    pub json: bool,

    /// Print the metrics report as JSON when done
    #[arg(long)]
    pub metrics: bool,
}
