//! CLI argument parsing using clap derive API
//!
//! Every flag here overrides the matching `logtail.toml` value. Flags that are
//! not given leave the configured value untouched, so all fields are optional.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "logtail.toml";

/// logtail -- follow search engine indices like `tail -f`.
///
/// Prints matching documents oldest first, then keeps polling for new ones.
#[derive(Parser, Debug)]
#[command(name = "logtail", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logtail.toml configuration file.
    ///
    /// A missing file is only an error when the path is given explicitly.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Search engine URL (scheme and port are optional).
    #[arg(short, long)]
    pub url: Option<String>,

    /// Regular expression selecting index names.
    #[arg(short, long)]
    pub index_pattern: Option<String>,

    /// Field holding the document timestamp.
    #[arg(short, long)]
    pub timestamp_field: Option<String>,

    /// Output template, e.g. "%@timestamp %host.name %message".
    #[arg(short, long)]
    pub format: Option<String>,

    /// Number of documents fetched by the initial search.
    #[arg(short = 'n', long)]
    pub initial_entries: Option<usize>,

    /// Only show documents at or after this time (YYYY-MM-DD[...]).
    #[arg(short, long)]
    pub after: Option<String>,

    /// Only show documents before this time (YYYY-MM-DD[...]).
    #[arg(short, long)]
    pub before: Option<String>,

    /// Print the initial search results and exit instead of following.
    #[arg(short, long)]
    pub list_only: bool,

    /// Basic auth user.
    #[arg(long)]
    pub user: Option<String>,

    /// Reach the search engine through an SSH tunnel ([user@]host[:port]).
    #[arg(long)]
    pub ssh: Option<String>,

    /// Log every request sent to the search engine (debug level).
    #[arg(long)]
    pub trace_requests: bool,

    /// Increase log verbosity (-v info, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Diagnostic log format.
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Disable colored result lines.
    #[arg(long)]
    pub no_color: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Query terms, joined with spaces (overrides configured terms).
    pub terms: Vec<String>,
}

/// Supported diagnostic log formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line human-readable output.
    Compact,
}

impl LogFormat {
    /// Name used in the `[general]` section.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

impl Cli {
    /// Log level requested by `-v` flags, if any.
    pub fn verbosity_level(&self) -> Option<&'static str> {
        match self.verbose {
            0 => None,
            1 => Some("info"),
            _ => Some("trace"),
        }
    }
}
