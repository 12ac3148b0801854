//! CLI-specific error types and exit code mapping

use logtail_core::error::LogtailError;
use logtail_engine::TailError;

/// CLI-specific error type.
///
/// Every failure in the process ends up here and is reported once by `main`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// The search engine could not be reached.
    #[error("{0}")]
    Unreachable(String),

    /// The SSH tunnel could not be opened.
    #[error("{0}")]
    Tunnel(String),

    /// Searching or printing results failed.
    #[error("{0}")]
    Search(String),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Setup failure outside the domain crates (logging, runtime).
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                    |
    /// |------|----------------------------|
    /// | 0    | Success                    |
    /// | 1    | General / search error     |
    /// | 2    | Configuration error        |
    /// | 3    | Search engine unreachable  |
    /// | 4    | SSH tunnel failure         |
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Unreachable(_) => 3,
            Self::Tunnel(_) => 4,
            Self::Search(_) | Self::Io(_) | Self::Internal(_) => 1,
        }
    }
}

impl From<LogtailError> for CliError {
    fn from(e: LogtailError) -> Self {
        match e {
            LogtailError::Config(inner) => Self::Config(inner.to_string()),
            LogtailError::Io(io) => Self::Io(io),
        }
    }
}

impl From<TailError> for CliError {
    fn from(e: TailError) -> Self {
        match e {
            TailError::Unreachable { .. } => Self::Unreachable(e.to_string()),
            TailError::Tunnel(_) => Self::Tunnel(e.to_string()),
            TailError::Output(io) => Self::Io(io),
            other => Self::Search(other.to_string()),
        }
    }
}
