//! CLI argument definitions.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `verify` | Run `VerifySolvency` for one or more subjects |
//! | `fixtures` | List the built-in directory subjects |
//!
//! # Examples
//!
//! ```bash
//! solvency verify client-001 client-002 --pretty
//! solvency verify client-001 --repeat 3 --metrics
//! SOLVENCY_DIRECTORY_URL=http://directory.internal solvency verify client-042
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "solvency",
    author,
    version,
    about = "Loan solvency verification gateway",
    long_about = "Verifies loan applicants by combining identity, financial and credit history \
lookups into a scored solvency decision with plain-language explanations.\n\
\n\
Configuration is read from SOLVENCY_* environment variables; flags override them."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log filter (e.g. `debug`); defaults to `RUST_LOG`, then `warn`.
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify solvency for one or more subjects.
    Verify(VerifyArgs),
    /// List the subjects known to the built-in directory.
    Fixtures,
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Subject identifiers (`client-XXX`). Passed through verbatim.
    #[arg(required = true, value_name = "SUBJECT_ID")]
    pub subjects: Vec<String>,

    /// Verify every subject this many times against the same gateway.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,

    /// Include the metrics snapshot in the output.
    #[arg(long, default_value_t = false)]
    pub metrics: bool,

    /// Include the metrics in Prometheus text exposition format.
    #[arg(long, default_value_t = false)]
    pub prometheus: bool,

    /// Directory base URL; the in-memory fixtures are used when unset.
    #[arg(long, value_name = "URL")]
    pub directory_url: Option<String>,

    #[arg(long, value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    #[arg(long, value_name = "ENTRIES")]
    pub cache_max_entries: Option<usize>,

    /// Per-attempt directory deadline.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,
}
