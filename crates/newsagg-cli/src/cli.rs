//! CLI argument definitions for newsagg.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Search all providers for one keyword query |
//! | `batch` | Run one query per input line against a shared cache |
//! | `providers` | List the configured providers |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | see below | TOML configuration file |
//! | `--format` | `json` | Output format (json, ndjson) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--cache-mode` | `use` | Cache behaviour (use, refresh, bypass) |
//! | `--strict` | `false` | Treat any provider failure as fatal |
//! | `--meta` | `false` | Include cache status and latency |
//!
//! Without `--config`, `$NEWSAGG_CONFIG` and then `config/newsagg.toml` are
//! tried before falling back to the built-in providers.
//!
//! # Examples
//!
//! ```bash
//! newsagg fetch us election --category politics --pretty
//! newsagg fetch climate --preferences prefs.json --meta
//! printf 'rust\nelection date=2024-11-05\n' | newsagg batch --format ndjson
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use newsagg_core::CacheMode;

/// Search several news APIs at once with per-provider caching.
#[derive(Debug, Parser)]
#[command(
    name = "newsagg",
    author,
    version,
    about = "Multi-provider news search CLI"
)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format for results.
    ///
    /// - json: Single JSON document (default)
    /// - ndjson: One JSON object per line
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// How lookups interact with the response cache.
    #[arg(long, global = true, value_enum, default_value_t = CacheModeArg::Use)]
    pub cache_mode: CacheModeArg,

    /// Exit with code 5 when any provider fails or any query is invalid.
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Wrap results as `{data, meta}` with cache status and latency.
    #[arg(long, global = true, default_value_t = false)]
    pub meta: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Ndjson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheModeArg {
    Use,
    Refresh,
    Bypass,
}

impl From<CacheModeArg> for CacheMode {
    fn from(value: CacheModeArg) -> Self {
        match value {
            CacheModeArg::Use => Self::Use,
            CacheModeArg::Refresh => Self::Refresh,
            CacheModeArg::Bypass => Self::Bypass,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search every provider for a keyword.
    Fetch(FetchArgs),
    /// Run many queries concurrently, one per input line.
    Batch(BatchArgs),
    /// List configured providers (API keys are never shown).
    Providers,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Search terms; joined with spaces.
    #[arg(required = true, num_args = 1..)]
    pub keyword: Vec<String>,

    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub source: Option<String>,

    /// JSON or TOML file with preferred `sources` and `categories`.
    #[arg(long, value_name = "FILE")]
    pub preferences: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Query file; reads stdin when omitted.
    ///
    /// Each line holds search terms plus optional `date=`, `category=` and
    /// `source=` tokens. Blank lines and lines starting with `#` are skipped.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// JSON or TOML file with preferred `sources` and `categories`.
    #[arg(long, value_name = "FILE")]
    pub preferences: Option<PathBuf>,

    /// Queries in flight at once.
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,
}
