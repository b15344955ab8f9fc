//! CLI argument parsing with clap.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// painscout - shared query and painpoint stores for discovery agents
#[derive(Parser, Debug)]
#[command(
    name = "painscout",
    version,
    about = "Shared query and painpoint stores for discovery agents",
    after_help = CLI_AFTER_HELP
)]
pub struct Cli {
    /// TOML config file (defaults to $PAINSCOUT_CONFIG, else built-in defaults)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log lock and write activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate site x phrase queries from an input document
    GenQueries {
        /// JSON document with SITES, KEY_PHRASES and SITE_MAP
        #[arg(long, value_name = "PATH")]
        inputs: PathBuf,
        #[arg(long, value_name = "PATH")]
        queries: PathBuf,
    },

    /// Print queries as CSV
    ListQueries {
        #[arg(long, value_name = "PATH")]
        queries: PathBuf,
        /// Only queries with exactly this status
        #[arg(long)]
        status: Option<String>,
        /// At most this many queries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Record a painpoint found by a query
    AddPainpoint {
        /// Query store, used only to warn about unknown query ids
        #[arg(long, value_name = "PATH")]
        queries: Option<PathBuf>,
        #[arg(long, value_name = "PATH")]
        painpoints: PathBuf,
        #[arg(long)]
        query_id: u64,
        #[arg(long)]
        url: String,
        #[arg(long)]
        quote: String,
        #[arg(long)]
        author: Option<String>,
    },

    /// Mark a query as searched and set its counts
    MarkSearched {
        #[arg(long, value_name = "PATH")]
        queries: PathBuf,
        #[arg(long)]
        query_id: u64,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date_searched: Option<NaiveDate>,
        #[arg(long)]
        num_results: Option<u64>,
        #[arg(long)]
        num_painpoints: Option<u64>,
        #[arg(long)]
        status: Option<String>,
    },

    /// Print totals and the queries with the most painpoints
    Summary {
        #[arg(long, value_name = "PATH")]
        queries: PathBuf,
        #[arg(long, value_name = "PATH")]
        painpoints: PathBuf,
    },

    /// Print painpoints as CSV
    ListPainpoints {
        #[arg(long, value_name = "PATH")]
        painpoints: PathBuf,
        /// Only painpoints for this query
        #[arg(long)]
        query_id: Option<u64>,
    },

    /// Show whether a store's lock token is present
    LockStatus {
        /// Store file (not the .lock file)
        store: PathBuf,
    },
}

const CLI_AFTER_HELP: &str = r#"EXAMPLES:
  painscout gen-queries --inputs inputs.json --queries queries.csv
  painscout list-queries --queries queries.csv --status pending --limit 20
  painscout add-painpoint --queries queries.csv --painpoints painpoints.csv \
      --query-id 12 --url "https://reddit.com/..." --quote "No encuentro repuestos..."
  painscout mark-searched --queries queries.csv --query-id 12 \
      --date-searched 2025-08-09 --num-results 25 --num-painpoints 3
  painscout summary --queries queries.csv --painpoints painpoints.csv

Every mutating command takes the store's lock token (<store>.lock). If the
lock cannot be acquired, the command exits with status 1 without writing."#;
