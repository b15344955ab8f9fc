// painscout-cli: command-line frontend for painscout
// Argument parsing, config resolution, logging setup, exit codes

mod cli;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use painscout_core::lock::lock_status;
use painscout_core::{
    GenerateInput, MarkOutcome, NewPainpoint, PainpointStore, QueryPatch, QueryStatus, QueryStore,
    StoreConfig, StoreError, summarize,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Environment variable naming the config file when `--config` is absent.
const CONFIG_ENV: &str = "PAINSCOUT_CONFIG";

/// A failed command, tagged with what it was working on.
struct Failure {
    target: &'static str,
    error: StoreError,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.error.is_contention() {
            write!(
                f,
                "Could not acquire lock for {} file. Try again later.",
                self.target
            )
        } else {
            write!(f, "Error ({}): {}", self.target, self.error)
        }
    }
}

fn tag<E: Into<StoreError>>(target: &'static str) -> impl Fn(E) -> Failure {
    move |error| Failure {
        target,
        error: error.into(),
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

/// `--config` wins over `$PAINSCOUT_CONFIG`; neither means defaults.
fn load_config(flag: Option<PathBuf>) -> Result<StoreConfig, StoreError> {
    match flag.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from)) {
        Some(path) => StoreConfig::load(&path),
        None => Ok(StoreConfig::default()),
    }
}

/// Advisory only: painpoints may reference ids the query store lacks.
fn warn_if_unknown_query(queries: &Path, query_id: u64, config: &StoreConfig) {
    match QueryStore::new(queries, config).get(query_id) {
        Ok(Some(_)) => {}
        Ok(None) => log::warn!(
            "query {} not found in {}; recording painpoint anyway",
            query_id,
            queries.display()
        ),
        Err(e) => log::warn!("could not read {}: {}", queries.display(), e),
    }
}

fn run(cli: Cli) -> Result<(), Failure> {
    let config = load_config(cli.config).map_err(tag("config"))?;

    match cli.command {
        Command::GenQueries { inputs, queries } => {
            let input = GenerateInput::from_path(&inputs).map_err(tag("inputs"))?;
            let report = QueryStore::new(&queries, &config)
                .generate(&input)
                .map_err(tag("queries"))?;
            println!(
                "Generated {} new queries (file: {}).",
                report.added.len(),
                queries.display()
            );
        }

        Command::ListQueries {
            queries,
            status,
            limit,
        } => {
            let records = QueryStore::new(&queries, &config)
                .list(status.as_deref(), limit)
                .map_err(tag("queries"))?;
            output::print_queries(&records).map_err(tag("output"))?;
        }

        Command::AddPainpoint {
            queries,
            painpoints,
            query_id,
            url,
            quote,
            author,
        } => {
            if let Some(queries) = &queries {
                warn_if_unknown_query(queries, query_id, &config);
            }
            let record = PainpointStore::new(&painpoints, &config)
                .add(&NewPainpoint {
                    query_id,
                    url,
                    quote,
                    author,
                })
                .map_err(tag("painpoints"))?;
            println!(
                "Appended painpoint id={} to {}",
                record.painpoint_id().unwrap_or_default(),
                painpoints.display()
            );
        }

        Command::MarkSearched {
            queries,
            query_id,
            date_searched,
            num_results,
            num_painpoints,
            status,
        } => {
            let patch = QueryPatch {
                date_searched: Some(date_searched.unwrap_or_else(painscout_core::today)),
                num_results,
                num_painpoints,
                status: status
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .map(QueryStatus::from),
            };
            match QueryStore::new(&queries, &config)
                .mark_searched(query_id, &patch)
                .map_err(tag("queries"))?
            {
                MarkOutcome::Updated(_) => println!("Updated query {}", query_id),
                MarkOutcome::NotFound => eprintln!(
                    "No query with id {} found in {}",
                    query_id,
                    queries.display()
                ),
            }
        }

        Command::Summary {
            queries,
            painpoints,
        } => {
            let summary = summarize(
                &QueryStore::new(&queries, &config),
                &PainpointStore::new(&painpoints, &config),
            )
            .map_err(tag("stores"))?;
            print!("{}", summary);
        }

        Command::ListPainpoints {
            painpoints,
            query_id,
        } => {
            let records = PainpointStore::new(&painpoints, &config)
                .list(query_id)
                .map_err(tag("painpoints"))?;
            output::print_painpoints(&records).map_err(tag("output"))?;
        }

        Command::LockStatus { store } => {
            let status = lock_status(&store, config.lock.stale_after());
            println!("{}: {}", store.display(), status);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            eprintln!("{}", failure);
            ExitCode::FAILURE
        }
    }
}
