//! `strata` command line

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use strata_cli::Report;
use strata_scenarios::{Clock, SystemClock};
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "strata", version)]
#[command(about = "Layered parameter overlays and query composition for flow graphs")]
struct Cli {
    /// Engine config file (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the flattened composed view of a stack
    Compose {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        stack: PathBuf,
        /// Include hidden scenarios
        #[arg(long)]
        all: bool,
    },
    /// Print a scenario's effective fetch and what-if queries
    Inherit {
        #[arg(long)]
        stack: PathBuf,
        #[arg(long)]
        scenario: String,
    },
    /// Report which items each query would have to fetch
    CacheCheck {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long = "dsl", required = true)]
        dsls: Vec<String>,
        /// Reference date for relative windows (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Validate a param pack against a graph
    ValidatePack {
        #[arg(long)]
        graph: PathBuf,
        #[arg(long)]
        pack: PathBuf,
    },
    /// Print the canonical form of a query
    Parse {
        #[arg(long)]
        dsl: String,
    },
}

fn run(cli: Cli) -> Result<Report> {
    let config = strata_cli::load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Compose { graph, stack, all } => strata_cli::compose_cmd(&graph, &stack, all),
        Command::Inherit { stack, scenario } => strata_cli::inherit_cmd(&stack, &scenario),
        Command::CacheCheck { graph, dsls, today } => {
            let today = today.unwrap_or_else(|| SystemClock.today());
            strata_cli::cache_check_cmd(&graph, &dsls, today, &config)
        }
        Command::ValidatePack { graph, pack } => strata_cli::validate_pack_cmd(&graph, &pack),
        Command::Parse { dsl } => strata_cli::parse_cmd(&dsl),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    strata_cli::init_logging(cli.json);

    match run(cli) {
        Ok(report) => {
            println!("{}", report.text);
            if report.ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "command failed");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
