mod cancel;
mod catalog;
mod commands;
mod config;
mod diagnostics;
mod error;
mod extractor;
mod grammar;
mod hasher;
mod index;
mod report;
mod scanner;
mod types;
mod watch;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::cancel::CancelToken;
use crate::config::Overrides;
use crate::error::Error;
use crate::report::Format;

/// Exit code for an interrupted run.
const EXIT_CANCELLED: u8 = 130;

/// Exit code for invocation and fatal errors.
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(
    name = "doclinks",
    version,
    about = "Validate links in a markdown documentation tree and index its curriculum"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(clap::Args)]
struct ScanArgs {
    /// Root directory of the documentation tree
    root: PathBuf,

    /// Glob of paths to skip, relative to the root (repeatable)
    #[arg(long = "ignore", value_name = "GLOB")]
    ignore: Vec<String>,

    /// Worker threads for reading and parsing
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: Option<u16>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every local link and report broken links, orphans, and incomplete principles
    Validate {
        #[command(flatten)]
        scan: ScanArgs,

        /// Document exempt from orphan detection (default README.md)
        #[arg(long, value_name = "PATH")]
        entry: Option<PathBuf>,
    },
    /// Print the ordered principle structure of the curriculum
    Catalog {
        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Validate, then re-validate whenever files under the root change
    Watch {
        #[command(flatten)]
        scan: ScanArgs,

        /// Document exempt from orphan detection (default README.md)
        #[arg(long, value_name = "PATH")]
        entry: Option<PathBuf>,
    },
}

impl ScanArgs {
    /// Command-line values that override the config file.
    fn overrides(&self, entry: Option<PathBuf>) -> Overrides {
        return Overrides {
            concurrency: self.concurrency.map(usize::from),
            entry,
            ignore: self.ignore.clone(),
        };
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| return tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!(error = %e, "could not install interrupt handler");
    }

    let result = match cli.command {
        Commands::Validate { scan, entry } => {
            commands::validate(&scan.root, &scan.overrides(entry), scan.format, &cancel)
        },
        Commands::Catalog { scan } => commands::catalog(&scan.root, &scan.overrides(None), scan.format, &cancel),
        Commands::Watch { scan, entry } => watch::run(&scan.root, &scan.overrides(entry), scan.format, &cancel),
    };

    return match result {
        Ok(code) => code,
        Err(Error::Cancelled) => {
            eprintln!("cancelled");
            ExitCode::from(EXIT_CANCELLED)
        },
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(EXIT_ERROR)
        },
    };
}
