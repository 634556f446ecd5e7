//! Core CLI commands for doclinks: validate and catalog.

use std::path::Path;
use std::process::ExitCode;

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::catalog;
use crate::config::{Config, Overrides};
use crate::error::Error;
use crate::extractor::{self, Extraction};
use crate::index;
use crate::report::{self, Format, ValidationReport};
use crate::scanner;

/// Scan, extract, index, and catalog the root, then print the report.
/// Nothing is written to stdout until every phase has finished.
///
/// # Errors
///
/// Returns root, config, and pool errors, or `Error::Cancelled`.
pub fn validate(root: &Path, overrides: &Overrides, format: Format, cancel: &CancelToken) -> Result<ExitCode, Error> {
    scanner::check_root(root)?;
    let config = Config::load(root, overrides)?;
    let report = run_validation(root, &config, cancel)?;

    print!("{}", report::render(&report, format));
    return Ok(report.exit_code());
}

/// Print the curriculum structure. Always exits 0 once the scan succeeds.
///
/// # Errors
///
/// Returns root, config, and pool errors, or `Error::Cancelled`.
pub fn catalog(root: &Path, overrides: &Overrides, format: Format, cancel: &CancelToken) -> Result<ExitCode, Error> {
    scanner::check_root(root)?;
    let config = Config::load(root, overrides)?;
    let pool = build_pool(&config)?;
    let snapshot = scanner::scan(root, &config, &pool, cancel)?;
    let catalog = catalog::build(&snapshot.documents, &config.catalog);

    print!("{}", report::render_catalog(&catalog, format));
    return Ok(ExitCode::SUCCESS);
}

/// Run every phase against an already loaded config.
///
/// # Errors
///
/// Returns `Error::ThreadPool`, scan errors, or `Error::Cancelled`.
pub fn run_validation(root: &Path, config: &Config, cancel: &CancelToken) -> Result<ValidationReport, Error> {
    tracing::debug!(
        root = %root.display(),
        concurrency = config.concurrency,
        ignore = ?config.ignore_patterns,
        "validating"
    );
    let pool = build_pool(config)?;
    let snapshot = scanner::scan(root, config, &pool, cancel)?;

    let extractions: Vec<Extraction> = pool.install(|| {
        return snapshot.documents.par_iter().map(extractor::extract).collect();
    });
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let mut links = Vec::new();
    let mut parse_warnings = Vec::new();
    for extraction in extractions {
        links.extend(extraction.links);
        parse_warnings.extend(extraction.warnings);
    }
    tracing::debug!(links = links.len(), warnings = parse_warnings.len(), "extraction complete");

    let index = index::build(&snapshot.documents, &links, config);
    let catalog = catalog::build(&snapshot.documents, &config.catalog);
    let report = report::assemble(&snapshot, &parse_warnings, &index, &catalog);

    tracing::info!(
        broken = report.summary.broken,
        orphans = report.summary.orphans,
        incomplete = report.summary.incomplete,
        "validation complete"
    );
    return Ok(report);
}

/// Worker pool sized by the configured concurrency.
///
/// # Errors
///
/// Returns `Error::ThreadPool` if the threads cannot be spawned.
fn build_pool(config: &Config) -> Result<rayon::ThreadPool, Error> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.concurrency)
        .thread_name(|i| return format!("doclinks-{i}"))
        .build()?;
    return Ok(pool);
}
