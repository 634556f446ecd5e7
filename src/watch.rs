//! File watcher: validates on startup, then re-validates on changes under the root.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use notify::{RecursiveMode, Watcher as _};

use crate::cancel::CancelToken;
use crate::commands;
use crate::config::{Config, Overrides};
use crate::diagnostics;
use crate::error::Error;
use crate::report::Format;
use crate::scanner;

/// Debounce delay between filesystem events and re-validation.
const DEBOUNCE_MS: u64 = 100;

/// How often the idle loop checks for cancellation.
const POLL_MS: u64 = 250;

/// Create a filesystem watcher that forwards the paths of content changes.
///
/// # Errors
///
/// Returns `Error::Watch` if the watcher cannot be created.
fn create_watcher(tx: crossbeam_channel::Sender<Vec<PathBuf>>) -> Result<notify::RecommendedWatcher, Error> {
    let watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_) | notify::EventKind::Modify(_) | notify::EventKind::Remove(_)
            )
        {
            let _ = tx.send(event.paths);
        }
    })?;
    return Ok(watcher);
}

/// Whether any changed path is one the scan would look at.
/// The config file itself counts, since it changes what is scanned.
fn is_relevant(root: &Path, config: &Config, paths: &[PathBuf]) -> bool {
    return paths.iter().any(|path| {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        return relative == Path::new(crate::config::CONFIG_FILE) || !config.should_ignore(relative);
    });
}

/// Entry point for the watch command.
///
/// Runs an initial validation, then watches the root recursively and
/// re-validates after each burst of relevant changes.
///
/// # Errors
///
/// Returns root and config errors, `Error::Watch` if watching fails,
/// or `Error::Cancelled` once cancellation is requested.
pub fn run(root: &Path, overrides: &Overrides, format: Format, cancel: &CancelToken) -> Result<ExitCode, Error> {
    scanner::check_root(root)?;
    let root = root.canonicalize()?;
    let mut config = Config::load(&root, overrides)?;

    eprintln!("watch: initial validation");
    let mut last_code = run_validate(&root, overrides, format, cancel)?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    eprintln!("watch: monitoring {}, press Ctrl+C to stop", root.display());

    let poll = Duration::from_millis(POLL_MS);
    let debounce = Duration::from_millis(DEBOUNCE_MS);
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let paths = match rx.recv_timeout(poll) {
            Ok(paths) => paths,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let mut relevant = is_relevant(&root, &config, &paths);
        while let Ok(more) = rx.recv_timeout(debounce) {
            relevant = relevant || is_relevant(&root, &config, &more);
        }
        if !relevant {
            tracing::debug!("ignoring change to ignored paths");
            continue;
        }

        eprintln!("watch: change detected, re-validating...");
        last_code = run_validate(&root, overrides, format, cancel)?;
        config = reload_config(&root, overrides, config);
    }

    return Ok(last_code);
}

/// Re-read the config so event filtering follows edits to the ignore list.
/// A config that no longer loads keeps the previous one; the validation run
/// has already reported the error.
fn reload_config(root: &Path, overrides: &Overrides, current: Config) -> Config {
    return match Config::load(root, overrides) {
        Ok(config) => config,
        Err(e) => {
            tracing::debug!(error = %e, "keeping previous watch filter");
            current
        },
    };
}

/// Validate once and print the result. Errors other than cancellation are
/// printed and reported as exit code 2 so the watch keeps going.
///
/// # Errors
///
/// Returns `Error::Cancelled` if the run was interrupted.
fn run_validate(root: &Path, overrides: &Overrides, format: Format, cancel: &CancelToken) -> Result<ExitCode, Error> {
    return match commands::validate(root, overrides, format, cancel) {
        Ok(code) => Ok(code),
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Err(e) => {
            diagnostics::print_error(&e);
            Ok(ExitCode::from(2_u8))
        },
    };
}
