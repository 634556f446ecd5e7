use std::path::Path;

use crate::config::{CONFIG_FILE, IGNORE_ENV};
use crate::error::Error;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is
/// one, how to fix it.
pub fn render_error(e: &Error) -> String {
    return match e {
        Error::RootNotFound { path } => render_root_not_found(path),
        Error::RootNotDirectory { path } => render_root_not_directory(path),
        Error::InvalidGlob { pattern, reason } => render_invalid_glob(pattern, reason),
        Error::ConfigInvalid { path, reason } => render_config_invalid(path, reason),
        _ => render_generic(e),
    };
}

fn render_generic(e: &Error) -> String {
    return match e {
        Error::TomlDe(e) => format!("\
# Error: Invalid Config

`{CONFIG_FILE}` is not valid TOML or has an unknown key:

{e}
"),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),

        Error::ThreadPool(e) => format!("\
# Error: Worker Pool

Could not start the worker pool: {e}

## Fix

Lower `--concurrency`.
"),

        Error::Watch(e) => format!("\
# Error: Watch

Could not watch the root for changes: {e}
"),

        Error::Cancelled => "\
# Cancelled

The scan was interrupted before any report was produced.
"
        .to_string(),

        // Already handled in render_error, but need exhaustive match.
        _ => format!("\
# Error

{e}
"),
    };
}

fn render_root_not_found(path: &Path) -> String {
    return format!("\
# Error: Root Not Found

`{}` does not exist or cannot be accessed.

## Fix

Pass the directory that holds the documentation:

    doclinks validate path/to/docs
", path.display());
}

fn render_root_not_directory(path: &Path) -> String {
    return format!("\
# Error: Root Not A Directory

`{}` is a file. The root must be a directory.
", path.display());
}

fn render_invalid_glob(pattern: &str, reason: &str) -> String {
    return format!("\
# Error: Invalid Glob

`{pattern}` is not a valid pattern: {reason}

## Fix

Check `--ignore`, `${IGNORE_ENV}`, and the `ignore` and `orphan_exempt`
lists in `{CONFIG_FILE}`.
");
}

fn render_config_invalid(path: &Path, reason: &str) -> String {
    return format!("\
# Error: Invalid Config

`{}`: {reason}
", path.display());
}
