use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use rayon::ThreadPool;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::Error;
use crate::extractor;
use crate::grammar;
use crate::hasher;
use crate::types::{Document, ScanWarning};

/// Immutable result of one scan. Every later phase reads from this and
/// nothing re-reads the filesystem.
#[derive(Debug)]
pub struct Snapshot {
    /// Documents sorted by relative path.
    pub documents: Vec<Document>,
    /// Files that were skipped or only partially loaded.
    pub warnings: Vec<ScanWarning>,
}

/// A regular file found during the walk, not yet read.
struct Candidate {
    /// Absolute (or root-joined) path used for reading.
    absolute: PathBuf,
    /// Path relative to the scan root.
    relative: PathBuf,
    /// Size from the walk metadata.
    size: u64,
}

/// Scan every regular file under `root` and load it as a document.
/// The walk is sequential and sorted; reads fan out on `pool`.
/// A file that cannot be read is skipped with a warning instead of failing
/// the scan.
///
/// # Errors
///
/// Returns `Error::RootNotFound` if the root is missing or inaccessible,
/// `Error::RootNotDirectory` if it is a file,
/// or `Error::Cancelled` if `cancel` trips before the scan completes.
pub fn scan(root: &Path, config: &Config, pool: &ThreadPool, cancel: &CancelToken) -> Result<Snapshot, Error> {
    check_root(root)?;

    let (mut candidates, mut warnings) = walk_root_for_candidates(root, config, cancel)?;
    candidates.sort_by(|a, b| return a.relative.cmp(&b.relative));
    tracing::debug!(files = candidates.len(), "walk complete");

    let loaded: Vec<Result<(Option<Document>, Option<ScanWarning>), Error>> = pool.install(|| {
        return candidates
            .par_iter()
            .map(|candidate| return load_candidate(candidate, config, cancel))
            .collect();
    });

    let mut documents = Vec::with_capacity(loaded.len());
    for result in loaded {
        let (document, warning) = result?;
        documents.extend(document);
        warnings.extend(warning);
    }

    warnings.sort_by(|a, b| return a.path.cmp(&b.path).then_with(|| return a.reason.cmp(&b.reason)));
    tracing::info!(documents = documents.len(), warnings = warnings.len(), "scan complete");

    return Ok(Snapshot { documents, warnings });
}

/// Confirm the root exists and is a directory.
///
/// # Errors
///
/// Returns `Error::RootNotFound` or `Error::RootNotDirectory`.
pub fn check_root(root: &Path) -> Result<(), Error> {
    let metadata = std::fs::metadata(root).map_err(|_err| {
        return Error::RootNotFound { path: root.to_path_buf() };
    })?;
    if !metadata.is_dir() {
        return Err(Error::RootNotDirectory { path: root.to_path_buf() });
    }
    return Ok(());
}

/// Walk the tree, pruning ignored directories, and collect regular files.
///
/// # Errors
///
/// Returns `Error::Cancelled` if cancellation is requested during the walk.
fn walk_root_for_candidates(
    root: &Path,
    config: &Config,
    cancel: &CancelToken,
) -> Result<(Vec<Candidate>, Vec<ScanWarning>), Error> {
    let mut candidates = Vec::new();
    let mut warnings = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(config.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let relative = e.path().strip_prefix(root).unwrap_or(e.path());
            return relative.as_os_str().is_empty() || !config.should_ignore(relative);
        });

    for next in walker {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let entry = match next {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(|p| return relative_to(root, p)).unwrap_or_default();
                let reason = describe_walk_error(&e);
                tracing::warn!(path = %path.display(), %reason, "walk error");
                warnings.push(ScanWarning { path, reason });
                continue;
            },
        };

        if !entry.file_type().is_file() {
            if entry.path_is_symlink() && !entry.file_type().is_dir() {
                tracing::debug!(path = %entry.path().display(), "skipping symlink");
            }
            continue;
        }

        let relative = relative_to(root, entry.path());
        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                warnings.push(ScanWarning { path: relative, reason: describe_walk_error(&e) });
                continue;
            },
        };

        candidates.push(Candidate {
            absolute: entry.path().to_path_buf(),
            relative,
            size,
        });
    }

    return Ok((candidates, warnings));
}

/// Read one candidate into a document.
/// Returns the document, a warning, or both for an oversized file.
///
/// # Errors
///
/// Returns `Error::Cancelled` if cancellation was requested before the read.
fn load_candidate(
    candidate: &Candidate,
    config: &Config,
    cancel: &CancelToken,
) -> Result<(Option<Document>, Option<ScanWarning>), Error> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let kind = grammar::kind_for_path(&candidate.relative);

    if candidate.size > config.max_file_bytes {
        let reason = format!(
            "file too large ({} bytes, max {}); indexed without content",
            candidate.size, config.max_file_bytes
        );
        tracing::warn!(path = %candidate.relative.display(), "{reason}");
        let document = Document {
            content: None,
            digest: hasher::hash_content(&[]),
            kind,
            relative: candidate.relative.clone(),
            size: candidate.size,
            title: None,
        };
        return Ok((
            Some(document),
            Some(ScanWarning { path: candidate.relative.clone(), reason }),
        ));
    }

    let bytes = match read_with_timeout(&candidate.absolute, config.read_timeout) {
        Ok(bytes) => bytes,
        Err(reason) => {
            tracing::warn!(path = %candidate.relative.display(), %reason, "skipping unreadable file");
            return Ok((None, Some(ScanWarning { path: candidate.relative.clone(), reason })));
        },
    };

    let title = if matches!(kind, crate::types::DocumentKind::Markdown) {
        extractor::first_heading(&String::from_utf8_lossy(&bytes))
    } else {
        None
    };

    let document = Document {
        digest: hasher::hash_content(&bytes),
        content: Some(bytes),
        kind,
        relative: candidate.relative.clone(),
        size: candidate.size,
        title,
    };
    return Ok((Some(document), None));
}

/// Read a whole file, giving up after `timeout`.
///
/// The read runs on its own thread so a stalled filesystem cannot hold a
/// pool worker forever. A timed-out reader is abandoned; its result is
/// dropped when it eventually finishes.
///
/// # Errors
///
/// Returns a human-readable reason on I/O failure or timeout.
fn read_with_timeout(path: &Path, timeout: Option<Duration>) -> Result<Vec<u8>, String> {
    let Some(timeout) = timeout else {
        return std::fs::read(path).map_err(|e| return e.to_string());
    };

    let (tx, rx) = crossbeam_channel::bounded(1);
    let owned = path.to_path_buf();
    std::thread::Builder::new()
        .name("doclinks-read".to_string())
        .spawn(move || {
            let _ = tx.send(std::fs::read(&owned));
        })
        .map_err(|e| return format!("cannot start reader: {e}"))?;

    return match rx.recv_timeout(timeout) {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(e.to_string()),
        Err(RecvTimeoutError::Timeout) => Err(format!("read timed out after {timeout:?}")),
        Err(RecvTimeoutError::Disconnected) => Err("reader exited without a result".to_string()),
    };
}

/// Describe a walk error, naming symlink loops explicitly.
fn describe_walk_error(e: &walkdir::Error) -> String {
    if let Some(ancestor) = e.loop_ancestor() {
        return format!("symlink loop back to {}", ancestor.display());
    }
    return match e.io_error() {
        Some(io) => io.to_string(),
        None => e.to_string(),
    };
}

/// Strip the root prefix, leaving the path unchanged if it is not under root.
fn relative_to(root: &Path, path: &Path) -> PathBuf {
    return path.strip_prefix(root).unwrap_or(path).to_path_buf();
}
