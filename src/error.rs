/// Crate-level error types for doclinks diagnostics.
use std::path::PathBuf;

/// Fatal errors only. Per-file and per-document problems are collected as
/// warnings in the report and never surface through this type.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The scan was cancelled between files.
    #[error("scan cancelled")]
    Cancelled,

    /// The config file parsed as TOML but holds a value that cannot be used.
    #[error("invalid config {}: {reason}", path.display())]
    ConfigInvalid {
        /// Config file that holds the bad value.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// An ignore or exemption pattern is not a valid glob.
    #[error("invalid glob `{pattern}`: {reason}")]
    InvalidGlob {
        /// The pattern as written by the user.
        pattern: String,
        /// Description of the syntax problem.
        reason: String,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// The root path exists but is not a directory.
    #[error("root is not a directory: {}", path.display())]
    RootNotDirectory {
        /// Path given on the command line.
        path: PathBuf,
    },

    /// The root path does not exist or cannot be accessed.
    #[error("root not found: {}", path.display())]
    RootNotFound {
        /// Path given on the command line.
        path: PathBuf,
    },

    /// The worker pool could not be created.
    #[error("thread pool: {0}")]
    ThreadPool(
        /// The wrapped pool construction error.
        #[from]
        rayon::ThreadPoolBuildError,
    ),

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// The filesystem watcher could not be set up.
    #[error("watch: {0}")]
    Watch(
        /// The wrapped watcher error.
        #[from]
        notify::Error,
    ),
}
