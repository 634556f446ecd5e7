use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::Error;
use crate::types::slash_path;

/// Name of the optional config file at the scan root.
pub const CONFIG_FILE: &str = ".doclinks.toml";

/// Environment variable holding extra comma-separated ignore globs.
pub const IGNORE_ENV: &str = "VALIDATE_IGNORE_PATTERNS";

/// Directory names that are never scanned, wherever they appear.
const VCS_DIRS: [&str; 3] = [".git", ".hg", ".svn"];

/// Default upper bound on a single file read (16 MiB).
const DEFAULT_MAX_FILE_BYTES: u64 = 16 * 1024 * 1024;

/// Default per-file read timeout in seconds.
const DEFAULT_READ_TIMEOUT_SECS: u64 = 10;

/// Fully merged configuration: defaults, then `.doclinks.toml`, then the
/// environment, then command-line flags.
#[derive(Debug)]
pub struct Config {
    /// Curriculum layout conventions.
    pub catalog: CatalogConfig,
    /// Worker pool size for reads and extraction.
    pub concurrency: usize,
    /// Resolve a link to a directory through its `README.md`.
    pub directory_readme: bool,
    /// Root-relative path of the document exempt from orphan detection.
    pub entry: PathBuf,
    /// Follow symbolic links while walking.
    pub follow_links: bool,
    /// Compiled ignore globs.
    ignore: GlobSet,
    /// Ignore globs as written, kept for logging.
    pub ignore_patterns: Vec<String>,
    /// Files above this size are indexed without content.
    pub max_file_bytes: u64,
    /// Compiled orphan exemption globs.
    orphan_exempt: GlobSet,
    /// Per-file read bound. `None` reads without a bound.
    pub read_timeout: Option<Duration>,
}

/// Directory naming conventions used to assemble principle nodes.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Principle slug to example-directory stem, for slugs that differ.
    pub aliases: BTreeMap<String, String>,
    /// Parent of the `<slug>-examples/` directories.
    pub examples_dir: PathBuf,
    /// Parent of the `<NN>-<slug>/` exercise directories.
    pub exercises_dir: PathBuf,
    /// A principle without an example directory is incomplete.
    pub require_examples: bool,
    /// A principle without an exercise directory is incomplete.
    pub require_exercises: bool,
    /// Files every principle directory must contain.
    pub required_files: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        return Self {
            aliases: BTreeMap::new(),
            examples_dir: PathBuf::from("examples/before-after"),
            exercises_dir: PathBuf::from("exercises/principle-practice"),
            require_examples: false,
            require_exercises: false,
            required_files: vec!["README.md".to_string(), "checklist.md".to_string()],
        };
    }
}

/// Values given on the command line. They win over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// `--concurrency`.
    pub concurrency: Option<usize>,
    /// `--entry`.
    pub entry: Option<PathBuf>,
    /// Every `--ignore`.
    pub ignore: Vec<String>,
}

/// Raw TOML structure for `.doclinks.toml`.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DoclinksTomlConfig {
    catalog: RawCatalog,
    concurrency: Option<usize>,
    directory_readme: bool,
    entry: Option<PathBuf>,
    follow_links: Option<bool>,
    ignore: Vec<String>,
    max_file_bytes: Option<u64>,
    orphan_exempt: Vec<String>,
    read_timeout_secs: Option<u64>,
}

/// Raw `[catalog]` table.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawCatalog {
    aliases: BTreeMap<String, String>,
    examples_dir: Option<PathBuf>,
    exercises_dir: Option<PathBuf>,
    require_examples: bool,
    require_exercises: bool,
    required_files: Option<Vec<String>>,
}

impl Config {
    /// Load config from `.doclinks.toml` in the given root directory and
    /// merge the environment and command-line overrides on top.
    /// A missing file means defaults; a malformed one is an error, never a
    /// silent fallback.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// `Error::TomlDe` if the TOML is malformed,
    /// or `Error::ConfigInvalid`/`Error::InvalidGlob` for unusable values.
    pub fn load(root: &Path, overrides: &Overrides) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let raw: DoclinksTomlConfig = match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DoclinksTomlConfig::default(),
            Err(e) => return Err(Error::Io(e)),
        };

        let env_patterns = std::env::var(IGNORE_ENV).ok();
        return Self::merge(&path, raw, env_patterns.as_deref(), overrides);
    }

    /// Defaults with the given overrides applied, as if no config file existed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidGlob` or `Error::ConfigInvalid` for unusable overrides.
    #[cfg(test)]
    pub fn with_overrides(overrides: &Overrides) -> Result<Self, Error> {
        return Self::merge(Path::new(CONFIG_FILE), DoclinksTomlConfig::default(), None, overrides);
    }

    /// Parse config text directly. Used by tests that exercise file values.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus I/O.
    #[cfg(test)]
    pub fn parse(content: &str, env_patterns: Option<&str>) -> Result<Self, Error> {
        let raw: DoclinksTomlConfig = toml::from_str(content)?;
        return Self::merge(Path::new(CONFIG_FILE), raw, env_patterns, &Overrides::default());
    }

    /// Combine every source into one config.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidGlob` or `Error::ConfigInvalid`.
    fn merge(
        path: &Path,
        raw: DoclinksTomlConfig,
        env_patterns: Option<&str>,
        overrides: &Overrides,
    ) -> Result<Self, Error> {
        let mut ignore_patterns = raw.ignore;
        if let Some(env) = env_patterns {
            ignore_patterns.extend(
                env.split(',').map(str::trim).filter(|p| !p.is_empty()).map(String::from),
            );
        }
        ignore_patterns.extend(overrides.ignore.iter().cloned());

        let concurrency = match overrides.concurrency.or(raw.concurrency) {
            Some(0) => {
                return Err(Error::ConfigInvalid {
                    path: path.to_path_buf(),
                    reason: "concurrency must be at least 1".to_string(),
                });
            },
            Some(n) => n,
            None => std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        };

        let entry = overrides.entry.clone().or(raw.entry).unwrap_or_else(|| PathBuf::from("README.md"));
        if !is_plain_relative(&entry) {
            return Err(Error::ConfigInvalid {
                path: path.to_path_buf(),
                reason: format!("entry must be a relative path inside the root: {}", entry.display()),
            });
        }

        let read_timeout = match raw.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let defaults = CatalogConfig::default();
        let catalog = CatalogConfig {
            aliases: raw.catalog.aliases,
            examples_dir: raw.catalog.examples_dir.unwrap_or(defaults.examples_dir),
            exercises_dir: raw.catalog.exercises_dir.unwrap_or(defaults.exercises_dir),
            require_examples: raw.catalog.require_examples,
            require_exercises: raw.catalog.require_exercises,
            required_files: raw.catalog.required_files.unwrap_or(defaults.required_files),
        };

        return Ok(Self {
            catalog,
            concurrency,
            directory_readme: raw.directory_readme,
            entry,
            follow_links: raw.follow_links.unwrap_or(true),
            ignore: compile_globset(&ignore_patterns)?,
            ignore_patterns,
            max_file_bytes: raw.max_file_bytes.unwrap_or(DEFAULT_MAX_FILE_BYTES),
            orphan_exempt: compile_globset(&raw.orphan_exempt)?,
            read_timeout,
        });
    }

    /// Check whether a path (file or directory) is left out of the scan.
    ///
    /// Version-control directories are always ignored, as is the config file
    /// at the root. Everything else is matched against the ignore globs using
    /// the `/`-separated relative path.
    pub fn should_ignore(&self, relative_path: &Path) -> bool {
        let in_vcs_dir = relative_path.components().any(|c| {
            return matches!(c, Component::Normal(name) if VCS_DIRS.iter().any(|v| name == *v));
        });
        if in_vcs_dir || relative_path == Path::new(CONFIG_FILE) {
            return true;
        }

        return self.ignore.is_match(slash_path(relative_path));
    }

    /// Whether a document is exempt from orphan detection by pattern.
    pub fn is_orphan_exempt(&self, relative_path: &Path) -> bool {
        return self.orphan_exempt.is_match(slash_path(relative_path));
    }
}

/// Build one matcher from a list of globs.
///
/// # Errors
///
/// Returns `Error::InvalidGlob` naming the first pattern that fails to parse.
fn compile_globset(patterns: &[String]) -> Result<GlobSet, Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            return Error::InvalidGlob {
                pattern: pattern.clone(),
                reason: e.to_string(),
            };
        })?;
        builder.add(glob);
    }

    return builder.build().map_err(|e| {
        return Error::InvalidGlob {
            pattern: patterns.join(","),
            reason: e.to_string(),
        };
    });
}

/// A path with only normal components: no root, no `..`, not empty.
fn is_plain_relative(path: &Path) -> bool {
    let mut components = path.components().peekable();
    if components.peek().is_none() {
        return false;
    }
    return components.all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
}
