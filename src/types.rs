/// Core domain types shared by every pipeline phase.
use std::path::{Path, PathBuf};

use serde::Serialize;

/// One scanned file. Created by the scanner and never modified afterwards.
#[derive(Debug, Clone)]
pub struct Document {
    /// Raw file bytes. `None` when the file exceeded the size limit.
    pub content: Option<Vec<u8>>,
    /// SHA-256 of `content`, or of nothing when the content was not loaded.
    pub digest: ContentHash,
    /// Markdown, source snippet, or anything else.
    pub kind: DocumentKind,
    /// Path relative to the scan root.
    pub relative: PathBuf,
    /// File size in bytes as reported by the filesystem.
    pub size: u64,
    /// First heading of a markdown document.
    pub title: Option<String>,
}

impl Document {
    /// Whether the link extractor should look at this document.
    pub fn is_markdown(&self) -> bool {
        return matches!(self.kind, DocumentKind::Markdown);
    }
}

/// Classification of a document by extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentKind {
    /// `.md` or `.markdown`.
    Markdown,
    /// Anything that is neither markdown nor a known snippet language.
    Other,
    /// An illustrative source file. Holds the language label.
    Snippet(&'static str),
}

/// A SHA-256 digest: 64 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ContentHash(
    /// The hex-encoded digest string.
    pub String,
);

/// A reference from a markdown document to some location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Classified destination.
    pub kind: LinkKind,
    /// Link text between the brackets (or the definition label).
    pub label: String,
    /// One-based line of the link in the source document.
    pub line: u32,
    /// Destination exactly as written in the markdown.
    pub raw: String,
    /// Markdown document containing the link.
    pub source: PathBuf,
}

/// What a link destination points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// `#fragment` within the same document. Never resolved.
    Anchor(String),
    /// Has a URI scheme (`https:`, `mailto:`). Never resolved.
    External(String),
    /// A file in the corpus. Only `path` takes part in resolution.
    File {
        /// Fragment after `#`, if any. Not verified.
        anchor: Option<String>,
        /// Decoded path part. Starts with `/` when root-relative.
        path: String,
    },
}

/// A file that could not become a (complete) document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
    /// File or directory the warning is about, relative to the root.
    pub path: PathBuf,
    /// What went wrong.
    pub reason: String,
}

/// Markdown that could not be fully interpreted for links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// One-based line, when the problem has one.
    pub line: Option<u32>,
    /// Markdown document the warning is about.
    pub path: PathBuf,
    /// What went wrong.
    pub reason: String,
}

/// A principle directory that deviates from the naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogWarning {
    /// Directory the warning is about.
    pub path: PathBuf,
    /// What went wrong.
    pub reason: String,
}

/// Render a relative path with `/` separators on every platform.
pub fn slash_path(path: &Path) -> String {
    return path.to_string_lossy().replace('\\', "/");
}
