//! Cross-reference resolution: links to documents, broken links, orphans.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use crate::config::Config;
use crate::types::{Document, Link, LinkKind};

/// A file link whose target exists in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// The link as extracted.
    pub link: Link,
    /// Relative path of the target document.
    pub target: PathBuf,
}

/// A file link whose target is not in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    /// Normalized path the link was resolved to and not found at.
    pub attempted: PathBuf,
    /// The link as extracted.
    pub link: Link,
}

/// Resolution of every link against one snapshot.
/// A pure function of its inputs: the same documents and links always
/// produce the same index, in the same order.
#[derive(Debug, Default)]
pub struct CrossReferenceIndex {
    /// Links with no file destination (anchors).
    pub anchors: usize,
    /// File links with no matching document, sorted by source, line, raw text.
    pub broken: Vec<BrokenLink>,
    /// Links to other sites. Never resolved.
    pub external: usize,
    /// Count of resolved links targeting each document.
    pub incoming: BTreeMap<PathBuf, usize>,
    /// Documents nothing links to, excluding the entry and exempt patterns.
    pub orphans: Vec<PathBuf>,
    /// File links that matched a document, sorted like `broken`.
    pub resolved: Vec<ResolvedLink>,
}

impl CrossReferenceIndex {
    /// Total number of links that took part in the index.
    pub fn link_count(&self) -> usize {
        return self
            .resolved
            .len()
            .saturating_add(self.broken.len())
            .saturating_add(self.external)
            .saturating_add(self.anchors);
    }
}

/// Resolve every link and derive broken links and orphans.
///
/// File links are normalized against their source document's directory (or
/// the root for `/`-prefixed paths) and matched by exact relative-path
/// equality. With `directory_readme` enabled, a link to a directory also
/// resolves to that directory's `README.md`.
pub fn build(documents: &[Document], links: &[Link], config: &Config) -> CrossReferenceIndex {
    let known: BTreeSet<&Path> = documents.iter().map(|d| return d.relative.as_path()).collect();
    let mut index = CrossReferenceIndex::default();

    for document in documents {
        index.incoming.insert(document.relative.clone(), 0);
    }

    for link in links {
        let path = match &link.kind {
            LinkKind::Anchor(fragment) => {
                tracing::trace!(source = %link.source.display(), %fragment, "anchor not verified");
                index.anchors = index.anchors.saturating_add(1);
                continue;
            },
            LinkKind::External(url) => {
                tracing::trace!(source = %link.source.display(), %url, "external link skipped");
                index.external = index.external.saturating_add(1);
                continue;
            },
            LinkKind::File { path, anchor } => {
                if let Some(fragment) = anchor {
                    tracing::trace!(%path, %fragment, "fragment not verified");
                }
                path
            },
        };

        let attempted = resolution_path(&link.source, path);
        match match_document(&known, &attempted, config.directory_readme) {
            Some(target) => {
                if let Some(count) = index.incoming.get_mut(&target) {
                    *count = count.saturating_add(1);
                }
                index.resolved.push(ResolvedLink { link: link.clone(), target });
            },
            None => index.broken.push(BrokenLink { attempted, link: link.clone() }),
        }
    }

    index.broken.sort_by(|a, b| return link_order(&a.link, &b.link));
    index.resolved.sort_by(|a, b| return link_order(&a.link, &b.link));

    let entry = normalize_path(&config.entry);
    index.orphans = documents
        .iter()
        .map(|d| return &d.relative)
        .filter(|relative| {
            let unlinked = index.incoming.get(*relative).copied().unwrap_or(0) == 0;
            return unlinked && **relative != entry && !config.is_orphan_exempt(relative);
        })
        .cloned()
        .collect();
    index.orphans.sort();

    tracing::debug!(
        resolved = index.resolved.len(),
        broken = index.broken.len(),
        orphans = index.orphans.len(),
        "cross-reference index built"
    );
    return index;
}

/// Normalized root-relative path a file link points at.
pub fn resolution_path(source: &Path, path: &str) -> PathBuf {
    if let Some(rooted) = path.strip_prefix('/') {
        return normalize_path(Path::new(rooted));
    }
    let source_dir = source.parent().unwrap_or(Path::new(""));
    return normalize_path(&source_dir.join(path));
}

/// Look the attempted path up, falling back to a directory README if enabled.
fn match_document(known: &BTreeSet<&Path>, attempted: &Path, directory_readme: bool) -> Option<PathBuf> {
    if known.contains(attempted) {
        return Some(attempted.to_path_buf());
    }
    if directory_readme {
        let readme = attempted.join("README.md");
        if known.contains(readme.as_path()) {
            return Some(readme);
        }
    }
    return None;
}

/// Deterministic ordering of links: source, line, raw destination.
fn link_order(a: &Link, b: &Link) -> std::cmp::Ordering {
    return (&a.source, a.line, &a.raw).cmp(&(&b.source, b.line, &b.raw));
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
/// Preserves leading `..` when there is nothing left to pop, so a link that
/// climbs out of the root never matches a document.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        push_normalized_component(&mut components, component);
    }
    return components.iter().collect();
}

/// Handle a single path component during normalization.
/// Pops the last component for `..` when possible, preserves it otherwise.
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {},
        Component::ParentDir => {
            let can_pop = matches!(components.last(), Some(c) if !matches!(c, Component::ParentDir));
            if can_pop {
                components.pop();
            } else {
                components.push(component);
            }
        },
        other => components.push(other),
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test helpers")]
mod tests {
    use super::*;
    use crate::config::Overrides;
    use crate::extractor;
    use crate::hasher;
    use crate::types::DocumentKind;

    fn doc(path: &str, body: &str) -> Document {
        return Document {
            content: Some(body.as_bytes().to_vec()),
            digest: hasher::hash_content(body.as_bytes()),
            kind: crate::grammar::kind_for_path(Path::new(path)),
            relative: PathBuf::from(path),
            size: 0,
            title: None,
        };
    }

    fn links_of(documents: &[Document]) -> Vec<Link> {
        return documents.iter().flat_map(|d| return extractor::extract(d).links).collect();
    }

    fn default_config() -> Config {
        return Config::with_overrides(&Overrides::default()).unwrap();
    }

    fn index_of(documents: &[Document]) -> CrossReferenceIndex {
        return build(documents, &links_of(documents), &default_config());
    }

    #[test]
    fn missing_sibling_is_broken_with_attempted_path() {
        let docs = vec![doc("principles/01-names/README.md", "[checklist](./checklist.md)\n")];
        let index = index_of(&docs);
        assert_eq!(index.broken.len(), 1);
        let broken = index.broken.first().unwrap();
        assert_eq!(broken.attempted, PathBuf::from("principles/01-names/checklist.md"));
        assert_eq!(broken.link.raw, "./checklist.md");
    }

    #[test]
    fn mutual_links_leave_no_orphans() {
        let docs = vec![doc("a.md", "[b](b.md)\n"), doc("b.md", "[a](a.md)\n")];
        let index = index_of(&docs);
        assert!(index.broken.is_empty());
        assert!(index.orphans.is_empty());
        assert_eq!(index.resolved.len(), 2);
    }

    #[test]
    fn entry_document_is_exempt_from_orphans() {
        let docs = vec![doc("README.md", "# Root\n"), doc("orphan.md", "# Alone\n")];
        let index = index_of(&docs);
        assert_eq!(index.orphans, vec![PathBuf::from("orphan.md")]);
    }

    #[test]
    fn entry_override_is_normalized() {
        let docs = vec![doc("docs/index.md", ""), doc("README.md", "")];
        let overrides = Overrides { entry: Some(PathBuf::from("./docs/index.md")), ..Overrides::default() };
        let config = Config::with_overrides(&overrides).unwrap();
        let index = build(&docs, &links_of(&docs), &config);
        assert_eq!(index.orphans, vec![PathBuf::from("README.md")]);
    }

    #[test]
    fn parent_and_root_relative_paths_resolve() {
        let docs = vec![
            doc("README.md", "[guide](/docs/guide.md)\n"),
            doc("docs/guide.md", "[home](../README.md) [snippet](../examples/bad.java)\n"),
            doc("examples/bad.java", "class Bad {}\n"),
        ];
        let index = index_of(&docs);
        assert!(index.broken.is_empty(), "{:?}", index.broken);
        assert!(index.orphans.is_empty());
        assert_eq!(index.incoming.get(Path::new("examples/bad.java")), Some(&1));
    }

    #[test]
    fn escaping_the_root_is_broken() {
        let docs = vec![doc("README.md", "[up](../../outside.md)\n")];
        let index = index_of(&docs);
        assert_eq!(index.broken.first().unwrap().attempted, PathBuf::from("../../outside.md"));
    }

    #[test]
    fn anchors_are_not_verified_and_externals_are_skipped() {
        let docs = vec![
            doc("README.md", "[x](b.md#no-such-heading) [y](#local) [z](https://example.com)\n"),
            doc("b.md", ""),
        ];
        let index = index_of(&docs);
        assert!(index.broken.is_empty());
        assert_eq!(index.resolved.len(), 1);
        assert_eq!(index.anchors, 1);
        assert_eq!(index.external, 1);
        assert_eq!(index.link_count(), 3);
    }

    #[test]
    fn directory_links_need_the_readme_option() {
        let docs = vec![
            doc("README.md", "[names](principles/01-names/)\n"),
            doc("principles/01-names/README.md", ""),
        ];
        assert_eq!(index_of(&docs).broken.len(), 1);

        let config = Config::parse("directory_readme = true\n", None).unwrap();
        let index = build(&docs, &links_of(&docs), &config);
        assert!(index.broken.is_empty());
        assert_eq!(
            index.resolved.first().unwrap().target,
            PathBuf::from("principles/01-names/README.md")
        );
    }

    #[test]
    fn self_links_count_as_incoming() {
        let docs = vec![doc("README.md", ""), doc("loop.md", "[me](loop.md)\n")];
        assert!(index_of(&docs).orphans.is_empty());
    }

    #[test]
    fn exempt_patterns_are_not_orphans() {
        let docs = vec![doc("README.md", ""), doc("img/a.png", ""), doc("note.md", "")];
        let config = Config::parse("orphan_exempt = [\"img/**\"]\n", None).unwrap();
        let index = build(&docs, &links_of(&docs), &config);
        assert_eq!(index.orphans, vec![PathBuf::from("note.md")]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let docs = vec![
            doc("a.md", "[x](missing-2.md)\n[y](missing-1.md)\n"),
            doc("b.md", "[z](a.md)\n"),
        ];
        let mut links = links_of(&docs);
        let first = build(&docs, &links, &default_config());
        links.reverse();
        let second = build(&docs, &links, &default_config());
        assert_eq!(first.broken, second.broken);
        assert_eq!(first.resolved, second.resolved);
        assert_eq!(first.orphans, second.orphans);
        assert_eq!(first.broken.first().unwrap().link.line, 1);
    }

    #[test]
    fn normalize_keeps_leading_parent() {
        assert_eq!(normalize_path(Path::new("a/./b/../c.md")), PathBuf::from("a/c.md"));
        assert_eq!(normalize_path(Path::new("../x/../y.md")), PathBuf::from("../y.md"));
        assert_eq!(doc("x.rs", "").kind, DocumentKind::Snippet("Rust"));
    }
}
