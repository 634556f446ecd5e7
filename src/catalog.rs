//! Curriculum catalog: numbered principle directories and their parts.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::CatalogConfig;
use crate::types::{CatalogWarning, Document, slash_path};

/// `NN-slug`, the principle directory convention.
static PRINCIPLE_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2})-([a-z0-9][a-z0-9-]*)$").expect("valid regex"));

/// A numeric prefix that does not follow the convention, like `5-objects`.
static NEAR_MISS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+-\S+$").expect("valid regex"));

/// One numbered curriculum unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipleNode {
    /// `checklist.md` in the principle directory.
    pub checklist: Option<PathBuf>,
    /// The principle directory, relative to the root.
    pub dir: PathBuf,
    /// Documents under the matching `<slug>-examples/` directory.
    pub examples: Vec<PathBuf>,
    /// Documents under the matching `<NN>-<slug>/` exercise directory.
    pub exercises: Vec<PathBuf>,
    /// Required parts that were not found.
    pub missing: Vec<String>,
    /// Position in the curriculum.
    pub ordinal: u32,
    /// Every other document below the principle directory.
    pub others: Vec<PathBuf>,
    /// `README.md` in the principle directory.
    pub readme: Option<PathBuf>,
    /// Name part of the directory, after the ordinal.
    pub slug: String,
    /// Title of the README, if it has a heading.
    pub title: Option<String>,
}

impl PrincipleNode {
    /// A node with missing parts is reported but never fails a run.
    pub fn is_incomplete(&self) -> bool {
        return !self.missing.is_empty();
    }
}

/// Ordered curriculum and the naming deviations found while building it.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Nodes sorted by ordinal, then slug.
    pub principles: Vec<PrincipleNode>,
    /// Duplicate ordinals and near-miss directory names.
    pub warnings: Vec<CatalogWarning>,
}

impl Catalog {
    /// Nodes with at least one missing part, in curriculum order.
    pub fn incomplete(&self) -> impl Iterator<Item = &PrincipleNode> {
        return self.principles.iter().filter(|p| return p.is_incomplete());
    }
}

/// Group documents into principle nodes.
///
/// A principle directory matches `NN-slug`, is not inside the exercises
/// directory, and is not nested inside another principle directory.
/// Deviations from the convention produce warnings, never errors.
pub fn build(documents: &[Document], config: &CatalogConfig) -> Catalog {
    let known: BTreeSet<&Path> = documents.iter().map(|d| return d.relative.as_path()).collect();
    let mut catalog = Catalog::default();
    let mut accepted: Vec<PathBuf> = Vec::new();

    for dir in collect_directories(documents) {
        if dir.starts_with(&config.exercises_dir) || accepted.iter().any(|p| dir.starts_with(p)) {
            continue;
        }
        let Some(name) = dir.file_name().and_then(|n| return n.to_str()) else {
            continue;
        };

        let Some((ordinal, slug)) = parse_principle_dir_name(name) else {
            if NEAR_MISS.is_match(name) {
                catalog.warnings.push(CatalogWarning {
                    path: dir.clone(),
                    reason: format!("`{name}` has a numeric prefix but does not match `NN-slug`; not cataloged"),
                });
            }
            continue;
        };

        let node = assemble_principle_node(documents, &known, config, &dir, name, ordinal, slug);
        accepted.push(dir);
        catalog.principles.push(node);
    }

    catalog.principles.sort_by(|a, b| {
        return (a.ordinal, &a.slug, &a.dir).cmp(&(b.ordinal, &b.slug, &b.dir));
    });
    warn_on_duplicate_ordinals(&mut catalog);

    tracing::debug!(
        principles = catalog.principles.len(),
        incomplete = catalog.incomplete().count(),
        "catalog built"
    );
    return catalog;
}

/// Split `05-objects` into `(5, "objects")`.
pub fn parse_principle_dir_name(name: &str) -> Option<(u32, String)> {
    let cap = PRINCIPLE_DIR.captures(name)?;
    let ordinal = cap.get(1)?.as_str().parse().ok()?;
    return Some((ordinal, cap.get(2)?.as_str().to_string()));
}

/// Every directory that contains at least one document, parents first.
fn collect_directories(documents: &[Document]) -> BTreeSet<PathBuf> {
    let mut dirs = BTreeSet::new();
    for document in documents {
        for ancestor in document.relative.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }
    return dirs;
}

/// Attach README, checklist, examples, exercises and leftovers to one node.
fn assemble_principle_node(
    documents: &[Document],
    known: &BTreeSet<&Path>,
    config: &CatalogConfig,
    dir: &Path,
    name: &str,
    ordinal: u32,
    slug: String,
) -> PrincipleNode {
    let readme_path = dir.join("README.md");
    let checklist_path = dir.join("checklist.md");
    let stem = config.aliases.get(&slug).map_or(slug.as_str(), String::as_str);
    let examples_dir = config.examples_dir.join(format!("{stem}-examples"));
    let exercises_dir = config.exercises_dir.join(name);

    let under = |prefix: &Path| -> Vec<PathBuf> {
        return documents
            .iter()
            .filter(|d| return d.relative.starts_with(prefix))
            .map(|d| return d.relative.clone())
            .collect();
    };

    let examples = under(examples_dir.as_path());
    let exercises = under(exercises_dir.as_path());
    let others = under(dir)
        .into_iter()
        .filter(|p| return *p != readme_path && *p != checklist_path)
        .collect();

    let mut missing: Vec<String> = config
        .required_files
        .iter()
        .filter(|f| return !known.contains(dir.join(f.as_str()).as_path()))
        .cloned()
        .collect();
    if config.require_examples && examples.is_empty() {
        missing.push(format!("{}/", slash_path(&examples_dir)));
    }
    if config.require_exercises && exercises.is_empty() {
        missing.push(format!("{}/", slash_path(&exercises_dir)));
    }

    let title = documents
        .iter()
        .find(|d| return d.relative == readme_path)
        .and_then(|d| return d.title.clone());

    return PrincipleNode {
        checklist: known.contains(checklist_path.as_path()).then_some(checklist_path.clone()),
        dir: dir.to_path_buf(),
        examples,
        exercises,
        missing,
        ordinal,
        others,
        readme: known.contains(readme_path.as_path()).then_some(readme_path.clone()),
        slug,
        title,
    };
}

/// Warn once per directory that reuses an ordinal already taken.
fn warn_on_duplicate_ordinals(catalog: &mut Catalog) {
    let mut first_by_ordinal: BTreeMap<u32, &Path> = BTreeMap::new();
    for node in &catalog.principles {
        match first_by_ordinal.get(&node.ordinal) {
            Some(first) => catalog.warnings.push(CatalogWarning {
                path: node.dir.clone(),
                reason: format!(
                    "ordinal {:02} is already used by {}",
                    node.ordinal,
                    slash_path(first)
                ),
            }),
            None => {
                first_by_ordinal.insert(node.ordinal, &node.dir);
            },
        }
    }
    catalog.warnings.sort_by(|a, b| return a.path.cmp(&b.path));
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test helpers")]
mod tests {
    use super::*;
    use crate::hasher;

    fn doc(path: &str) -> Document {
        return Document {
            content: Some(Vec::new()),
            digest: hasher::hash_content(b""),
            kind: crate::grammar::kind_for_path(Path::new(path)),
            relative: PathBuf::from(path),
            size: 0,
            title: path.ends_with("README.md").then(|| return format!("Title of {path}")),
        };
    }

    fn catalog_of(paths: &[&str]) -> Catalog {
        let docs: Vec<Document> = paths.iter().map(|p| return doc(p)).collect();
        return build(&docs, &CatalogConfig::default());
    }

    #[test]
    fn missing_readme_is_incomplete_not_fatal() {
        let catalog = catalog_of(&["principles/05-objects/checklist.md"]);
        assert_eq!(catalog.principles.len(), 1);
        let node = catalog.principles.first().unwrap();
        assert_eq!(node.ordinal, 5);
        assert_eq!(node.slug, "objects");
        assert_eq!(node.missing, vec!["README.md"]);
        assert!(node.is_incomplete());
        assert_eq!(node.checklist, Some(PathBuf::from("principles/05-objects/checklist.md")));
    }

    #[test]
    fn parts_are_attached_by_convention() {
        let catalog = catalog_of(&[
            "principles/02-functions/README.md",
            "principles/02-functions/checklist.md",
            "principles/02-functions/notes/extra.md",
            "examples/before-after/functions-examples/long-bad.py",
            "examples/before-after/functions-examples/small-good.py",
            "exercises/principle-practice/02-functions/exercise.md",
            "examples/before-after/naming-examples/functions-good.py",
        ]);
        assert_eq!(catalog.principles.len(), 1, "exercise directory must not become a principle");
        let node = catalog.principles.first().unwrap();
        assert!(!node.is_incomplete());
        assert_eq!(node.title.as_deref(), Some("Title of principles/02-functions/README.md"));
        assert_eq!(node.examples.len(), 2);
        assert_eq!(
            node.exercises,
            vec![PathBuf::from("exercises/principle-practice/02-functions/exercise.md")]
        );
        assert_eq!(node.others, vec![PathBuf::from("principles/02-functions/notes/extra.md")]);
    }

    #[test]
    fn aliases_map_slug_to_example_directory() {
        let docs: Vec<Document> = [
            "principles/01-meaningful-names/README.md",
            "examples/before-after/naming-examples/functions-bad.py",
        ]
        .iter()
        .map(|p| return doc(p))
        .collect();
        let mut config = CatalogConfig::default();
        config.aliases.insert("meaningful-names".to_string(), "naming".to_string());
        config.require_examples = true;
        config.required_files = vec!["README.md".to_string()];

        let catalog = build(&docs, &config);
        let node = catalog.principles.first().unwrap();
        assert_eq!(node.examples.len(), 1);
        assert!(!node.is_incomplete());
    }

    #[test]
    fn required_examples_and_exercises_are_reported() {
        let docs = vec![doc("principles/03-comments/README.md"), doc("principles/03-comments/checklist.md")];
        let config = CatalogConfig { require_examples: true, require_exercises: true, ..CatalogConfig::default() };
        let catalog = build(&docs, &config);
        assert_eq!(
            catalog.principles.first().unwrap().missing,
            vec![
                "examples/before-after/comments-examples/",
                "exercises/principle-practice/03-comments/",
            ]
        );
    }

    #[test]
    fn sorted_by_ordinal_then_slug_with_duplicate_warning() {
        let catalog = catalog_of(&[
            "b/10-systems/README.md",
            "a/02-zeta/README.md",
            "c/02-alpha/README.md",
            "01-names/README.md",
        ]);
        let order: Vec<(u32, &str)> =
            catalog.principles.iter().map(|p| return (p.ordinal, p.slug.as_str())).collect();
        assert_eq!(order, vec![(1, "names"), (2, "alpha"), (2, "zeta"), (10, "systems")]);
        assert_eq!(catalog.warnings.len(), 1);
        let warning = catalog.warnings.first().unwrap();
        assert_eq!(warning.path, PathBuf::from("a/02-zeta"));
        assert!(warning.reason.contains("c/02-alpha"));
    }

    #[test]
    fn near_miss_names_warn_and_nested_matches_are_skipped() {
        let catalog = catalog_of(&[
            "principles/5-objects/README.md",
            "principles/06-errors/README.md",
            "principles/06-errors/01-basics/README.md",
        ]);
        assert_eq!(catalog.principles.len(), 1);
        assert_eq!(catalog.principles.first().unwrap().others.len(), 1);
        assert_eq!(catalog.warnings.len(), 1);
        assert_eq!(catalog.warnings.first().unwrap().path, PathBuf::from("principles/5-objects"));
    }

    #[test]
    fn directory_name_parsing() {
        assert_eq!(parse_principle_dir_name("01-meaningful-names"), Some((1, "meaningful-names".to_string())));
        assert_eq!(parse_principle_dir_name("1-names"), None);
        assert_eq!(parse_principle_dir_name("01-Names"), None);
        assert_eq!(parse_principle_dir_name("names"), None);
    }
}
