//! Validation report assembly and rendering.

use std::fmt::Write as _;
use std::path::Path;
use std::process::ExitCode;

use serde::Serialize;

use crate::catalog::{Catalog, PrincipleNode};
use crate::index::CrossReferenceIndex;
use crate::scanner::Snapshot;
use crate::types::{ParseWarning, slash_path};

/// Output format for reports and the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    /// A single JSON object.
    Json,
    /// One line per finding.
    #[default]
    Text,
}

/// Everything one run found. Built once, after every phase has completed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Links whose target is not in the snapshot.
    pub broken_links: Vec<BrokenLinkEntry>,
    /// Documents no resolved link points at.
    pub orphaned_documents: Vec<String>,
    /// Principles missing a required part.
    pub incomplete_principles: Vec<IncompletePrinciple>,
    /// Scan, parse, and catalog warnings.
    pub warnings: Vec<WarningEntry>,
    /// Counts for the run.
    pub summary: Summary,
    /// Digest of every scanned path and its content.
    pub snapshot: String,
}

/// One broken link with enough context to fix it by hand.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenLinkEntry {
    /// Markdown document containing the link.
    pub source: String,
    /// One-based line of the link.
    pub line: u32,
    /// Destination exactly as written.
    pub raw_text: String,
    /// Link text, shown in text output only.
    #[serde(skip)]
    pub label: String,
    /// Root-relative path the link was resolved to.
    pub attempted_target: String,
}

/// A principle with missing parts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncompletePrinciple {
    /// Position in the curriculum.
    pub ordinal: u32,
    /// Directory name after the ordinal.
    pub slug: String,
    /// Names of the missing parts.
    pub missing: Vec<String>,
}

/// Where a warning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningKind {
    /// Naming convention deviation.
    Catalog,
    /// Markdown that could not be fully read for links.
    Parse,
    /// A file that was skipped or only partially loaded.
    Scan,
}

impl WarningKind {
    /// Fixed-width label for text output.
    const fn label(self) -> &'static str {
        return match self {
            WarningKind::Catalog => "catalog",
            WarningKind::Parse => "parse  ",
            WarningKind::Scan => "scan   ",
        };
    }
}

/// One non-fatal problem.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningEntry {
    /// Which phase produced the warning.
    pub kind: WarningKind,
    /// File or directory concerned.
    pub path: String,
    /// One-based line, when the warning has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// What went wrong.
    pub message: String,
}

/// Counts for the run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Anchor-only links.
    pub anchors: usize,
    /// Broken file links.
    pub broken: usize,
    /// Total size of the scanned files.
    pub bytes: u64,
    /// Scanned documents.
    pub documents: usize,
    /// Links to other sites.
    pub external: usize,
    /// Incomplete principles.
    pub incomplete: usize,
    /// All extracted links.
    pub links: usize,
    /// Orphaned documents.
    pub orphans: usize,
    /// Cataloged principles.
    pub principles: usize,
    /// Resolved file links.
    pub resolved: usize,
    /// Warnings of every kind.
    pub warnings: usize,
}

impl ValidationReport {
    /// True iff at least one link is broken. Orphans, incomplete principles
    /// and warnings never fail a run.
    pub fn failed(&self) -> bool {
        return !self.broken_links.is_empty();
    }

    /// Process exit code for the report: 1 on broken links, 0 otherwise.
    pub fn exit_code(&self) -> ExitCode {
        if self.failed() {
            return ExitCode::from(1);
        }
        return ExitCode::SUCCESS;
    }
}

/// Combine the results of every phase into one report.
pub fn assemble(
    snapshot: &Snapshot,
    parse_warnings: &[ParseWarning],
    index: &CrossReferenceIndex,
    catalog: &Catalog,
) -> ValidationReport {
    let broken_links: Vec<BrokenLinkEntry> = index
        .broken
        .iter()
        .map(|b| {
            return BrokenLinkEntry {
                source: slash_path(&b.link.source),
                line: b.link.line,
                raw_text: b.link.raw.clone(),
                label: b.link.label.clone(),
                attempted_target: slash_path(&b.attempted),
            };
        })
        .collect();

    let orphaned_documents: Vec<String> = index.orphans.iter().map(|p| return slash_path(p)).collect();

    let incomplete_principles: Vec<IncompletePrinciple> = catalog
        .incomplete()
        .map(|p| {
            return IncompletePrinciple {
                ordinal: p.ordinal,
                slug: p.slug.clone(),
                missing: p.missing.clone(),
            };
        })
        .collect();

    let warnings = collect_warnings(snapshot, parse_warnings, catalog);

    let summary = Summary {
        anchors: index.anchors,
        broken: broken_links.len(),
        bytes: snapshot.documents.iter().map(|d| return d.size).fold(0_u64, u64::saturating_add),
        documents: snapshot.documents.len(),
        external: index.external,
        incomplete: incomplete_principles.len(),
        links: index.link_count(),
        orphans: orphaned_documents.len(),
        principles: catalog.principles.len(),
        resolved: index.resolved.len(),
        warnings: warnings.len(),
    };

    return ValidationReport {
        broken_links,
        orphaned_documents,
        incomplete_principles,
        warnings,
        summary,
        snapshot: crate::hasher::hash_snapshot(&snapshot.documents).0,
    };
}

/// Flatten the three warning sources into one deterministic list.
fn collect_warnings(snapshot: &Snapshot, parse_warnings: &[ParseWarning], catalog: &Catalog) -> Vec<WarningEntry> {
    let mut warnings: Vec<WarningEntry> = Vec::new();
    warnings.extend(snapshot.warnings.iter().map(|w| {
        return WarningEntry { kind: WarningKind::Scan, path: slash_path(&w.path), line: None, message: w.reason.clone() };
    }));
    warnings.extend(parse_warnings.iter().map(|w| {
        return WarningEntry { kind: WarningKind::Parse, path: slash_path(&w.path), line: w.line, message: w.reason.clone() };
    }));
    warnings.extend(catalog.warnings.iter().map(|w| {
        return WarningEntry { kind: WarningKind::Catalog, path: slash_path(&w.path), line: None, message: w.reason.clone() };
    }));

    warnings.sort_by(|a, b| {
        return (a.kind, &a.path, a.line, &a.message).cmp(&(b.kind, &b.path, b.line, &b.message));
    });
    return warnings;
}

// ── Rendering ─────────────────────────────────────────────────────────

/// Render a report in the requested format. Output ends with a newline.
pub fn render(report: &ValidationReport, format: Format) -> String {
    return match format {
        Format::Json => render_json(report),
        Format::Text => render_text(report),
    };
}

/// Pretty JSON with a trailing newline.
fn render_json<T: Serialize>(value: &T) -> String {
    // serde_json::to_string_pretty won't fail on these structures.
    let mut json = serde_json::to_string_pretty(value).unwrap_or_default();
    json.push('\n');
    return json;
}

/// One line per finding, then a summary line.
fn render_text(report: &ValidationReport) -> String {
    let mut out = String::new();

    for broken in &report.broken_links {
        let _ = writeln!(
            out,
            "BROKEN      {}:{}  [{}]({}) -> {}",
            broken.source, broken.line, broken.label, broken.raw_text, broken.attempted_target
        );
    }
    for orphan in &report.orphaned_documents {
        let _ = writeln!(out, "ORPHAN      {orphan}");
    }
    for principle in &report.incomplete_principles {
        let _ = writeln!(
            out,
            "INCOMPLETE  {:02}-{} (missing {})",
            principle.ordinal,
            principle.slug,
            principle.missing.join(", ")
        );
    }
    for warning in &report.warnings {
        let location = match warning.line {
            Some(line) => format!("{}:{line}", warning.path),
            None => warning.path.clone(),
        };
        let _ = writeln!(out, "WARN {} {location}: {}", warning.kind.label(), warning.message);
    }

    let s = &report.summary;
    if !out.is_empty() {
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "{} broken, {} orphaned, {} incomplete, {} warnings ({} documents, {} links, {} principles)",
        s.broken, s.orphans, s.incomplete, s.warnings, s.documents, s.links, s.principles
    );
    return out;
}

// ── Catalog view ──────────────────────────────────────────────────────

/// Serializable view of the curriculum for the `catalog` command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogView {
    principles: Vec<PrincipleView>,
    warnings: Vec<WarningEntry>,
}

/// One principle and its attached documents.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrincipleView {
    ordinal: u32,
    slug: String,
    dir: String,
    title: Option<String>,
    readme: Option<String>,
    checklist: Option<String>,
    examples: Vec<String>,
    exercises: Vec<String>,
    others: Vec<String>,
    missing: Vec<String>,
}

impl From<&PrincipleNode> for PrincipleView {
    fn from(node: &PrincipleNode) -> Self {
        let paths = |list: &[std::path::PathBuf]| -> Vec<String> {
            return list.iter().map(|p| return slash_path(p)).collect();
        };
        return Self {
            ordinal: node.ordinal,
            slug: node.slug.clone(),
            dir: slash_path(&node.dir),
            title: node.title.clone(),
            readme: node.readme.as_deref().map(slash_path),
            checklist: node.checklist.as_deref().map(slash_path),
            examples: paths(&node.examples),
            exercises: paths(&node.exercises),
            others: paths(&node.others),
            missing: node.missing.clone(),
        };
    }
}

/// Render the curriculum: principle, then README, checklist, examples, exercises.
pub fn render_catalog(catalog: &Catalog, format: Format) -> String {
    let warnings: Vec<WarningEntry> = catalog
        .warnings
        .iter()
        .map(|w| {
            return WarningEntry { kind: WarningKind::Catalog, path: slash_path(&w.path), line: None, message: w.reason.clone() };
        })
        .collect();

    if format == Format::Json {
        let view = CatalogView { principles: catalog.principles.iter().map(PrincipleView::from).collect(), warnings };
        return render_json(&view);
    }

    let mut out = String::new();
    for node in &catalog.principles {
        let title = node.title.as_deref().unwrap_or("(untitled)");
        let _ = writeln!(out, "{:02}  {}  {title}", node.ordinal, node.slug);
        write_part(&mut out, "readme", node.readme.as_deref());
        write_part(&mut out, "checklist", node.checklist.as_deref());
        for example in &node.examples {
            write_part(&mut out, "example", Some(example.as_path()));
        }
        for exercise in &node.exercises {
            write_part(&mut out, "exercise", Some(exercise.as_path()));
        }
        if node.is_incomplete() {
            let _ = writeln!(out, "    missing    {}", node.missing.join(", "));
        }
    }
    for warning in &warnings {
        let _ = writeln!(out, "WARN {} {}: {}", warning.kind.label(), warning.path, warning.message);
    }
    return out;
}

/// One indented `label  path` line, or `label  -` when absent.
fn write_part(out: &mut String, label: &str, path: Option<&Path>) {
    let shown = path.map_or_else(|| return "-".to_string(), slash_path);
    let _ = writeln!(out, "    {label:<10} {shown}");
}
