use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tree_sitter::{Node, Parser, Tree};

use crate::grammar;
use crate::types::{Document, Link, LinkKind, ParseWarning};

/// `[text](dest "title")` and `![alt](src)`. Group 1 is the text, group 2 the destination.
static INLINE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"!?\[((?:[^\[\]\\]|\\.|\[[^\[\]]*\])*)\]\(\s*(<[^<>\n]*>|(?:[^\s()\\]|\\.|\([^\s()]*\))*)(?:\s+(?:"[^"]*"|'[^']*'|\([^()]*\)))?\s*\)"#,
    )
    .expect("valid regex")
});

/// `[label]: dest` at the start of a line.
static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}\[((?:[^\[\]\\]|\\.)+)\]:\s*(<[^<>\n]*>|\S+)").expect("valid regex")
});

/// `[text][label]` and `[text][]`.
static FULL_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[((?:[^\[\]\\]|\\.|\[[^\[\]]*\])*)\]\[([^\[\]]*)\]").expect("valid regex")
});

/// `](` that never closes on the same line.
static UNTERMINATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\]\([^)\n]*$").expect("valid regex"));

/// `](...)` left over after every well-formed link was taken out.
static MALFORMED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\([^)\n]*\)").expect("valid regex"));

/// A URI scheme. Two characters minimum so `C:` drive letters stay paths.
static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]{1,31}:").expect("valid regex"));

/// Links and warnings found in one document.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Links in document order.
    pub links: Vec<Link>,
    /// Problems that did not stop extraction.
    pub warnings: Vec<ParseWarning>,
}

/// A reference definition: destination and the line it was written on.
struct Definition {
    destination: String,
    label: String,
    line: u32,
}

/// Extract links from a markdown document. Anything else yields nothing.
///
/// Never fails: unparseable pieces become warnings and extraction carries on
/// with whatever could be read.
pub fn extract(document: &Document) -> Extraction {
    if !document.is_markdown() {
        return Extraction::default();
    }
    let Some(bytes) = &document.content else {
        return Extraction::default();
    };

    let (text, utf8_warning) = match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), None),
        Err(e) => (
            String::from_utf8_lossy(bytes),
            Some(ParseWarning {
                line: None,
                path: document.relative.clone(),
                reason: format!("not valid UTF-8 ({e}); decoded lossily"),
            }),
        ),
    };

    let mut extraction = extract_from_text(&document.relative, &text);
    if let Some(warning) = utf8_warning {
        extraction.warnings.insert(0, warning);
    }
    return extraction;
}

/// Extract links from markdown text attributed to `source`.
pub fn extract_from_text(source: &Path, text: &str) -> Extraction {
    let mut extraction = Extraction::default();
    let lines: Vec<&str> = text.lines().collect();
    let skipped = non_navigational_lines(source, text, lines.len(), &mut extraction.warnings);

    let definitions = collect_definitions(&lines, &skipped);
    for definition in definitions.values() {
        push_link(
            &mut extraction,
            source,
            definition.line,
            &definition.label,
            &definition.destination,
        );
    }

    for block in paragraph_blocks(&lines, &skipped) {
        extract_links_from_block(source, &block, &definitions, &mut extraction);
    }

    extraction.links.sort_by(|a, b| return a.line.cmp(&b.line));
    return extraction;
}

/// Consecutive prose lines joined with `\n`. Link text may wrap across
/// lines, so patterns run over the whole block.
struct Block {
    /// Zero-based row of the first line.
    first_row: usize,
    /// The lines of the block, newline-separated.
    text: String,
}

impl Block {
    /// One-based line of a byte offset into `text`.
    fn line_at(&self, offset: usize) -> u32 {
        let newlines = self
            .text
            .get(..offset)
            .map_or(0, |before| return before.bytes().filter(|b| return *b == b'\n').count());
        return line_number(self.first_row.saturating_add(newlines));
    }
}

/// Split lines into blocks at blank lines, skipped code rows, reference
/// definitions, and ATX headings. A heading is a block of its own.
fn paragraph_blocks(lines: &[&str], skipped: &[bool]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for (idx, line) in lines.iter().enumerate() {
        let is_break = skipped.get(idx).copied().unwrap_or(false)
            || line.trim().is_empty()
            || DEFINITION.is_match(line);
        if is_break {
            blocks.extend(current.take());
            continue;
        }
        if atx_heading_text(line).is_some() {
            blocks.extend(current.take());
            blocks.push(Block { first_row: idx, text: (*line).to_string() });
            continue;
        }
        match current.as_mut() {
            Some(block) => {
                block.text.push('\n');
                block.text.push_str(line);
            },
            None => current = Some(Block { first_row: idx, text: (*line).to_string() }),
        }
    }
    blocks.extend(current);
    return blocks;
}

/// Extract inline links from one block and check its reference uses.
fn extract_links_from_block(
    source: &Path,
    block: &Block,
    definitions: &BTreeMap<String, Definition>,
    extraction: &mut Extraction,
) {
    let text = block.text.as_str();
    let mut masked = mask_code_spans(text);

    let mut spans = Vec::new();
    for cap in INLINE_LINK.captures_iter(&masked) {
        let (Some(whole), Some(label_text), Some(destination)) = (cap.get(0), cap.get(1), cap.get(2)) else {
            continue;
        };
        spans.push(whole.range());
        // A badge inside a link: `[![alt](img.png)](target.md)`.
        for inner in INLINE_LINK.captures_iter(label_text.as_str()) {
            if let (Some(inner_whole), Some(inner_text), Some(inner_dest)) = (inner.get(0), inner.get(1), inner.get(2)) {
                let line = block.line_at(label_text.start().saturating_add(inner_whole.start()));
                push_link(extraction, source, line, inner_text.as_str(), inner_dest.as_str());
            }
        }
        // Offsets are preserved by masking, so the label keeps its code spans.
        let label = text.get(label_text.range()).unwrap_or(label_text.as_str());
        push_link(extraction, source, block.line_at(whole.start()), label, destination.as_str());
    }
    blank_ranges(&mut masked, &spans);

    let mut reference_spans = Vec::new();
    for cap in FULL_REFERENCE.captures_iter(&masked) {
        let (Some(whole), Some(label_text), Some(label)) = (cap.get(0), cap.get(1), cap.get(2)) else {
            continue;
        };
        if is_preceded_by_word(&masked, whole.start()) {
            continue;
        }
        reference_spans.push(whole.range());
        let key = if label.as_str().trim().is_empty() { label_text.as_str() } else { label.as_str() };
        if !definitions.contains_key(&normalize_label(key)) {
            extraction.warnings.push(ParseWarning {
                line: Some(block.line_at(whole.start())),
                path: source.to_path_buf(),
                reason: format!("reference `[{}]` has no definition", collapse_whitespace(key)),
            });
        }
    }
    blank_ranges(&mut masked, &reference_spans);

    let unterminated: Vec<std::ops::Range<usize>> = UNTERMINATED.find_iter(&masked).map(|m| return m.range()).collect();
    for range in &unterminated {
        extraction.warnings.push(ParseWarning {
            line: Some(block.line_at(range.start)),
            path: source.to_path_buf(),
            reason: "unterminated link destination".to_string(),
        });
    }
    blank_ranges(&mut masked, &unterminated);

    if let Some(m) = MALFORMED.find(&masked) {
        extraction.warnings.push(ParseWarning {
            line: Some(block.line_at(m.start())),
            path: source.to_path_buf(),
            reason: format!("malformed link `{}`", m.as_str().trim()),
        });
    }
}

/// Classify a destination and record it, or warn when it is empty.
fn push_link(extraction: &mut Extraction, source: &Path, line: u32, label: &str, destination: &str) {
    let Some(kind) = classify_destination(destination) else {
        extraction.warnings.push(ParseWarning {
            line: Some(line),
            path: source.to_path_buf(),
            reason: format!("link `{}` has an empty destination", collapse_whitespace(label)),
        });
        return;
    };

    extraction.links.push(Link {
        kind,
        label: collapse_whitespace(label),
        line,
        raw: destination.trim().to_string(),
        source: source.to_path_buf(),
    });
}

/// Turn a raw destination into a link kind. `None` for an empty destination.
///
/// Anything with a URI scheme is external. A bare `#frag` is an anchor. The
/// rest is a file path, with the fragment split off, any `?query` dropped,
/// and percent-escapes decoded.
pub fn classify_destination(raw: &str) -> Option<LinkKind> {
    let trimmed = raw.trim();
    let destination = trimmed
        .strip_prefix('<')
        .and_then(|d| return d.strip_suffix('>'))
        .unwrap_or(trimmed)
        .trim();

    if destination.is_empty() {
        return None;
    }
    if SCHEME.is_match(destination) || destination.starts_with("//") {
        return Some(LinkKind::External(destination.to_string()));
    }

    let (path_part, anchor) = match destination.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment.to_string())),
        None => (destination, None),
    };
    let path_part = path_part.split_once('?').map_or(path_part, |(path, _)| return path);

    if path_part.is_empty() {
        return Some(LinkKind::Anchor(anchor.unwrap_or_default()));
    }

    let path = percent_decode(&unescape_backslashes(path_part));
    return Some(LinkKind::File { anchor, path });
}

/// First heading of a markdown text: ATX (`# Title`) or setext (underlined).
/// Headings inside fenced code blocks are ignored.
pub fn first_heading(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let fenced = fenced_lines_by_scan(&lines);

    for (idx, line) in lines.iter().enumerate() {
        if fenced.get(idx).copied().unwrap_or(false) {
            continue;
        }
        if let Some(title) = atx_heading_text(line) {
            return Some(title);
        }
        let underlined = lines.get(idx.saturating_add(1)).is_some_and(|next| {
            let next_fenced = fenced.get(idx.saturating_add(1)).copied().unwrap_or(false);
            return !next_fenced && is_setext_underline(next);
        });
        if underlined && !line.trim().is_empty() && leading_spaces(line) <= 3 {
            return Some(line.trim().to_string());
        }
    }
    return None;
}

// ── Code block detection ──────────────────────────────────────────────

/// Mark lines inside fenced, indented, or HTML blocks. Links there are
/// illustrative, not navigational.
///
/// Uses the tree-sitter markdown grammar; if it cannot produce a tree the
/// fence markers are tracked line by line instead.
fn non_navigational_lines(
    source: &Path,
    text: &str,
    line_count: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Vec<bool> {
    let Some(tree) = parse_markdown(text) else {
        warnings.push(ParseWarning {
            line: None,
            path: source.to_path_buf(),
            reason: "markdown parser returned no tree; falling back to fence scanning".to_string(),
        });
        let lines: Vec<&str> = text.lines().collect();
        return fenced_lines_by_scan(&lines);
    };

    let root = tree.root_node();
    if root.has_error() {
        warnings.push(ParseWarning {
            line: first_error_line(root),
            path: source.to_path_buf(),
            reason: "markdown syntax tree contains errors".to_string(),
        });
    }

    let mut skipped = vec![false; line_count];
    collect_code_block_rows(root, &mut skipped);
    return skipped;
}

/// Parse markdown into a tree-sitter block tree.
fn parse_markdown(text: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar::markdown_language()) {
        tracing::warn!(error = %e, "markdown grammar rejected by tree-sitter");
        return None;
    }
    return parser.parse(text, None);
}

/// Recursively mark the rows spanned by code and HTML block nodes.
fn collect_code_block_rows(node: Node<'_>, skipped: &mut [bool]) {
    match node.kind() {
        "fenced_code_block" | "indented_code_block" | "html_block" => {
            let start = node.start_position().row;
            let end_position = node.end_position();
            // A block ending at column 0 ends on the previous line.
            let end = if end_position.column == 0 && end_position.row > start {
                end_position.row.saturating_sub(1)
            } else {
                end_position.row
            };
            for row in start..=end {
                if let Some(slot) = skipped.get_mut(row) {
                    *slot = true;
                }
            }
        },
        _ => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                collect_code_block_rows(child, skipped);
            }
        },
    }
}

/// One-based line of the first error or missing node, if any.
fn first_error_line(node: Node<'_>) -> Option<u32> {
    if node.is_error() || node.is_missing() {
        return Some(line_number(node.start_position().row));
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error()
            && let Some(line) = first_error_line(child)
        {
            return Some(line);
        }
    }
    return None;
}

/// Mark lines inside ``` or ~~~ fences, fence lines included.
fn fenced_lines_by_scan(lines: &[&str]) -> Vec<bool> {
    let mut fenced = vec![false; lines.len()];
    let mut open: Option<(char, usize)> = None;

    for (idx, line) in lines.iter().enumerate() {
        let marker = fence_marker(line);
        match (open, marker) {
            (None, Some(found)) => {
                open = Some(found);
                set_flag(&mut fenced, idx);
            },
            (Some((ch, len)), Some((found_ch, found_len)))
                if found_ch == ch && found_len >= len && is_bare_fence(line) =>
            {
                open = None;
                set_flag(&mut fenced, idx);
            },
            (Some(_), _) => set_flag(&mut fenced, idx),
            (None, None) => {},
        }
    }
    return fenced;
}

/// Fence character and run length if the line opens or closes a fence.
fn fence_marker(line: &str) -> Option<(char, usize)> {
    if leading_spaces(line) > 3 {
        return None;
    }
    let trimmed = line.trim_start();
    let ch = trimmed.chars().next().filter(|c| return *c == '`' || *c == '~')?;
    let run = trimmed.chars().take_while(|c| return *c == ch).count();
    if run < 3 {
        return None;
    }
    return Some((ch, run));
}

/// A closing fence carries no info string.
fn is_bare_fence(line: &str) -> bool {
    return line.trim().chars().all(|c| return c == '`' || c == '~');
}

/// Set one flag, ignoring out-of-range rows.
fn set_flag(flags: &mut [bool], idx: usize) {
    if let Some(slot) = flags.get_mut(idx) {
        *slot = true;
    }
}

// ── Reference definitions ─────────────────────────────────────────────

/// Collect `[label]: dest` definitions keyed by normalized label.
/// The first definition of a label wins.
fn collect_definitions(lines: &[&str], skipped: &[bool]) -> BTreeMap<String, Definition> {
    let mut definitions = BTreeMap::new();
    for (idx, line) in lines.iter().enumerate() {
        if skipped.get(idx).copied().unwrap_or(false) {
            continue;
        }
        let Some(cap) = DEFINITION.captures(line) else {
            continue;
        };
        let (Some(label), Some(destination)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        definitions.entry(normalize_label(label.as_str())).or_insert_with(|| {
            return Definition {
                destination: destination.as_str().to_string(),
                label: label.as_str().to_string(),
                line: line_number(idx),
            };
        });
    }
    return definitions;
}

/// Case-fold and collapse whitespace, as reference labels are matched.
fn normalize_label(label: &str) -> String {
    return collapse_whitespace(label).to_lowercase();
}

/// Trim and turn every whitespace run, line breaks included, into one space.
fn collapse_whitespace(text: &str) -> String {
    return text.split_whitespace().collect::<Vec<_>>().join(" ");
}

// ── Text helpers ──────────────────────────────────────────────────────

/// Replace inline code spans (including their backticks) with spaces.
/// Byte offsets are preserved. An unmatched backtick run is left alone.
fn mask_code_spans(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut masked = line.as_bytes().to_vec();
    let mut i = 0_usize;

    while i < bytes.len() {
        if bytes.get(i) != Some(&b'`') {
            i = i.saturating_add(1);
            continue;
        }
        let open_len = run_length(bytes, i);
        let content_start = i.saturating_add(open_len);
        match find_closing_run(bytes, content_start, open_len) {
            Some(close_start) => {
                let end = close_start.saturating_add(open_len);
                for slot in masked.iter_mut().take(end).skip(i) {
                    *slot = b' ';
                }
                i = end;
            },
            None => i = content_start,
        }
    }

    // Only ASCII backticks and their contents were replaced with ASCII
    // spaces; any multi-byte sequence is either untouched or fully blanked.
    return String::from_utf8(masked).unwrap_or_else(|_err| return line.to_string());
}

/// Length of the backtick run starting at `start`.
fn run_length(bytes: &[u8], start: usize) -> usize {
    return bytes.iter().skip(start).take_while(|b| return **b == b'`').count();
}

/// Start of the next backtick run of exactly `len` at or after `from`.
fn find_closing_run(bytes: &[u8], from: usize, len: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes.get(i) == Some(&b'`') {
            let run = run_length(bytes, i);
            if run == len {
                return Some(i);
            }
            i = i.saturating_add(run);
        } else {
            i = i.saturating_add(1);
        }
    }
    return None;
}

/// Blank out byte ranges with spaces so later patterns skip them.
fn blank_ranges(text: &mut String, ranges: &[std::ops::Range<usize>]) {
    for range in ranges {
        if text.get(range.clone()).is_some() {
            let len = range.end.saturating_sub(range.start);
            text.replace_range(range.clone(), &" ".repeat(len));
        }
    }
}

/// Whether the byte before `pos` is a word character, as in `grid[0][1]`.
fn is_preceded_by_word(text: &str, pos: usize) -> bool {
    return text
        .get(..pos)
        .and_then(|before| return before.chars().next_back())
        .is_some_and(|c| return c.is_alphanumeric() || c == '_' || c == ']' || c == ')');
}

/// Text of an ATX heading line, without markers.
fn atx_heading_text(line: &str) -> Option<String> {
    if leading_spaces(line) > 3 {
        return None;
    }
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| return *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = trimmed.get(level..)?;
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    let text = rest.trim().trim_end_matches('#').trim();
    if text.is_empty() {
        return None;
    }
    return Some(text.to_string());
}

/// `===` or `---` underline.
fn is_setext_underline(line: &str) -> bool {
    if leading_spaces(line) > 3 {
        return false;
    }
    let trimmed = line.trim();
    let Some(first) = trimmed.chars().next() else {
        return false;
    };
    return (first == '=' || first == '-') && trimmed.chars().all(|c| return c == first);
}

/// Count of leading space characters.
fn leading_spaces(line: &str) -> usize {
    return line.chars().take_while(|c| return *c == ' ').count();
}

/// Drop the backslash from CommonMark escapes such as `\(`.
fn unescape_backslashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(next) = chars.peek().copied()
            && next.is_ascii_punctuation()
        {
            out.push(next);
            let _ = chars.next();
            continue;
        }
        out.push(c);
    }
    return out;
}

/// Decode `%XX` escapes. Leaves the input unchanged if the result is not UTF-8.
fn percent_decode(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0_usize;
    while i < bytes.len() {
        let byte = bytes.get(i).copied().unwrap_or_default();
        let hi = bytes.get(i.saturating_add(1)).and_then(|b| return hex_value(*b));
        let lo = bytes.get(i.saturating_add(2)).and_then(|b| return hex_value(*b));
        match (byte, hi, lo) {
            (b'%', Some(hi), Some(lo)) => {
                out.push(hi.wrapping_mul(16).wrapping_add(lo));
                i = i.saturating_add(3);
            },
            _ => {
                out.push(byte);
                i = i.saturating_add(1);
            },
        }
    }
    return String::from_utf8(out).unwrap_or_else(|_err| return path.to_string());
}

/// Value of one hex digit.
fn hex_value(b: u8) -> Option<u8> {
    return char::from(b).to_digit(16).and_then(|d| return u8::try_from(d).ok());
}

/// Zero-based row to one-based line number.
fn line_number(idx: usize) -> u32 {
    return u32::try_from(idx.saturating_add(1)).unwrap_or(u32::MAX);
}
