/// Document classification by file extension, and the markdown grammar.
use std::path::Path;

use tree_sitter::Language;

use crate::types::DocumentKind;

/// Map a file extension to its document kind.
/// Snippet labels name the language the example is written in.
pub fn kind_for_path(path: &Path) -> DocumentKind {
    let ext = path.extension().and_then(|e| return e.to_str()).unwrap_or("");

    return match ext.to_ascii_lowercase().as_str() {
        "md" | "markdown" => DocumentKind::Markdown,
        "c" | "h" => DocumentKind::Snippet("C"),
        "cpp" | "cc" | "hpp" => DocumentKind::Snippet("C++"),
        "cs" => DocumentKind::Snippet("C#"),
        "go" => DocumentKind::Snippet("Go"),
        "java" => DocumentKind::Snippet("Java"),
        "js" | "jsx" | "mjs" => DocumentKind::Snippet("JavaScript"),
        "kt" => DocumentKind::Snippet("Kotlin"),
        "php" => DocumentKind::Snippet("PHP"),
        "py" => DocumentKind::Snippet("Python"),
        "rb" => DocumentKind::Snippet("Ruby"),
        "rs" => DocumentKind::Snippet("Rust"),
        "swift" => DocumentKind::Snippet("Swift"),
        "ts" | "tsx" => DocumentKind::Snippet("TypeScript"),
        _ => DocumentKind::Other,
    };
}

/// The tree-sitter block grammar used to find code blocks and headings.
pub fn markdown_language() -> Language {
    return tree_sitter_md::LANGUAGE.into();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_extensions_are_case_insensitive() {
        assert_eq!(kind_for_path(Path::new("README.md")), DocumentKind::Markdown);
        assert_eq!(kind_for_path(Path::new("GUIDE.MD")), DocumentKind::Markdown);
        assert_eq!(kind_for_path(Path::new("notes.markdown")), DocumentKind::Markdown);
    }

    #[test]
    fn snippets_carry_their_language() {
        assert_eq!(
            kind_for_path(Path::new("examples/god-class-bad.java")),
            DocumentKind::Snippet("Java")
        );
        assert_eq!(
            kind_for_path(Path::new("functions-good.py")),
            DocumentKind::Snippet("Python")
        );
        assert_eq!(kind_for_path(Path::new("LICENSE")), DocumentKind::Other);
    }
}
