/// Content digests that make two scans of the same tree comparable.
use sha2::{Digest as _, Sha256};

use crate::types::{ContentHash, Document, slash_path};

/// SHA-256 of raw file bytes.
pub fn hash_content(bytes: &[u8]) -> ContentHash {
    let hash = Sha256::digest(bytes);
    return ContentHash(format!("{hash:x}"));
}

/// Digest of a whole snapshot.
///
/// Each document contributes `path NUL digest LF` in the order given, which
/// the scanner guarantees is sorted by relative path. Any added, removed,
/// renamed or edited file changes the result.
pub fn hash_snapshot(documents: &[Document]) -> ContentHash {
    let mut hasher = Sha256::new();
    for document in documents {
        hasher.update(slash_path(&document.relative).as_bytes());
        hasher.update([0_u8]);
        hasher.update(document.digest.0.as_bytes());
        hasher.update([b'\n']);
    }
    return ContentHash(format!("{:x}", hasher.finalize()));
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::types::DocumentKind;

    fn doc(path: &str, body: &str) -> Document {
        return Document {
            content: Some(body.as_bytes().to_vec()),
            digest: hash_content(body.as_bytes()),
            kind: DocumentKind::Markdown,
            relative: PathBuf::from(path),
            size: 0,
            title: None,
        };
    }

    #[test]
    fn content_hash_is_lowercase_hex() {
        let hash = hash_content(b"");
        assert_eq!(
            hash.0,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn snapshot_changes_with_path_or_content() {
        let base = hash_snapshot(&[doc("a.md", "x"), doc("b.md", "y")]);
        assert_eq!(base, hash_snapshot(&[doc("a.md", "x"), doc("b.md", "y")]));
        assert_ne!(base, hash_snapshot(&[doc("a.md", "x"), doc("c.md", "y")]));
        assert_ne!(base, hash_snapshot(&[doc("a.md", "x"), doc("b.md", "z")]));
    }
}
