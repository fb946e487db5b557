//! PDF archive scanner.
//!
//! Enumerates the `*.pdf` files in the archive directory, non-recursively.
//! The directory is created if missing. Every failure degrades to an empty
//! list: the assistant must keep answering with zero documents, so the
//! scanner never returns an error.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::models::SourceDocument;

/// Scan `dir` for PDF files and return them sorted by path.
///
/// Matching is by extension, case-insensitive, so `REPORT.PDF` counts.
/// Repeated scans of an unchanged directory yield the same ordered list.
pub fn scan_archive(dir: &Path) -> Vec<SourceDocument> {
    if let Err(e) = fs::create_dir_all(dir) {
        warn!(dir = %dir.display(), error = %e, "could not create archive directory");
        return Vec::new();
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "could not read archive directory");
            return Vec::new();
        }
    };

    let mut docs: Vec<SourceDocument> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_pdf_extension(path))
        .map(SourceDocument::new)
        .collect();

    docs.sort_by(|a, b| a.path.cmp(&b.path));
    docs
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_missing_directory_and_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("archive");
        assert!(!dir.exists());

        let docs = scan_archive(&dir);
        assert!(docs.is_empty());
        assert!(dir.exists());
    }

    #[test]
    fn lists_only_pdfs_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.pdf"), b"x").unwrap();
        fs::write(tmp.path().join("a.pdf"), b"x").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        fs::write(tmp.path().join("C.PDF"), b"x").unwrap();

        let docs = scan_archive(tmp.path());
        let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["C.PDF", "a.pdf", "b.pdf"]);
    }

    #[test]
    fn scan_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("one.pdf"), b"x").unwrap();
        fs::write(tmp.path().join("two.pdf"), b"x").unwrap();

        let first = scan_archive(tmp.path());
        let second = scan_archive(tmp.path());
        assert_eq!(first, second);
    }

    #[test]
    fn subdirectories_are_not_descended() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("deep.pdf"), b"x").unwrap();

        assert!(scan_archive(tmp.path()).is_empty());
    }
}
