//! Two-stage PDF text extraction.
//!
//! The primary path runs `pdf-extract` over the whole document. When it
//! errors (or produces no text at all), a page-by-page fallback via `lopdf`
//! takes over; pages it can read are kept with their page numbers and the
//! rest are skipped. Only when both paths produce nothing does a file count
//! as unreadable — the caller records that as a warning and moves on, so one
//! corrupt PDF never aborts ingestion.

use std::path::Path;

/// One extracted segment: the whole document (page unknown) on the primary
/// path, or a single page on the fallback path.
#[derive(Debug, Clone)]
pub struct ExtractedSegment {
    /// 1-based page number, known only on the fallback path.
    pub page: Option<u32>,
    pub text: String,
}

/// Both extraction paths failed for a file.
#[derive(Debug)]
pub struct ExtractError {
    pub primary: String,
    pub fallback: String,
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "primary extractor failed ({}); page fallback failed ({})",
            self.primary, self.fallback
        )
    }
}

impl std::error::Error for ExtractError {}

/// Extract the text of one PDF, trying the primary extractor first and the
/// page-by-page fallback second.
pub fn extract_segments(path: &Path) -> Result<Vec<ExtractedSegment>, ExtractError> {
    let primary_failure = match pdf_extract::extract_text(path) {
        Ok(text) if !text.trim().is_empty() => {
            return Ok(vec![ExtractedSegment { page: None, text }]);
        }
        Ok(_) => "no text extracted".to_string(),
        Err(e) => e.to_string(),
    };

    match extract_pages_lopdf(path) {
        Ok(segments) if !segments.is_empty() => Ok(segments),
        Ok(_) => Err(ExtractError {
            primary: primary_failure,
            fallback: "no readable pages".to_string(),
        }),
        Err(fallback) => Err(ExtractError {
            primary: primary_failure,
            fallback,
        }),
    }
}

/// Fallback: walk the page tree with `lopdf` and pull text per page.
/// Unreadable or empty pages are skipped rather than failing the file.
fn extract_pages_lopdf(path: &Path) -> Result<Vec<ExtractedSegment>, String> {
    let doc = lopdf::Document::load(path).map_err(|e| e.to_string())?;

    let mut segments = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) if !text.trim().is_empty() => segments.push(ExtractedSegment {
                page: Some(*page_number),
                text,
            }),
            _ => {}
        }
    }
    Ok(segments)
}
