//! Overlapping character-window chunker.
//!
//! Splits extracted text into chunks of at most `chunk_size` characters,
//! with `overlap` characters shared between consecutive chunks so that a
//! sentence cut at a boundary still appears whole in one of its neighbors.
//! Where a window would cut mid-word, the split backs up to the last
//! whitespace in the rear half of the window; the overlap then adjusts by
//! the same amount. Output is fully deterministic for identical input.
//!
//! Chunking is called per document — chunks never span source files.

/// Split `text` into overlapping chunks. `overlap` must be smaller than
/// `chunk_size` (validated at config load; also enforced here).
///
/// Every chunk except possibly the last holds at most `chunk_size`
/// characters; all-whitespace windows are dropped.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    assert!(chunk_size > 0, "chunk_size must be > 0");
    assert!(overlap < chunk_size, "overlap must be < chunk_size");

    let chars: Vec<char> = text.chars().collect();
    if chars.iter().all(|c| c.is_whitespace()) {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end < chars.len() {
            // Prefer a whitespace boundary, but only in the rear half of the
            // window so pathological inputs cannot shrink chunks to nothing.
            match chars[start..hard_end]
                .iter()
                .rposition(|c| c.is_whitespace())
            {
                Some(pos) if pos > chunk_size / 2 => start + pos,
                _ => hard_end,
            }
        } else {
            hard_end
        };

        let piece: String = chars[start..end].iter().collect();
        if !piece.trim().is_empty() {
            chunks.push(piece);
        }

        if end == chars.len() {
            break;
        }
        // Step back by the overlap, but always make forward progress.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}
