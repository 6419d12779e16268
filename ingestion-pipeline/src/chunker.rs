use common::error::AppError;

/// Chunk boundary parameters. Both are counted in characters, not bytes.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub max_chars: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: 500,
            overlap: 100,
        }
    }
}

/// Splits normalized text into overlapping chunks.
///
/// The window prefers to cut just after a period when one falls in the back
/// half of the window, so chunks tend to end on sentence boundaries. Each
/// window starts `overlap` characters before the previous cut, so no
/// information is lost at a boundary. Chunk order in the returned vector is
/// document order.
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Result<Vec<String>, AppError> {
    if config.max_chars == 0 || config.overlap >= config.max_chars {
        return Err(AppError::Config(format!(
            "chunk overlap ({}) must be smaller than the maximum chunk length ({})",
            config.overlap, config.max_chars
        )));
    }

    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();

    if len <= config.max_chars {
        return Ok(vec![normalized]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = start + config.max_chars;

        if end < len {
            if let Some(offset) = chars[start..end].iter().rposition(|&c| c == '.') {
                let cut = start + offset + 1;
                // Only cut at the period when it sits past the halfway mark
                // and the next window still moves forward.
                if cut > start + config.max_chars / 2 + 1 && cut > start + config.overlap {
                    end = cut;
                }
            }
        }

        let slice_end = end.min(len);
        let chunk: String = chars[start..slice_end].iter().collect();
        chunks.push(chunk.trim().to_string());

        // The unclamped end drives the advance, mirroring the emitted
        // window's nominal width rather than the clamped tail.
        start = end - config.overlap;
    }

    Ok(chunks)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chars: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig { max_chars, overlap }
    }

    #[test]
    fn rejects_overlap_not_smaller_than_max() {
        for (max_chars, overlap) in [(100, 100), (100, 150), (0, 0)] {
            let result = chunk_text("some text", &config(max_chars, overlap));
            assert!(matches!(result, Err(AppError::Config(_))));
        }
    }

    #[test]
    fn short_input_returns_single_normalized_chunk() {
        let chunks = chunk_text("  hello \t\n world  ", &ChunkConfig::default()).unwrap();
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn empty_input_returns_single_empty_chunk() {
        // Empty input is rejected upstream; the chunker itself stays total.
        let chunks = chunk_text("   \n\t ", &ChunkConfig::default()).unwrap();
        assert_eq!(chunks, vec![String::new()]);
    }

    #[test]
    fn collapses_whitespace_runs_before_windowing() {
        let text = "a\n\nb\t\tc   d";
        let chunks = chunk_text(text, &ChunkConfig::default()).unwrap();
        assert_eq!(chunks, vec!["a b c d".to_string()]);
    }

    #[test]
    fn long_input_without_periods_cuts_at_max_and_overlaps() {
        // 1200 characters, no periods, no spaces: cuts land exactly at
        // max_chars and consecutive chunks share `overlap` characters.
        let text: String = (0..1200).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let cfg = config(500, 100);
        let chunks = chunk_text(&text, &cfg).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 500);
        assert_eq!(chunks[1].len(), 500);
        assert_eq!(chunks[2].len(), 400);

        for pair in chunks.windows(2) {
            assert_eq!(pair[0][pair[0].len() - 100..], pair[1][..100]);
        }

        // Dropping each chunk's leading overlap reconstructs the input.
        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.push_str(&chunk[100..]);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn prefers_period_past_window_midpoint() {
        // A period at position 299 of a 500-char window is past the halfway
        // mark, so the first cut happens right after it.
        let head: String = "x".repeat(299);
        let tail: String = "y".repeat(400);
        let text = format!("{head}.{tail}");

        let chunks = chunk_text(&text, &config(500, 100)).unwrap();
        assert_eq!(chunks[0].len(), 300);
        assert!(chunks[0].ends_with('.'));
        // Next window starts 100 characters before the cut.
        assert!(chunks[1].starts_with(&"x".repeat(99)));
    }

    #[test]
    fn ignores_period_before_window_midpoint() {
        // A period at position 100 is in the front half of the window and
        // must not shorten the chunk.
        let head: String = "x".repeat(100);
        let tail: String = "y".repeat(600);
        let text = format!("{head}.{tail}");

        let chunks = chunk_text(&text, &config(500, 100)).unwrap();
        assert_eq!(chunks[0].len(), 500);
    }

    #[test]
    fn chunks_are_trimmed() {
        // Force a cut right before a space so the next window starts inside
        // the overlap region; emitted chunks never carry edge whitespace.
        let sentence = format!("{}. {}", "a".repeat(350), "b".repeat(400));
        let chunks = chunk_text(&sentence, &config(500, 100)).unwrap();

        for chunk in &chunks {
            assert_eq!(chunk, &chunk.trim().to_string());
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn handles_multibyte_characters_by_char_count() {
        // 700 two-byte characters; byte-based slicing would panic or split
        // a code point.
        let text: String = "é".repeat(700);
        let chunks = chunk_text(&text, &config(500, 100)).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 500);
        assert_eq!(chunks[1].chars().count(), 300);
    }

    #[test]
    fn ordering_follows_document_order() {
        let text: String = (0..30)
            .map(|i| format!("sentence number {i:02} padded with words"))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, &config(120, 20)).unwrap();

        assert!(chunks.len() > 2);
        // Each chunk's first numbered sentence must be >= the previous
        // chunk's: the window only moves forward.
        let first_numbers: Vec<usize> = chunks
            .iter()
            .filter_map(|chunk| {
                chunk
                    .find("number ")
                    .and_then(|at| chunk.get(at + 7..at + 9))
                    .and_then(|digits| digits.parse().ok())
            })
            .collect();
        assert!(first_numbers.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
