/// Paragraph-oriented chunking bounds.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingOptions {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_chars: 1_200,
            overlap_chars: 120,
            min_chars: 120,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Splits `text` into chunks of at most `max_chars` characters.
///
/// Paragraphs are accumulated until the budget is reached; anything still
/// over the budget is window-split with `overlap_chars` of carried context.
/// A text shorter than `min_chars` still yields one chunk so small documents
/// are never silently dropped.
pub fn chunk_text(text: &str, options: &ChunkingOptions) -> Vec<String> {
    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty());

    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        if !current.is_empty() && current.len() + paragraph.len() + 2 > options.max_chars {
            blocks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    let mut chunks = Vec::new();
    for block in blocks {
        let chars: Vec<char> = block.chars().collect();
        if chars.len() <= options.max_chars {
            chunks.push(block);
            continue;
        }

        let step = options
            .max_chars
            .saturating_sub(options.overlap_chars)
            .max(1);
        let mut start = 0;
        while start < chars.len() {
            let end = (start + options.max_chars).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
    }

    chunks.retain(|chunk| chunk.len() >= options.min_chars);
    if chunks.is_empty() && !text.trim().is_empty() {
        chunks.push(text.trim().to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::{chunk_text, normalize_whitespace, ChunkingOptions};

    #[test]
    fn whitespace_is_collapsed() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn short_text_still_yields_one_chunk() {
        let options = ChunkingOptions::default();
        let chunks = chunk_text("Refund policy: 30 days", &options);
        assert_eq!(chunks, vec!["Refund policy: 30 days".to_string()]);
    }

    #[test]
    fn chunks_respect_the_character_budget() {
        let options = ChunkingOptions {
            max_chars: 40,
            overlap_chars: 8,
            min_chars: 10,
        };
        let text = "first paragraph of the page\n\nsecond paragraph of the page\n\nthird paragraph of the page";

        let chunks = chunk_text(text, &options);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 40));
    }

    #[test]
    fn oversized_paragraphs_are_window_split_with_overlap() {
        let options = ChunkingOptions {
            max_chars: 20,
            overlap_chars: 5,
            min_chars: 5,
        };
        let text = "abcdefghijklmnopqrstuvwxyz0123456789";

        let chunks = chunk_text(text, &options);
        assert!(chunks.len() >= 2);
        // each window starts overlap_chars before the previous one ended
        let first_tail: String = chunks[0].chars().skip(15).collect();
        assert!(chunks[1].starts_with(&first_tail));
    }

    #[test]
    fn blank_text_yields_nothing() {
        let options = ChunkingOptions::default();
        assert!(chunk_text("  \n\n  ", &options).is_empty());
    }
}
