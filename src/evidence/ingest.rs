//! Paragraph chunking for ingested documents.

const MAX_CHUNK_CHARS: usize = 4000;
const MIN_CHUNK_CHARS: usize = 50;

/// Splits `text` into paragraph-bounded chunks no larger than
/// `MAX_CHUNK_CHARS`, merging runs shorter than `MIN_CHUNK_CHARS` into
/// their neighbor so no chunk is emitted below the minimum (the final
/// chunk of a short document is the one exception).
pub fn chunk_text(text: &str) -> Vec<String> {
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        for piece in hard_split(paragraph) {
            if current.is_empty() {
                current = piece;
                continue;
            }
            if current.len() + 2 + piece.len() <= MAX_CHUNK_CHARS {
                current.push_str("\n\n");
                current.push_str(&piece);
            } else {
                chunks.push(std::mem::take(&mut current));
                current = piece;
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    merge_undersized(chunks)
}

fn hard_split(paragraph: &str) -> Vec<String> {
    if paragraph.len() <= MAX_CHUNK_CHARS {
        return vec![paragraph.to_string()];
    }
    paragraph
        .as_bytes()
        .chunks(MAX_CHUNK_CHARS)
        .map(|bytes| String::from_utf8_lossy(bytes).to_string())
        .collect()
}

fn merge_undersized(chunks: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for chunk in chunks {
        if let Some(last) = merged.last_mut() {
            if last.len() < MIN_CHUNK_CHARS && last.len() + 2 + chunk.len() <= MAX_CHUNK_CHARS {
                last.push_str("\n\n");
                last.push_str(&chunk);
                continue;
            }
        }
        merged.push(chunk);
    }
    merged
}

/// A fast, non-cryptographic content fingerprint used only to make
/// re-ingestion idempotent, not for integrity guarantees.
pub fn content_hash(bytes: &[u8]) -> String {
    use std::hash::Hasher;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hasher.write(bytes);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_paragraph_boundaries_under_the_cap() {
        let text = "para one.\n\npara two.\n\npara three.";
        let chunks = chunk_text(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("para one"));
        assert!(chunks[0].contains("para three"));
    }

    #[test]
    fn never_exceeds_max_chunk_size() {
        let long_paragraph = "x".repeat(9000);
        let chunks = chunk_text(&long_paragraph);
        assert!(chunks.iter().all(|c| c.len() <= MAX_CHUNK_CHARS));
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn identical_bytes_hash_identically() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"world"));
    }
}
