//! Text analysis used by the full-text fallback ranker and the
//! embedding cosine-similarity scorer.

/// Lowercases, strips diacritics (ASCII fold) and splits on non-alphanumerics.
pub fn tokenize(text: &str) -> Vec<String> {
    fold_ascii(text)
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Edge n-grams of length 3 for every token, to catch partial/prefix matches.
pub fn edge_trigrams(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 3 {
        return vec![token.to_string()];
    }
    (3..=chars.len()).map(|end| chars[..end].iter().collect()).collect()
}

fn fold_ascii(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Full-text relevance score for `candidate_name` against `query`:
/// fraction of query tokens whose edge-trigram set intersects the
/// candidate's, weighted toward exact token matches.
pub fn text_score(query: &str, candidate_name: &str, candidate_text: &str) -> f64 {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return 0.0;
    }

    let name_tokens: Vec<String> = tokenize(candidate_name);
    let body_tokens: Vec<String> = tokenize(candidate_text);

    let name_grams: std::collections::HashSet<String> =
        name_tokens.iter().flat_map(|t| edge_trigrams(t)).collect();

    let mut score = 0.0;
    for token in &query_tokens {
        if name_tokens.contains(token) {
            score += 2.0;
        } else if body_tokens.contains(token) {
            score += 1.0;
        } else if edge_trigrams(token).iter().any(|g| name_grams.contains(g)) {
            score += 0.5;
        }
    }
    score / (query_tokens.len() as f64 * 2.0)
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_name_token_scores_higher_than_prefix_match() {
        let exact = text_score("budget", "q3 budget review", "");
        let prefix = text_score("budg", "q3 budget review", "");
        assert!(exact > prefix);
    }

    #[test]
    fn accent_folding_matches_unaccented_query() {
        let score = text_score("cafe", "Café Menu", "");
        assert!(score > 0.0);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
    }
}
