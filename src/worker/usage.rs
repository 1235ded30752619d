use serde::{Deserialize, Serialize};

/// Token/latency accounting for one worker call. When a worker does not
/// report usage, the client estimates `tokens ≈ ceil(len(text)/4)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl Usage {
    pub fn estimate_from_text(input: &str, output: &str) -> Self {
        let prompt_tokens = estimate_tokens(input);
        let completion_tokens = estimate_tokens(output);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            model: None,
            cost: None,
        }
    }
}

fn estimate_tokens(text: &str) -> u64 {
    ((text.len() + 3) / 4) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_at_four_chars_per_token() {
        let usage = Usage::estimate_from_text("abcd", "abcdefgh");
        assert_eq!(usage.prompt_tokens, 1);
        assert_eq!(usage.completion_tokens, 2);
        assert_eq!(usage.total_tokens, 3);
    }

    #[test]
    fn rounds_up_partial_tokens() {
        let usage = Usage::estimate_from_text("abc", "");
        assert_eq!(usage.prompt_tokens, 1);
    }
}
