use regex::Regex;
use std::sync::LazyLock;

static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?\n]+(?:[.!?]+|\n|$)").expect("sentence pattern is valid"));

/// Splits notice text into trimmed, non-empty sentences in reading order.
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminators_and_newlines() {
        let text = "We use cookies to measure traffic. You can change your choice at any time!\nManage options";
        assert_eq!(
            split_sentences(text),
            vec![
                "We use cookies to measure traffic.",
                "You can change your choice at any time!",
                "Manage options",
            ]
        );
    }

    #[test]
    fn drops_punctuation_only_fragments() {
        assert!(split_sentences("  ... !! ").is_empty());
        assert_eq!(split_sentences("Accept?"), vec!["Accept?"]);
    }
}
