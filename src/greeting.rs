/// Substring matcher over a fixed list of greeting phrases.
///
/// Matching is case-insensitive and ignores word boundaries, so "hi" also
/// matches inside "chill".
#[derive(Debug, Clone)]
pub struct GreetingMatcher {
    phrases: Vec<String>,
}

impl GreetingMatcher {
    pub fn new(phrases: &[String]) -> Self {
        Self {
            phrases: phrases
                .iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn contains_greeting(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.phrases.iter().any(|phrase| text.contains(phrase.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> GreetingMatcher {
        let phrases: Vec<String> = ["доброе утро", "привет", "good morning", "hello", "hi"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        GreetingMatcher::new(&phrases)
    }

    #[test]
    fn test_case_variants_match_anywhere() {
        let m = matcher();
        assert!(m.contains_greeting("hello"));
        assert!(m.contains_greeting("HeLLo there"));
        assert!(m.contains_greeting("well, GOOD MORNING everyone"));
        assert!(m.contains_greeting("Всем ПРИВЕТ!"));
        assert!(m.contains_greeting("Доброе Утро, команда"));
    }

    #[test]
    fn test_no_phrase_no_match() {
        let m = matcher();
        assert!(!m.contains_greeting("what time is it?"));
        assert!(!m.contains_greeting(""));
        assert!(!m.contains_greeting("пока"));
    }

    #[test]
    fn test_substring_inside_word() {
        assert!(matcher().contains_greeting("just chill"));
    }

    #[test]
    fn test_empty_phrases_ignored() {
        let m = GreetingMatcher::new(&[String::new()]);
        assert!(!m.contains_greeting("anything"));
    }
}
