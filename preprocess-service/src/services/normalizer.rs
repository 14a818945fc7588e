//! Text normalization applied before generation.

/// Case-fold `text`. Whitespace and punctuation are kept as-is; no trimming
/// or Unicode normalization beyond lowercasing.
///
/// Idempotent: `preprocess(&preprocess(s)) == preprocess(s)`.
pub fn preprocess(text: &str) -> String {
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_ascii() {
        assert_eq!(preprocess("HELLO WORLD"), "hello world");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(preprocess(""), "");
    }

    #[test]
    fn keeps_surrounding_whitespace() {
        assert_eq!(preprocess("  Mixed Case\t\n"), "  mixed case\t\n");
    }

    #[test]
    fn folds_non_ascii() {
        assert_eq!(preprocess("ÉCOLE ΣΟΦΙΑ"), "école σοφια");
        assert_eq!(preprocess("İ"), "i\u{307}");
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            "",
            "already lower",
            "HELLO WORLD",
            "ÉCOLE ΣΟΦΙΑΣ",
            "Straße ǅ ß",
            "123 !? MiXeD",
        ];
        for s in samples {
            let once = preprocess(s);
            assert_eq!(preprocess(&once), once, "not idempotent for {:?}", s);
            assert_eq!(once, s.to_lowercase());
        }
    }
}
