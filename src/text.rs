//! Lightweight keyword matching over free text.
//!
//! Content is lowercased and split into word tokens (apostrophes kept, so
//! "don't" stays one token). A keyword matches when its words appear as a
//! contiguous run of tokens. A token matches a keyword word when it equals it,
//! or when it is the word plus a common inflection ("transforming",
//! "healing"). Keywords of three letters or fewer must match exactly, so
//! "but" does not catch "button" and "new" does not catch "news"; nothing
//! matches mid-word ("renew" does not contain "new").

/// Endings a keyword stem may carry and still match.
const INFLECTIONS: &[&str] = &[
    "s", "es", "ed", "d", "ing", "er", "ers", "ation", "ations", "ment", "ments", "ly", "ful",
];

/// Keywords this short only match whole tokens.
const EXACT_MAX_CHARS: usize = 3;

/// Lowercased word tokens of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `keyword` (one or more words) occurs in the token stream.
pub fn contains_keyword(tokens: &[String], keyword: &str) -> bool {
    let words: Vec<String> = tokenize(keyword);
    if words.is_empty() || words.len() > tokens.len() {
        return false;
    }
    tokens
        .windows(words.len())
        .any(|window| window.iter().zip(&words).all(|(t, w)| word_matches(t, w)))
}

fn word_matches(token: &str, word: &str) -> bool {
    if token == word {
        return true;
    }
    if word.chars().count() <= EXACT_MAX_CHARS {
        return false;
    }
    token
        .strip_prefix(word)
        .is_some_and(|rest| INFLECTIONS.contains(&rest))
}

/// Whether any keyword in `keywords` occurs in the token stream.
pub fn contains_any(tokens: &[String], keywords: &[&str]) -> bool {
    keywords.iter().any(|k| contains_keyword(tokens, k))
}

/// How many keywords in `keywords` occur in the token stream.
pub fn count_matches(tokens: &[String], keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| contains_keyword(tokens, k)).count()
}

/// The first `max_chars` characters of `text`, on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("I don't KNOW, really!"),
            vec!["i", "don't", "know", "really"]
        );
    }

    #[test]
    fn prefix_match_catches_inflections() {
        let tokens = tokenize("I am transforming and healing");
        assert!(contains_keyword(&tokens, "transform"));
        assert!(contains_keyword(&tokens, "heal"));
        assert!(!contains_keyword(&tokens, "grow"));
    }

    #[test]
    fn short_keywords_match_whole_tokens_only() {
        let tokens = tokenize("a butterfly pressed a button and read the news in a letter");
        assert!(!contains_keyword(&tokens, "but"));
        assert!(!contains_keyword(&tokens, "new"));
        assert!(!contains_keyword(&tokens, "let"));
        assert!(contains_keyword(&tokenize("something new, but calm"), "but"));
    }

    #[test]
    fn stems_only_take_known_inflections() {
        assert!(!contains_keyword(&tokenize("good health"), "heal"));
        assert!(contains_keyword(&tokenize("she heals"), "heal"));
        assert!(contains_keyword(&tokenize("a transformation"), "transform"));
        assert!(!contains_keyword(&tokenize("the lost city of wanton"), "want"));
    }

    #[test]
    fn keyword_does_not_match_mid_word() {
        let tokens = tokenize("time to renew");
        assert!(!contains_keyword(&tokens, "new"));
    }

    #[test]
    fn multi_word_keywords_need_contiguous_tokens() {
        assert!(contains_keyword(&tokenize("I need to let go now"), "let go"));
        assert!(!contains_keyword(&tokenize("let me go"), "let go"));
        assert!(contains_keyword(&tokenize("I don't know"), "don't know"));
    }

    #[test]
    fn count_and_any() {
        let tokens = tokenize("happy and grateful but worried");
        assert_eq!(count_matches(&tokens, &["happy", "grateful", "joy"]), 2);
        assert!(contains_any(&tokens, &["sad", "worried"]));
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo wörld", 4), "héll");
        assert_eq!(excerpt("ab", 10), "ab");
    }
}
