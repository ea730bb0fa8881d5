//! Text normalization for search queries and fetched posts.

use std::sync::LazyLock;

use regex::Regex;

/// Posts shorter than this after cleaning carry too little signal to score.
pub const MIN_POST_CHARS: usize = 10;

/// Texts shorter than this are scored neutral without calling the model.
pub const MIN_SCORABLE_CHARS: usize = 3;

static RE_NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static RE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+|www\.\S+").unwrap());
static RE_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").unwrap());
static RE_HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static RE_RETWEET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^RT\b\s*:?\s*").unwrap());

/// Exact-phrase search query for a topic: punctuation stripped, quoted.
/// Returns `None` if nothing searchable is left.
pub fn search_query(topic: &str) -> Option<String> {
    let stripped = RE_NON_WORD.replace_all(topic, "");
    let collapsed = RE_WHITESPACE.replace_all(stripped.trim(), " ");
    if collapsed.is_empty() {
        return None;
    }
    Some(format!("\"{collapsed}\""))
}

/// Remove URLs and mentions, unwrap hashtags, drop a retweet prefix, collapse whitespace.
pub fn clean_post_text(text: &str) -> String {
    let text = RE_URL.replace_all(text, "");
    let text = RE_MENTION.replace_all(&text, "");
    let text = RE_HASHTAG.replace_all(&text, "$1");
    let text = RE_WHITESPACE.replace_all(text.trim(), " ");
    RE_RETWEET.replace(&text, "").trim().to_string()
}

pub fn is_substantive(text: &str) -> bool {
    text.chars().count() >= MIN_POST_CHARS
}

pub fn is_scorable(text: &str) -> bool {
    text.trim().chars().count() >= MIN_SCORABLE_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_strips_punctuation_and_quotes() {
        assert_eq!(search_query("  Rust-lang 2024! ").as_deref(), Some("\"Rustlang 2024\""));
        assert_eq!(search_query("climate   change").as_deref(), Some("\"climate change\""));
        assert_eq!(search_query("?!#"), None);
        assert_eq!(search_query("   "), None);
    }

    #[test]
    fn cleaning_removes_noise() {
        let raw = "RT @alice: Loving the new #RustLang release https://t.co/abc123   so fast";
        assert_eq!(clean_post_text(raw), "Loving the new RustLang release so fast");
    }

    #[test]
    fn cleaning_keeps_words_that_start_with_rt() {
        assert_eq!(clean_post_text("RTX cards are pricey"), "RTX cards are pricey");
    }

    #[test]
    fn cleaning_handles_www_links_and_newlines() {
        assert_eq!(
            clean_post_text("see www.example.com/page\n\nthoughts?"),
            "see thoughts?"
        );
    }

    #[test]
    fn length_thresholds() {
        assert!(!is_substantive("too short"));
        assert!(is_substantive("long enough"));
        assert!(!is_scorable("  ok "));
        assert!(is_scorable("meh"));
    }
}
