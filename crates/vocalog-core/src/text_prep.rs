//! Text preparation for the TTS provider — normalisation and chunking.
//!
//! Pure functions, no I/O. The provider rejects requests longer than
//! [`PROVIDER_MAX_CHARS`] characters, so long input is split into several
//! requests whose MP3 frames are concatenated afterwards.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum characters per provider request.
pub const PROVIDER_MAX_CHARS: usize = 100;

// Compiled regexes — allocated once, reused across calls.
static RE_HYPHEN_EOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\r?\n").unwrap());
static RE_TONE_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([?!？！؟])(\S)").unwrap());
static RE_ABBREVIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(dr|jr|mr|mrs|ms|msgr|prof|sr|st)\.").unwrap()
});
static RE_ESQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bEsq\.").unwrap());
static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Characters after which a chunk may end, best first.
const CLAUSE_BREAKS: &[char] = &['.', '!', '?', '؟', '。', ';', ':', ',', '،'];

/// Normalise text the way the provider reads it best.
///
/// Joins words hyphenated across line ends, separates tone marks from the
/// next word, drops the period of common abbreviations (so `Dr. Smith` is not
/// read as a sentence end) and collapses whitespace.
pub fn preprocess(text: &str) -> String {
    let mut c = RE_HYPHEN_EOL.replace_all(text, "").into_owned();
    c = RE_TONE_MARK.replace_all(&c, "$1 $2").into_owned();
    c = RE_ABBREVIATION.replace_all(&c, "$1").into_owned();
    c = RE_ESQUIRE.replace_all(&c, "Esquire").into_owned();
    c = RE_WHITESPACE.replace_all(&c, " ").into_owned();
    c.trim().to_string()
}

/// Split text into chunks of at most `max_chars` characters.
///
/// Prefers clause boundaries (punctuation followed by a space) in the second
/// half of the window, then word boundaries, then hard-splits on a character
/// boundary. Chunks without any alphanumeric character are discarded.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut result = Vec::new();
    let mut remaining = text.trim();

    while let Some((window_end, _)) = remaining.char_indices().nth(max_chars) {
        let window = &remaining[..window_end];

        let split_at = clause_boundary(window, max_chars)
            .or_else(|| word_boundary(window, max_chars))
            .unwrap_or(window_end);

        push_chunk(&mut result, &remaining[..split_at]);
        remaining = remaining[split_at..].trim_start();
    }

    push_chunk(&mut result, remaining);
    result
}

/// Normalise and chunk text for the provider.
pub fn prepare_chunks(text: &str) -> Vec<String> {
    split_text(&preprocess(text), PROVIDER_MAX_CHARS)
}

fn push_chunk(out: &mut Vec<String>, chunk: &str) {
    let chunk = chunk.trim();
    if chunk.chars().any(char::is_alphanumeric) {
        out.push(chunk.to_string());
    }
}

/// Byte offset just past the last clause-ending punctuation that is followed
/// by whitespace, if it lies in the second half of the window.
fn clause_boundary(window: &str, max_chars: usize) -> Option<usize> {
    let mut best = None;
    let mut chars = window.char_indices().enumerate().peekable();
    while let Some((n, (i, c))) = chars.next() {
        let followed_by_space = chars.peek().is_some_and(|(_, (_, next))| next.is_whitespace());
        if CLAUSE_BREAKS.contains(&c) && followed_by_space && n + 1 >= max_chars / 2 {
            best = Some(i + c.len_utf8());
        }
    }
    best
}

/// Byte offset of the last space, if it lies past the first third of the window.
fn word_boundary(window: &str, max_chars: usize) -> Option<usize> {
    let mut best = None;
    for (n, (i, c)) in window.char_indices().enumerate() {
        if c.is_whitespace() && n >= max_chars / 3 {
            best = Some(i);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── preprocess ──────────────────────────────────────────────────

    #[test]
    fn joins_hyphenated_line_ends() {
        assert_eq!(preprocess("speci-\nfication"), "specification");
    }

    #[test]
    fn drops_abbreviation_periods() {
        assert_eq!(preprocess("Dr. Smith met Mrs. Jones"), "Dr Smith met Mrs Jones");
    }

    #[test]
    fn expands_esquire() {
        assert_eq!(preprocess("John Doe, Esq."), "John Doe, Esquire");
    }

    #[test]
    fn spaces_tone_marks() {
        assert_eq!(preprocess("Really?Yes!Fine"), "Really? Yes! Fine");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(preprocess("  hello \n\t world  "), "hello world");
    }

    #[test]
    fn plain_text_unchanged() {
        assert_eq!(
            preprocess("Hello, how are you today?"),
            "Hello, how are you today?"
        );
    }

    // ── split_text ──────────────────────────────────────────────────

    #[test]
    fn short_text_not_split() {
        assert_eq!(split_text("Hello world.", 100), vec!["Hello world."]);
    }

    #[test]
    fn exact_length_not_split() {
        let text = "a".repeat(100);
        assert_eq!(split_text(&text, 100), vec![text]);
    }

    #[test]
    fn splits_at_clause_boundary() {
        let text = "First sentence here. Second sentence that is long enough to push past the limit.";
        let chunks = split_text(text, 40);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0], "First sentence here.");
    }

    #[test]
    fn splits_at_word_boundary() {
        let text = "word ".repeat(50);
        let chunks = split_text(text.trim(), 30);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn hard_splits_long_word() {
        let text = "a".repeat(250);
        let chunks = split_text(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn hard_split_respects_char_boundaries() {
        // Arabic letters are two bytes each in UTF-8.
        let text = "م".repeat(150);
        let chunks = split_text(&text, 100);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 100);
        assert_eq!(chunks[1].chars().count(), 50);
    }

    #[test]
    fn arabic_comma_is_a_clause_break() {
        let text = format!("{}، {}", "ب".repeat(60), "ت".repeat(60));
        let chunks = split_text(&text, 100);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].ends_with('،'));
    }

    #[test]
    fn drops_punctuation_only_chunks() {
        assert!(split_text("...  !!", 100).is_empty());
        assert!(split_text("   ", 100).is_empty());
    }

    #[test]
    fn preserves_all_content() {
        let text = "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs. How vexingly quick daft zebras jump.";
        let chunks = split_text(text, 50);
        let rejoined: String = chunks.join(" ");
        for word in text.split_whitespace() {
            assert!(rejoined.contains(word), "missing word: {}", word);
        }
    }

    #[test]
    fn prepare_chunks_respects_provider_limit() {
        let text = "This is a fairly ordinary sentence, with a clause or two. ".repeat(10);
        let chunks = prepare_chunks(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= PROVIDER_MAX_CHARS);
        }
    }
}
