//! Text preprocessing for corpus building and embedding input.
//!
//! - `normalize`: markup, links and line breaks removed, lowercased
//! - `clean_for_training`: stemmed alphanumeric tokens, training corpus only
//! - `split_sentences`: punctuation-based sentence segmentation
//! - `normalize_scraped`: `normalize` plus StackOverflow boilerplate removal

use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};

static HTML_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<.*?>|&([a-z0-9]+|#[0-9]{1,6}|#x[0-9a-f]{1,6});")
        .expect("Invalid html regex pattern")
});

// Permissive: anything shaped like `host.tld/path` goes, scheme optional.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(https?://)?([\da-z.-]+)\.([a-z.]{2,6})([/\w .-]*)")
        .expect("Invalid url regex pattern")
});

static NEWLINE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\r\n]+").expect("Invalid newline regex pattern"));

// `. ! ?` followed by whitespace or end of text
static SENTENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("Invalid sentence regex pattern"));

static STACK_OVERFLOW_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"thanks for contributing an answer to stack overflow .*? required, but never shown")
            .expect("Invalid boilerplate regex pattern"),
        Regex::new(r"thanks for contributing an answer to stack overflow")
            .expect("Invalid boilerplate regex pattern"),
        Regex::new(r"stack overflow").expect("Invalid boilerplate regex pattern"),
    ]
});

/// Clean raw text for labelling and querying.
///
/// Strips HTML tags and character entities, then links, lowercases and turns
/// every run of line breaks into one space. Never fails; malformed markup is
/// left as text. The passes repeat until the text stops changing, so
/// `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> String {
    let mut text = normalize_pass(raw);
    // stripping can splice leftovers into new entities or links, e.g. `&am&amp;p;`
    loop {
        let next = normalize_pass(&text);
        if next == text {
            return text;
        }
        text = next;
    }
}

fn normalize_pass(raw: &str) -> String {
    let text = HTML_PATTERN.replace_all(raw, "");
    let text = URL_PATTERN.replace_all(&text, "");
    let text = text.to_lowercase();
    NEWLINE_PATTERN.replace_all(&text, " ").into_owned()
}

/// Stemmer used for the training corpus and word-vector lookups.
pub fn english_stemmer() -> Stemmer {
    Stemmer::create(Algorithm::English)
}

/// Tokens of `line` reduced to their lowercased, stemmed alphanumeric form.
pub fn training_tokens<'a>(line: &'a str, stemmer: &'a Stemmer) -> impl Iterator<Item = String> + 'a {
    line.split_whitespace()
        .map(|token| {
            token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
        .map(move |token| stemmer.stem(&token).into_owned())
}

/// Training-corpus variant of a line: stemmed tokens joined by single spaces.
pub fn clean_for_training(line: &str, stemmer: &Stemmer) -> String {
    training_tokens(line, stemmer).collect::<Vec<_>>().join(" ")
}

/// Split text into trimmed, non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut last_end = 0;

    for mat in SENTENCE_PATTERN.find_iter(text) {
        let sentence = text[last_end..mat.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        last_end = mat.end();
    }

    // trailing sentence without punctuation
    let rest = text[last_end..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }

    sentences
}

/// `normalize` for scraped question pages, dropping the site's footer phrases.
pub fn normalize_scraped(raw: &str) -> String {
    let mut text = normalize(raw);
    for pattern in STACK_OVERFLOW_PATTERNS.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }
    text
}
