//! Text utilities shared by the pipeline stages.
//!
//! Generated text carries two kinds of inline markers: a micro-heading
//! span at the start of a paragraph, and bold spans around key terms.
//! Splitting and word-counting must treat marker spans as atomic, so
//! every helper here is marker-aware.

pub const MICRO_START: &str = "<<MICRO_TITLE>>";
pub const MICRO_END: &str = "<<MICRO_TITLE_END>>";
pub const BOLD_START: &str = "<<BOLD_START>>";
pub const BOLD_END: &str = "<<BOLD_END>>";

/// Collapse all whitespace runs to single spaces and trim.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into sentences at `.`, `!`, `?` followed by whitespace or
/// end of input. Never splits inside a marker span, so a micro-heading
/// like "Osmose. Hoe werkt het?" stays attached to its paragraph.
pub fn split_sentences(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut depth = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        // Marker tokens all open with '<', an ASCII byte that cannot
        // occur inside a multibyte character, so slicing here is safe.
        if b == b'<' {
            let rest = &text[i..];
            if rest.starts_with(MICRO_START) {
                depth += 1;
                i += MICRO_START.len();
                continue;
            }
            if rest.starts_with(MICRO_END) {
                depth = depth.saturating_sub(1);
                i += MICRO_END.len();
                continue;
            }
            if rest.starts_with(BOLD_START) {
                depth += 1;
                i += BOLD_START.len();
                continue;
            }
            if rest.starts_with(BOLD_END) {
                depth = depth.saturating_sub(1);
                i += BOLD_END.len();
                continue;
            }
        }
        if depth == 0 && matches!(b, b'.' | b'!' | b'?') {
            let at_end = i + 1 == bytes.len();
            let before_space = !at_end && bytes[i + 1].is_ascii_whitespace();
            if at_end || before_space {
                let sentence = text[start..=i].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = i + 1;
            }
        }
        i += 1;
    }

    let tail = text[start.min(text.len())..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Words that count against split limits: the micro-heading span is
/// excluded entirely, bold markers are stripped but their content kept.
pub fn countable_words(text: &str) -> usize {
    let body = match leading_micro_title(text) {
        Some((_, rest)) => rest,
        None => text.to_string(),
    };
    strip_markers(&body).split_whitespace().count()
}

/// Remove all marker tokens, keeping the text they wrap.
pub fn strip_markers(text: &str) -> String {
    let stripped = text
        .replace(MICRO_START, " ")
        .replace(MICRO_END, " ")
        .replace(BOLD_START, "")
        .replace(BOLD_END, "");
    normalize_ws(&stripped)
}

/// If `text` opens with a micro-heading span, return (title, remainder).
pub fn leading_micro_title(text: &str) -> Option<(String, String)> {
    let trimmed = text.trim_start();
    let after_start = trimmed.strip_prefix(MICRO_START)?;
    let end = after_start.find(MICRO_END)?;
    let title = after_start[..end].trim().to_string();
    let rest = after_start[end + MICRO_END.len()..].trim_start().to_string();
    Some((title, rest))
}

/// Fold text to a comparison key: lowercase, diacritics folded,
/// punctuation dropped, whitespace collapsed.
pub fn normalize_key(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        let folded = fold_diacritic(ch);
        if folded.is_alphanumeric() {
            out.push(folded);
        } else {
            out.push(' ');
        }
    }
    normalize_ws(&out)
}

fn fold_diacritic(ch: char) -> char {
    match ch {
        'à' | 'á' | 'â' | 'ä' | 'å' | 'ã' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'ö' | 'õ' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        _ => ch,
    }
}

const ARTICLES: [&str; 6] = ["de ", "het ", "een ", "the ", "a ", "an "];

/// Strip one leading Dutch or English article, case-insensitively.
pub fn strip_leading_article(text: &str) -> &str {
    let lower = text.to_lowercase();
    for article in ARTICLES {
        if lower.starts_with(article) {
            return text[article.len()..].trim_start();
        }
    }
    text
}

/// Lowercase the first letter unless the first token reads like an
/// abbreviation or code (all caps/digits, length >= 2).
pub fn lowercase_first(text: &str) -> String {
    let trimmed = text.trim_start();
    let first_token = trimmed.split_whitespace().next().unwrap_or("");
    if first_token.len() >= 2
        && first_token
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return trimmed.to_string();
    }
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Capitalize the first letter.
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Derive a short fallback title from running text: the opening noun
/// phrase of the first sentence, article stripped, at most four words.
pub fn leading_noun_phrase(text: &str) -> Option<String> {
    let plain = strip_markers(text);
    let first = split_sentences(&plain).into_iter().next()?;
    let clause = first.split(',').next().unwrap_or(&first);
    let stripped = strip_leading_article(clause);
    let words: Vec<&str> = stripped
        .split_whitespace()
        .take(4)
        .map(|w| w.trim_end_matches(['.', '!', '?', ':', ';']))
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(capitalize_first(&words.join(" ")))
}
