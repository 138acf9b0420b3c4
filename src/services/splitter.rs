//! Paragraph splitting for overlong generated text.
//!
//! The model is asked for compact paragraphs but regularly overshoots.
//! The splitter breaks an overlong text at sentence boundaries into
//! paragraphs near a target length, never cutting inside a marker span
//! and never leaving a runt paragraph at the end.

use crate::domain::models::SplitConfig;
use crate::services::text::{countable_words, leading_micro_title, split_sentences};
use crate::services::text::{MICRO_END, MICRO_START};

/// Word limits for one splitting pass.
#[derive(Debug, Clone, Copy)]
pub struct SplitLimits {
    pub max_words: usize,
    pub target_words: usize,
    pub min_words: usize,
}

impl SplitConfig {
    pub fn body_limits(&self) -> SplitLimits {
        SplitLimits {
            max_words: self.body_max_words,
            target_words: self.body_target_words,
            min_words: self.body_min_words,
        }
    }

    pub fn box_limits(&self) -> SplitLimits {
        SplitLimits {
            max_words: self.box_max_words,
            target_words: self.box_target_words,
            min_words: self.box_min_words,
        }
    }
}

/// Split `text` into blank-line separated paragraphs when it exceeds
/// `limits.max_words`. Text at or under the limit is returned verbatim,
/// so the operation is idempotent. A leading micro-heading span stays
/// attached to the first paragraph and does not count against limits.
pub fn split_long_text(text: &str, limits: &SplitLimits) -> String {
    if countable_words(text) <= limits.max_words {
        return text.to_string();
    }

    let (micro, body) = match leading_micro_title(text) {
        Some((title, rest)) => (Some(title), rest),
        None => (None, text.to_string()),
    };

    let sentences = split_sentences(&body);
    let mut paragraphs: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0usize;

    for sentence in sentences {
        let words = countable_words(&sentence);
        if current_words >= limits.target_words && !current.is_empty() {
            paragraphs.push(std::mem::take(&mut current));
            current_words = 0;
        }
        current_words += words;
        current.push(sentence);
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    // Merge a runt tail into its predecessor.
    if paragraphs.len() >= 2 {
        let tail_words: usize = paragraphs
            .last()
            .map(|p| p.iter().map(|s| countable_words(s)).sum())
            .unwrap_or(0);
        if tail_words < limits.min_words {
            if let Some(tail) = paragraphs.pop() {
                if let Some(prev) = paragraphs.last_mut() {
                    prev.extend(tail);
                }
            }
        }
    }

    let mut joined = paragraphs
        .iter()
        .map(|p| p.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n");

    if let Some(title) = micro {
        joined = format!("{MICRO_START}{title}{MICRO_END}{joined}");
    }
    joined
}
