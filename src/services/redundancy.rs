//! Cross-unit anti-redundancy for generated practice scenarios.
//!
//! Injected practice boxes are written one after another with the same
//! prompt shape, so the model drifts toward identical openers and the
//! same stock question. The tracker records normalized openers and
//! questions from accepted texts and flags clashes before acceptance.

use std::collections::HashSet;

use crate::services::text::{normalize_key, split_sentences, strip_markers};

/// Stock phrases that read as filler in any scenario; always flagged.
const FORBIDDEN_PHRASES: [&str; 4] = [
    "stel je voor",
    "in deze situatie",
    "wat zou jij doen",
    "imagine that",
];

/// Outcome of checking a candidate text against the tracker.
#[derive(Debug, Default)]
pub struct RedundancyCheck {
    /// Normalized opener already used by an earlier unit.
    pub clashing_opener: Option<String>,
    /// Questions already asked by earlier units.
    pub clashing_questions: Vec<String>,
    /// Forbidden stock phrases present in the text.
    pub forbidden: Vec<String>,
}

impl RedundancyCheck {
    pub fn is_clean(&self) -> bool {
        self.clashing_opener.is_none()
            && self.clashing_questions.is_empty()
            && self.forbidden.is_empty()
    }
}

/// Tracks openers and questions across a generation run.
#[derive(Debug, Default)]
pub struct RedundancyTracker {
    seen_openers: HashSet<String>,
    seen_questions: HashSet<String>,
}

impl RedundancyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a candidate text without recording it.
    pub fn check(&self, text: &str) -> RedundancyCheck {
        let plain = strip_markers(text);
        let mut result = RedundancyCheck::default();

        if let Some(opener) = opener_key(&plain) {
            if self.seen_openers.contains(&opener) {
                result.clashing_opener = Some(opener);
            }
        }
        for question in question_keys(&plain) {
            if self.seen_questions.contains(&question) {
                result.clashing_questions.push(question);
            }
        }
        let lower = plain.to_lowercase();
        for phrase in FORBIDDEN_PHRASES {
            if lower.contains(phrase) {
                result.forbidden.push(phrase.to_string());
            }
        }
        result
    }

    /// Record an accepted text's opener and questions.
    pub fn record(&mut self, text: &str) {
        let plain = strip_markers(text);
        if let Some(opener) = opener_key(&plain) {
            self.seen_openers.insert(opener);
        }
        self.seen_questions.extend(question_keys(&plain));
    }
}

fn opener_key(plain: &str) -> Option<String> {
    let first = split_sentences(plain).into_iter().next()?;
    let key = normalize_key(&first);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

fn question_keys(plain: &str) -> Vec<String> {
    split_sentences(plain)
        .into_iter()
        .filter(|s| s.trim_end().ends_with('?'))
        .map(|s| normalize_key(&s))
        .filter(|k| !k.is_empty())
        .collect()
}
