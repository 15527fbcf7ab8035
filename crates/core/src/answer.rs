//! Display rules for answers: character-bounded truncation and the numbered
//! sources listing.

use std::borrow::Cow;

use crate::config::AnswerConfig;

/// Cuts `answer` to `config.max_chars` characters and appends the marker.
/// Answers within the bound are returned untouched. Counting is by `char`,
/// never by byte, word or sentence.
pub fn truncate_answer<'a>(answer: &'a str, config: &AnswerConfig) -> Cow<'a, str> {
    match answer.char_indices().nth(config.max_chars) {
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + config.truncation_marker.len());
            truncated.push_str(&answer[..cut]);
            truncated.push_str(&config.truncation_marker);
            Cow::Owned(truncated)
        }
        None => Cow::Borrowed(answer),
    }
}

/// `"1. first\n2. second"`, or `None` for an empty list.
pub fn numbered_sources(sources: &[String]) -> Option<String> {
    if sources.is_empty() {
        return None;
    }

    Some(
        sources
            .iter()
            .enumerate()
            .map(|(index, source)| format!("{}. {source}", index + 1))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}
