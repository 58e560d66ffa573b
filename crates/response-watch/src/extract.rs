//! Echoed-question boundary heuristic, kept as pure functions so its edge
//! cases stay independently testable.

use serde::{Deserialize, Serialize};

/// Tuning for the boundary heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPolicy {
    /// Lines longer than this are taken for the echoed question; UI
    /// filler (labels, nav items, button captions) stays shorter in
    /// practice.
    pub question_line_min_len: usize,
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self {
            question_line_min_len: 60,
        }
    }
}

/// Index of the first line whose trimmed length exceeds the threshold,
/// scanning top down.
pub fn answer_boundary(text: &str, policy: &ExtractionPolicy) -> Option<usize> {
    text.lines()
        .position(|line| line.trim().chars().count() > policy.question_line_min_len)
}

/// Split the captured text into the answer that follows the echoed
/// question. When no boundary exists the whole text comes back unchanged
/// and the capture is flagged so the caller can log it as degraded.
pub fn split_answer(text: &str, policy: &ExtractionPolicy) -> (String, bool) {
    match answer_boundary(text, policy) {
        Some(boundary) => {
            let answer: Vec<&str> = text.lines().skip(boundary + 1).collect();
            (answer.join("\n").trim().to_string(), false)
        }
        None => (text.trim().to_string(), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(min_len: usize) -> ExtractionPolicy {
        ExtractionPolicy {
            question_line_min_len: min_len,
        }
    }

    #[test]
    fn boundary_is_the_first_over_length_line() {
        let text = "Chat\nNew conversation\nWhat is the ideal nitrogen application rate for winter wheat in sandy soil?\nFor winter wheat in sandy soil, split applications work best.\nTypically 180-220 kg/ha total.";
        let found = answer_boundary(text, &policy(60));
        assert_eq!(found, Some(2));

        let (answer, degraded) = split_answer(text, &policy(60));
        assert!(!degraded);
        assert_eq!(
            answer,
            "For winter wheat in sandy soil, split applications work best.\nTypically 180-220 kg/ha total."
        );
    }

    #[test]
    fn missing_boundary_returns_the_whole_text_degraded() {
        let text = "Short line\nAnother short line\nStill short";
        assert_eq!(answer_boundary(text, &policy(60)), None);

        let (answer, degraded) = split_answer(text, &policy(60));
        assert!(degraded);
        assert_eq!(answer, text);
    }

    #[test]
    fn boundary_on_the_last_line_yields_an_empty_answer() {
        let text = "Nav\nThis opening question is deliberately padded to run past the configured threshold";
        let (answer, degraded) = split_answer(text, &policy(60));
        assert!(!degraded);
        assert_eq!(answer, "");
    }

    #[test]
    fn later_long_lines_stay_inside_the_answer() {
        let text = "menu\nAAAAAAAAAAAAAAAAAAAA\nanswer starts here\nBBBBBBBBBBBBBBBBBBBBBBBB\ntail";
        let (answer, degraded) = split_answer(text, &policy(15));
        assert!(!degraded);
        assert_eq!(answer, "answer starts here\nBBBBBBBBBBBBBBBBBBBBBBBB\ntail");
    }

    #[test]
    fn line_length_counts_characters_not_bytes() {
        // Ten multi-byte characters: 30 bytes, but only 10 chars.
        let text = "垄垄垄垄垄垄垄垄垄垄\nanswer";
        assert_eq!(answer_boundary(text, &policy(9)), Some(0));
        assert_eq!(answer_boundary(text, &policy(10)), None);
    }

    #[test]
    fn surrounding_whitespace_does_not_count_toward_line_length() {
        let padded = format!("{}short{}\nanswer", " ".repeat(80), " ".repeat(80));
        assert_eq!(answer_boundary(&padded, &policy(60)), None);
    }
}
