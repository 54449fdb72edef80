use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use teloxide::types::UserId;

pub const NEXT_BATCH: &str = "next_batch";
pub const FINISH_QUIZ: &str = "finish_quiz";

/// Telegram rejects quiz questions longer than this many characters.
pub const MAX_POLL_QUESTION_LEN: usize = 300;

/// Fits a question into a poll, cutting it short with an ellipsis when it is
/// over the limit.
pub fn poll_question_text(text: &str) -> String {
    if text.chars().count() <= MAX_POLL_QUESTION_LEN {
        return text.to_string();
    }
    let mut truncated = text
        .chars()
        .take(MAX_POLL_QUESTION_LEN - 1)
        .collect::<String>();
    truncated.push('…');
    truncated
}

/// What the user is offered after a batch of polls. Purely advisory: either
/// action may arrive at any time and must be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    NextBatch,
    FinishQuiz,
}

impl Continuation {
    pub fn after_batch(has_more: bool) -> Self {
        if has_more {
            Self::NextBatch
        } else {
            Self::FinishQuiz
        }
    }

    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data {
            NEXT_BATCH => Some(Self::NextBatch),
            FINISH_QUIZ => Some(Self::FinishQuiz),
            _ => None,
        }
    }

    pub fn callback_data(self) -> &'static str {
        match self {
            Self::NextBatch => NEXT_BATCH,
            Self::FinishQuiz => FINISH_QUIZ,
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            Self::NextBatch => "Next 5",
            Self::FinishQuiz => "Finish Quiz",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::NextBatch => "🧪 Ready for more?",
            Self::FinishQuiz => "🏁 Final questions!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchedPoll {
    pub user: UserId,
    pub correct_index: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub user: UserId,
    pub is_correct: bool,
}

/// Polls that have been sent but not yet answered, keyed by Telegram poll id.
#[derive(Default)]
pub struct PollRegistry {
    polls: Mutex<HashMap<String, DispatchedPoll>>,
}

impl PollRegistry {
    pub fn record(&self, poll_id: String, poll: DispatchedPoll) {
        let mut polls = self.polls.lock().unwrap_or_else(PoisonError::into_inner);
        polls.insert(poll_id, poll);
    }

    /// Consumes the record for `poll_id`; a second answer to the same poll
    /// finds nothing.
    pub fn resolve(&self, poll_id: &str, chosen: &[u8]) -> Option<AnswerOutcome> {
        let poll = self
            .polls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(poll_id)?;
        Some(AnswerOutcome {
            user: poll.user,
            is_correct: chosen.contains(&poll.correct_index),
        })
    }

    pub fn pending(&self) -> usize {
        self.polls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(poll_id: &str, user: u64, correct_index: u8) -> PollRegistry {
        let registry = PollRegistry::default();
        registry.record(
            poll_id.to_string(),
            DispatchedPoll {
                user: UserId(user),
                correct_index,
            },
        );
        registry
    }

    #[test]
    fn correct_choice_is_recognised() {
        let registry = registry_with("p1", 3, 2);
        assert_eq!(
            registry.resolve("p1", &[2]),
            Some(AnswerOutcome {
                user: UserId(3),
                is_correct: true
            })
        );
    }

    #[test]
    fn wrong_or_empty_choice_is_incorrect() {
        let registry = registry_with("p1", 3, 0);
        assert_eq!(registry.resolve("p1", &[1]).map(|o| o.is_correct), Some(false));

        let registry = registry_with("p2", 3, 0);
        assert_eq!(registry.resolve("p2", &[]).map(|o| o.is_correct), Some(false));
    }

    #[test]
    fn records_are_single_use() {
        let registry = registry_with("p1", 3, 0);
        assert!(registry.resolve("p1", &[0]).is_some());
        assert!(registry.resolve("p1", &[0]).is_none());
        assert_eq!(registry.pending(), 0);
    }

    #[test]
    fn unknown_poll_is_ignored() {
        let registry = registry_with("p1", 3, 0);
        assert!(registry.resolve("other", &[0]).is_none());
        assert_eq!(registry.pending(), 1);
    }

    #[test]
    fn short_questions_are_sent_as_is() {
        let text = "x".repeat(MAX_POLL_QUESTION_LEN - 1);
        assert_eq!(poll_question_text(&text), text);

        let text = "x".repeat(MAX_POLL_QUESTION_LEN);
        assert_eq!(poll_question_text(&text), text);
    }

    #[test]
    fn long_questions_end_in_an_ellipsis() {
        let text = "x".repeat(MAX_POLL_QUESTION_LEN + 1);
        let sent = poll_question_text(&text);
        assert_eq!(sent.chars().count(), MAX_POLL_QUESTION_LEN);
        assert!(sent.ends_with('…'));
        assert_eq!(sent.trim_end_matches('…'), "x".repeat(MAX_POLL_QUESTION_LEN - 1));
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        // 300 Cyrillic letters are 600 bytes but still fit.
        let fits = "ж".repeat(MAX_POLL_QUESTION_LEN);
        assert_eq!(poll_question_text(&fits), fits);

        let text = "🧪".repeat(MAX_POLL_QUESTION_LEN + 5);
        let sent = poll_question_text(&text);
        assert_eq!(sent.chars().count(), MAX_POLL_QUESTION_LEN);
        assert!(sent.starts_with("🧪🧪"));
        assert!(sent.ends_with('…'));
    }

    #[test]
    fn continuation_round_trips_through_callback_data() {
        for continuation in [Continuation::NextBatch, Continuation::FinishQuiz] {
            assert_eq!(
                Continuation::from_callback_data(continuation.callback_data()),
                Some(continuation)
            );
        }
        assert_eq!(Continuation::from_callback_data("something_else"), None);
        assert_eq!(Continuation::after_batch(true), Continuation::NextBatch);
        assert_eq!(Continuation::after_batch(false), Continuation::FinishQuiz);
    }
}
