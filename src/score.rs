use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use teloxide::types::UserId;

/// Running count of correct answers per user.
pub trait ScoreStore: Send + Sync {
    fn reset(&self, user: UserId);
    fn increment(&self, user: UserId, is_correct: bool);
    fn get(&self, user: UserId) -> u32;
}

#[derive(Default)]
pub struct InMemoryScores {
    scores: Mutex<HashMap<UserId, u32>>,
}

impl ScoreStore for InMemoryScores {
    fn reset(&self, user: UserId) {
        let mut scores = self.scores.lock().unwrap_or_else(PoisonError::into_inner);
        scores.insert(user, 0);
    }

    fn increment(&self, user: UserId, is_correct: bool) {
        if !is_correct {
            return;
        }
        let mut scores = self.scores.lock().unwrap_or_else(PoisonError::into_inner);
        *scores.entry(user).or_insert(0) += 1;
    }

    fn get(&self, user: UserId) -> u32 {
        let scores = self.scores.lock().unwrap_or_else(PoisonError::into_inner);
        scores.get(&user).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_correct_answers_count() {
        let scores = InMemoryScores::default();
        let user = UserId(5);
        scores.increment(user, true);
        scores.increment(user, false);
        scores.increment(user, true);
        assert_eq!(scores.get(user), 2);
    }

    #[test]
    fn reset_zeroes_a_single_user() {
        let scores = InMemoryScores::default();
        scores.increment(UserId(1), true);
        scores.increment(UserId(2), true);
        scores.reset(UserId(1));
        assert_eq!(scores.get(UserId(1)), 0);
        assert_eq!(scores.get(UserId(2)), 1);
    }

    #[test]
    fn unknown_user_has_zero() {
        assert_eq!(InMemoryScores::default().get(UserId(99)), 0);
    }
}
