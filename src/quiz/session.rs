use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use teloxide::types::UserId;

use crate::quiz::{Question, BATCH_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Text extracted, waiting for the user to pick a question count.
    Active,
    QuizInProgress,
    QuizComplete,
}

/// Per-user quiz state: the uploaded text, the generated questions and how
/// far into them delivery has got.
#[derive(Debug, Clone)]
pub struct Session {
    pub text: String,
    pub questions: Vec<Question>,
    pub cursor: usize,
    quiz_started: bool,
}

impl Session {
    pub fn new(text: String) -> Self {
        Self {
            text,
            questions: Vec::new(),
            cursor: 0,
            quiz_started: false,
        }
    }

    pub fn start_quiz(&mut self, questions: Vec<Question>) {
        self.questions = questions;
        self.cursor = 0;
        self.quiz_started = true;
    }

    pub fn phase(&self) -> Phase {
        if !self.quiz_started {
            Phase::Active
        } else if self.cursor >= self.questions.len() {
            Phase::QuizComplete
        } else {
            Phase::QuizInProgress
        }
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// Hands out the next batch and moves the cursor past it. Returns `None`
    /// once every question has been delivered.
    ///
    /// The cursor always moves by a full `BATCH_SIZE`, so it can overshoot the
    /// question count on the last batch.
    pub fn next_batch(&mut self) -> Option<Batch> {
        if self.cursor >= self.questions.len() {
            return None;
        }
        let end = (self.cursor + BATCH_SIZE).min(self.questions.len());
        let questions = self.questions[self.cursor..end].to_vec();
        self.cursor += BATCH_SIZE;
        Some(Batch {
            questions,
            has_more: self.cursor < self.questions.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub questions: Vec<Question>,
    pub has_more: bool,
}

/// All live sessions, keyed by user. Uploading again replaces the old session.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl SessionStore {
    pub fn create(&self, user: UserId, text: String) {
        let mut sessions = self.lock();
        sessions.insert(user, Session::new(text));
    }

    pub fn destroy(&self, user: UserId) -> Option<Session> {
        self.lock().remove(&user)
    }

    pub fn phase(&self, user: UserId) -> Option<Phase> {
        self.lock().get(&user).map(Session::phase)
    }

    /// Runs `f` against the user's session, if there is one.
    pub fn with_session<T>(&self, user: UserId, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        self.lock().get_mut(&user).map(f)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| {
                Question::new(
                    format!("Question {i}?"),
                    ["a", "b", "c", "d"].map(String::from),
                    0,
                )
            })
            .collect()
    }

    #[test]
    fn batches_of_five_then_exhausted() {
        let mut session = Session::new("text".to_string());
        session.start_quiz(questions(12));

        let sizes = std::iter::from_fn(|| session.next_batch())
            .map(|b| (b.questions.len(), b.has_more))
            .collect::<Vec<_>>();
        assert_eq!(sizes, vec![(5, true), (5, true), (2, false)]);
        assert_eq!(session.cursor, 15);
        assert_eq!(session.phase(), Phase::QuizComplete);
        assert!(session.next_batch().is_none());
    }

    #[test]
    fn exact_multiple_has_no_trailing_batch() {
        let mut session = Session::new(String::new());
        session.start_quiz(questions(10));

        assert!(session.next_batch().unwrap().has_more);
        let last = session.next_batch().unwrap();
        assert_eq!(last.questions.len(), 5);
        assert!(!last.has_more);
        assert!(session.next_batch().is_none());
    }

    #[test]
    fn batch_preserves_question_order() {
        let mut session = Session::new(String::new());
        session.start_quiz(questions(7));
        session.next_batch();
        let second = session.next_batch().unwrap();
        assert_eq!(second.questions[0].text, "Question 5?");
        assert_eq!(second.questions[1].text, "Question 6?");
    }

    #[test]
    fn phases_follow_the_quiz_lifecycle() {
        let mut session = Session::new("text".to_string());
        assert_eq!(session.phase(), Phase::Active);

        session.start_quiz(questions(3));
        assert_eq!(session.phase(), Phase::QuizInProgress);

        session.next_batch();
        assert_eq!(session.phase(), Phase::QuizComplete);

        // a completed session can be restarted without a new upload
        session.start_quiz(questions(6));
        assert_eq!(session.phase(), Phase::QuizInProgress);
        assert_eq!(session.cursor, 0);
        assert_eq!(session.text, "text");
    }

    #[test]
    fn empty_quiz_is_immediately_complete() {
        let mut session = Session::new(String::new());
        session.start_quiz(Vec::new());
        assert_eq!(session.phase(), Phase::QuizComplete);
        assert!(session.next_batch().is_none());
    }

    #[test]
    fn store_replaces_and_destroys_sessions() {
        let store = SessionStore::default();
        let user = UserId(10);
        assert_eq!(store.phase(user), None);

        store.create(user, "first".to_string());
        store.with_session(user, |s| s.start_quiz(questions(3)));
        assert_eq!(store.phase(user), Some(Phase::QuizInProgress));

        store.create(user, "second".to_string());
        assert_eq!(store.phase(user), Some(Phase::Active));
        assert_eq!(store.with_session(user, |s| s.text.clone()).as_deref(), Some("second"));

        assert!(store.destroy(user).is_some());
        assert_eq!(store.phase(user), None);
        assert_eq!(store.with_session(user, |s| s.total()), None);
    }
}
