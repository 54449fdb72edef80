use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use rand::rngs::StdRng;
use teloxide::types::UserId;

use crate::error::QuizError;
use crate::limits::RateLimiter;
use crate::quiz::polls::{AnswerOutcome, DispatchedPoll, PollRegistry};
use crate::quiz::session::{Batch, Phase, SessionStore};
use crate::quiz::{generator, question_count_choices, Question, MIN_TEXT_LEN};
use crate::score::ScoreStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreReport {
    pub score: u32,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResult {
    Delivered {
        questions: Vec<Question>,
        has_more: bool,
    },
    SessionComplete(ScoreReport),
}

/// Everything the bot handlers share: sessions, in-flight polls and the
/// upload and score collaborators.
pub struct QuizEngine {
    sessions: SessionStore,
    polls: PollRegistry,
    limiter: Arc<dyn RateLimiter>,
    scores: Arc<dyn ScoreStore>,
    rng: Mutex<StdRng>,
}

impl QuizEngine {
    pub fn new(limiter: Arc<dyn RateLimiter>, scores: Arc<dyn ScoreStore>, rng: StdRng) -> Self {
        Self {
            sessions: SessionStore::default(),
            polls: PollRegistry::default(),
            limiter,
            scores,
            rng: Mutex::new(rng),
        }
    }

    /// Cheap pre-check so a document is not downloaded just to be rejected.
    pub fn check_upload(&self, user: UserId) -> Result<(), QuizError> {
        if self.limiter.can_upload(user) {
            Ok(())
        } else {
            Err(QuizError::RateLimitExceeded)
        }
    }

    /// Starts a fresh session from extracted text and returns the question
    /// counts the user may pick from.
    pub fn begin_session(&self, user: UserId, text: String) -> Result<Vec<usize>, QuizError> {
        self.check_upload(user)?;
        if text.trim().chars().count() < MIN_TEXT_LEN {
            return Err(QuizError::ExtractionInsufficient);
        }

        self.limiter.register_upload(user);
        let choices = question_count_choices(&text);
        self.sessions.create(user, text);
        info!("Session started for user {}, offering {:?} questions", user.0, choices);
        Ok(choices)
    }

    /// Generates a new quiz for the user's session and zeroes their score.
    /// Returns how many questions were actually generated.
    pub fn set_question_count(&self, user: UserId, input: &str) -> Result<usize, QuizError> {
        let previous = self.sessions.phase(user).ok_or(QuizError::NoActiveSession)?;
        let requested = match input.trim().parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => return Err(QuizError::InvalidInput(input.to_string())),
        };

        // Generate on a copy of the text; the sessions lock is only taken
        // again to store the result.
        let text = self
            .sessions
            .with_session(user, |session| session.text.clone())
            .ok_or(QuizError::NoActiveSession)?;
        let questions = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            generator::generate(&text, requested, &mut *rng)
        };
        let generated = questions.len();
        self.sessions
            .with_session(user, |session| session.start_quiz(questions))
            .ok_or(QuizError::NoActiveSession)?;

        self.scores.reset(user);
        if previous == Phase::QuizInProgress {
            info!("User {} abandoned a quiz in progress", user.0);
        }
        info!(
            "User {} asked for {} questions, generated {}",
            user.0, requested, generated
        );
        Ok(generated)
    }

    pub fn next_batch(&self, user: UserId) -> Result<BatchResult, QuizError> {
        let batch = self
            .sessions
            .with_session(user, |session| session.next_batch().ok_or(session.total()))
            .ok_or(QuizError::NoActiveSession)?;

        Ok(match batch {
            Ok(Batch {
                questions,
                has_more,
            }) => BatchResult::Delivered {
                questions,
                has_more,
            },
            Err(total) => BatchResult::SessionComplete(ScoreReport {
                score: self.scores.get(user),
                total,
            }),
        })
    }

    /// Score so far against the full quiz length, for an early finish.
    pub fn finish(&self, user: UserId) -> Result<ScoreReport, QuizError> {
        let total = self
            .sessions
            .with_session(user, |session| session.total())
            .ok_or(QuizError::NoActiveSession)?;
        Ok(ScoreReport {
            score: self.scores.get(user),
            total,
        })
    }

    pub fn record_poll(&self, poll_id: String, user: UserId, correct_index: u8) {
        self.polls.record(
            poll_id,
            DispatchedPoll {
                user,
                correct_index,
            },
        );
        debug!(
            "Recorded poll for user {}, {} polls awaiting answers",
            user.0,
            self.polls.pending()
        );
    }

    /// Reconciles a poll answer with the poll it belongs to. Answers to polls
    /// we never sent (or already scored) are ignored and return `None`.
    pub fn on_answer_event(&self, poll_id: &str, chosen: &[u8]) -> Option<AnswerOutcome> {
        let outcome = self.polls.resolve(poll_id, chosen)?;
        self.scores.increment(outcome.user, outcome.is_correct);
        Some(outcome)
    }

    /// Drops the user's session; their next text message is ignored until
    /// they upload again.
    pub fn end_session(&self, user: UserId) -> bool {
        self.sessions.destroy(user).is_some()
    }
}
