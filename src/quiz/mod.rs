pub mod engine;
pub mod generator;
pub mod polls;
pub mod session;

/// Questions are delivered to the user in polls of at most this many.
pub const BATCH_SIZE: usize = 5;

/// Texts shorter than this (after trimming) are treated as a failed extraction.
pub const MIN_TEXT_LEN: usize = 100;

const QUESTION_COUNT_CHOICES: [usize; 8] = [5, 10, 15, 20, 25, 30, 40, 50];
const WORDS_PER_QUESTION: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub options: [String; 4],
    pub correct_index: u8,
}

impl Question {
    pub fn new(text: String, options: [String; 4], correct_index: u8) -> Self {
        Self {
            text,
            options,
            correct_index,
        }
    }
}

/// Question counts offered after an upload. Roughly one question per hundred
/// words, never fewer than 5 or more than 50.
pub fn question_count_choices(text: &str) -> Vec<usize> {
    let words = text.split_whitespace().count();
    let max = (words / WORDS_PER_QUESTION).clamp(5, 50);
    QUESTION_COUNT_CHOICES
        .into_iter()
        .filter(|&n| n <= max)
        .collect()
}
