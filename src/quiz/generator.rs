use rand::seq::SliceRandom;
use rand::Rng;

use crate::quiz::Question;

/// A sentence needs more than this many words to become a question.
const MIN_SENTENCE_WORDS: usize = 5;
const PLACEHOLDER_OPTIONS: [&str; 4] = ["Option A", "Option B", "Option C", "Option D"];

/// Builds up to `count` questions from randomly chosen long sentences of `text`.
///
/// Fewer questions come back when the text has fewer candidate sentences; that
/// is not an error.
pub fn generate<R: Rng + ?Sized>(text: &str, count: usize, rng: &mut R) -> Vec<Question> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut sentences = candidate_sentences(text);
    sentences.shuffle(rng);
    sentences
        .into_iter()
        .take(count)
        .map(question_from_sentence)
        .collect()
}

pub fn candidate_sentences(text: &str) -> Vec<&str> {
    text.split('.')
        .map(str::trim)
        .filter(|sentence| sentence.split_whitespace().count() > MIN_SENTENCE_WORDS)
        .collect()
}

fn question_from_sentence(sentence: &str) -> Question {
    Question::new(
        format!("What is the implication of: {sentence}?"),
        PLACEHOLDER_OPTIONS.map(String::from),
        0,
    )
}
