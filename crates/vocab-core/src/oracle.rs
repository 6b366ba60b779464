use crate::error::VocabResult;
use crate::question::{Choice, Question};

/// Picks an answer for a question, usually by asking a language model.
pub trait AnswerOracle {
    fn resolve(&self, question: &Question) -> VocabResult<Choice>;
}
