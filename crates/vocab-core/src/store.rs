use crate::error::VocabResult;
use crate::question::{Question, StoreStats};

pub trait QuestionStore {
    /// Insert a question, or refresh its answer fields if the stored row has
    /// not been judged correct yet. Keyed by (type, context, prompt).
    fn upsert(&self, question: &Question) -> VocabResult<()>;

    fn get(&self, question_type: &str, context: &str, prompt: &str)
        -> VocabResult<Option<Question>>;
    fn list_recent(&self, limit: usize) -> VocabResult<Vec<Question>>;

    // Stats
    fn count(&self) -> VocabResult<usize>;
    fn stats(&self) -> VocabResult<StoreStats>;
}
