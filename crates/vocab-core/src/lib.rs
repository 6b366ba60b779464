pub mod error;
pub mod oracle;
pub mod question;
pub mod store;

pub use error::{VocabError, VocabResult};
pub use oracle::AnswerOracle;
pub use question::{Choice, Question, QuestionKind, StoreStats};
pub use store::QuestionStore;
