use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// One quiz item as observed from the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_type: String,
    /// Base64 payload exactly as the server sent it.
    pub code: String,
    /// Decoded markup the fields below were parsed from.
    pub markup: String,
    pub difficulty: f64,

    pub context: String,
    pub prompt: String,
    pub answer: String,
    pub answer_key: String,
    pub choices: Vec<Choice>,

    pub is_correct: bool,
    pub target_word: String,
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        QuestionKind::from_code(&self.question_type)
    }

    /// True for the zero-value question handed out when a fetched payload
    /// could not be decoded.
    pub fn is_empty(&self) -> bool {
        self.question_type.is_empty() && self.code.is_empty()
    }

    /// Record the answer that was submitted and the server's verdict on it.
    pub fn apply_verdict(&mut self, choice: &Choice, correct: bool, target_word: String) {
        self.answer = choice.value.clone();
        self.answer_key = choice.key.clone();
        self.is_correct = correct;
        self.target_word = target_word;
    }
}

// ---------------------------------------------------------------------------
// Choice
// ---------------------------------------------------------------------------

/// A selectable answer: the opaque submission token and its display text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub key: String,
    pub value: String,
}

impl Choice {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.key)
    }
}

// ---------------------------------------------------------------------------
// QuestionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// "<word> means:"
    Definition,
    /// Pick the picture matching the word.
    Image,
    /// "<word> has the same or similar meaning as:"
    Synonym,
    /// "In this sentence <word> means:"
    InContext,
    /// "Complete the sentence with:"
    FillIn,
    /// Spell the word; the answer is free-form.
    Spelling,
    Other(String),
}

impl QuestionKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "D" => Self::Definition,
            "I" => Self::Image,
            "S" => Self::Synonym,
            "L" => Self::InContext,
            "F" => Self::FillIn,
            "T" => Self::Spelling,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_free_form(&self) -> bool {
        matches!(self, Self::Spelling)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Definition => write!(f, "definition"),
            Self::Image => write!(f, "image"),
            Self::Synonym => write!(f, "synonym"),
            Self::InContext => write!(f, "in-context"),
            Self::FillIn => write!(f, "fill-in"),
            Self::Spelling => write!(f, "spelling"),
            Self::Other(code) => write!(f, "other:{code}"),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreStats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_questions: usize,
    pub correct_questions: usize,
    pub by_type: Vec<(String, usize)>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_code() {
        assert_eq!(QuestionKind::from_code("T"), QuestionKind::Spelling);
        assert_eq!(QuestionKind::from_code("D"), QuestionKind::Definition);
        assert_eq!(
            QuestionKind::from_code("Z"),
            QuestionKind::Other("Z".into())
        );
        assert!(QuestionKind::Spelling.is_free_form());
        assert!(!QuestionKind::Synonym.is_free_form());
    }

    #[test]
    fn test_default_question_is_empty() {
        let q = Question::default();
        assert!(q.is_empty());

        let q = Question {
            question_type: "S".into(),
            code: "PGRpdj48L2Rpdj4=".into(),
            ..Default::default()
        };
        assert!(!q.is_empty());
    }

    #[test]
    fn test_apply_verdict() {
        let mut q = Question {
            question_type: "S".into(),
            ..Default::default()
        };
        q.apply_verdict(&Choice::new("n1", "happy"), true, "elated".into());
        assert_eq!(q.answer, "happy");
        assert_eq!(q.answer_key, "n1");
        assert!(q.is_correct);
        assert_eq!(q.target_word, "elated");
    }

    #[test]
    fn test_choice_serializes_as_key_value() {
        let json = serde_json::to_value(Choice::new("abc", "word")).unwrap();
        assert_eq!(json["key"], "abc");
        assert_eq!(json["value"], "word");
    }
}
