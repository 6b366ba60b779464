use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};

use vocab_core::{AnswerOracle, Choice, Question, VocabError, VocabResult};
use vocab_store::SqliteStore;

use crate::cookies::CookieJar;
use crate::protocol::RESTART_SIGNAL;
use crate::session::{Session, SessionConfig};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Plays back canned replies in order and records what was sent.
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<HttpResponse>>,
    sent: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<HttpResponse>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            sent: RefCell::new(Vec::new()),
        }
    }

    pub fn reply(status: u16, body: Value) -> HttpResponse {
        HttpResponse {
            status,
            set_cookies: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.sent.borrow().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> VocabResult<HttpResponse> {
        self.sent.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| VocabError::Transport("connection refused".into()))
    }
}

/// A start/next reply carrying a synonym-style question about `word`.
pub fn question_reply(secret: &str, qtype: &str, word: &str, progress: f64) -> HttpResponse {
    let markup = format!(
        r#"<div class="instructions">{word} means:</div>
           <div class="choices">
             <a data-nonce="n1">sad</a>
             <a data-nonce="n2">happy</a>
           </div>"#
    );
    ScriptedTransport::reply(
        200,
        json!({
            "secret": secret,
            "question": {
                "type": qtype,
                "code": general_purpose::STANDARD.encode(markup),
                "difficulty": 0.5
            },
            "game": {"progress": progress}
        }),
    )
}

/// A start/next reply carrying a spelling question whose answer is `word` and
/// which offers no choices.
pub fn spelling_reply(secret: &str, word: &str, progress: f64) -> HttpResponse {
    let markup = format!(
        r#"<div class="instructions">Spell the word.</div>
           <div class="complete">The word is <strong>{word}</strong></div>"#
    );
    ScriptedTransport::reply(
        200,
        json!({
            "secret": secret,
            "question": {
                "type": "T",
                "code": general_purpose::STANDARD.encode(markup),
                "difficulty": 0.7
            },
            "game": {"progress": progress}
        }),
    )
}

pub fn answer_reply(secret: &str, correct: bool, word: &str, progress: f64) -> HttpResponse {
    ScriptedTransport::reply(
        200,
        json!({
            "secret": secret,
            "answer": {"correct": correct, "word": word, "points": 50, "bonus": 10},
            "game": {"progress": progress}
        }),
    )
}

pub fn restart_reply() -> HttpResponse {
    ScriptedTransport::reply(400, json!({"error": RESTART_SIGNAL}))
}

pub fn test_session(transport: ScriptedTransport) -> Session<ScriptedTransport, SqliteStore> {
    let config = SessionConfig {
        base_url: "https://quiz.example".into(),
        user_agent: "test-agent".into(),
    };
    let cookies = CookieJar::seed([("JSESSIONID", "seed"), ("guid", "g")]);
    Session::new(transport, SqliteStore::in_memory().unwrap(), &config, cookies)
}

/// Always picks the first choice.
#[derive(Default)]
pub struct FirstChoiceOracle {
    pub calls: Cell<usize>,
}

impl AnswerOracle for FirstChoiceOracle {
    fn resolve(&self, question: &Question) -> VocabResult<Choice> {
        self.calls.set(self.calls.get() + 1);
        question
            .choices
            .first()
            .cloned()
            .ok_or_else(|| VocabError::Decode("question has no choices".into()))
    }
}
