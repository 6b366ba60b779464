use serde::Serialize;
use serde_json::Value;

use vocab_core::{VocabError, VocabResult};

/// Protocol version the challenge endpoints expect in every body.
pub const PROTOCOL_VERSION: u32 = 3;

/// `error` value of a 4xx response meaning the round ended server-side.
pub const RESTART_SIGNAL: &str = "RestartChallengeException";

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn start(&self) -> String {
        format!("{}/challenge/start.json", self.base_url)
    }

    pub fn save_answer(&self) -> String {
        format!("{}/challenge/saveanswer.json", self.base_url)
    }

    pub fn next_question(&self) -> String {
        format!("{}/challenge/nextquestion.json", self.base_url)
    }

    pub fn me(&self) -> String {
        format!("{}/auth/me.json", self.base_url)
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StartRequest<'a> {
    pub v: u32,
    /// `p` = practice, `c` = challenge.
    pub activitytype: &'a str,
    pub wordlistid: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct NextQuestionRequest<'a> {
    pub secret: &'a str,
    pub v: u32,
}

/// Sent form-encoded, so it is rendered to pairs rather than serialized.
#[derive(Debug)]
pub struct AnswerRequest<'a> {
    pub secret: &'a str,
    pub v: u32,
    /// Response time in milliseconds.
    pub rt: u32,
    pub a: &'a str,
}

impl AnswerRequest<'_> {
    pub fn to_form(&self) -> Vec<(String, String)> {
        vec![
            ("secret".into(), self.secret.to_string()),
            ("v".into(), self.v.to_string()),
            ("rt".into(), self.rt.to_string()),
            ("a".into(), self.a.to_string()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Response extraction
// ---------------------------------------------------------------------------

/// The continuation token every reply carries.
pub fn extract_secret(data: &Value) -> VocabResult<String> {
    data.get("secret")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| VocabError::Decode("missing or non-string `secret`".into()))
}

/// Round progress from `game.progress`.
pub fn extract_progress(data: &Value) -> VocabResult<f64> {
    let game = data
        .get("game")
        .and_then(Value::as_object)
        .ok_or_else(|| VocabError::Decode("missing `game` object".into()))?;
    game.get("progress")
        .and_then(Value::as_f64)
        .ok_or_else(|| VocabError::Decode("missing or non-numeric `game.progress`".into()))
}

/// `error` string of a reply, if any.
pub fn extract_error(data: &Value) -> Option<&str> {
    data.get("error").and_then(Value::as_str)
}

pub fn is_restart_signal(status: u16, data: &Value) -> bool {
    (400..500).contains(&status) && extract_error(data) == Some(RESTART_SIGNAL)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResult {
    pub correct: bool,
    pub word: String,
    /// `points + bonus`, when the server reports them.
    pub points: Option<u64>,
}

/// Verdict object of a saveanswer reply. `correct` and `word` are required.
pub fn extract_answer_result(data: &Value) -> VocabResult<AnswerResult> {
    let answer = data
        .get("answer")
        .and_then(Value::as_object)
        .ok_or_else(|| VocabError::Decode("missing `answer` object".into()))?;
    let correct = answer
        .get("correct")
        .and_then(Value::as_bool)
        .ok_or_else(|| VocabError::Decode("missing or non-boolean `answer.correct`".into()))?;
    let word = answer
        .get("word")
        .and_then(Value::as_str)
        .ok_or_else(|| VocabError::Decode("missing or non-string `answer.word`".into()))?
        .to_string();

    let points = match (
        answer.get("points").and_then(Value::as_u64),
        answer.get("bonus").and_then(Value::as_u64),
    ) {
        (None, None) => None,
        (p, b) => Some(p.unwrap_or(0) + b.unwrap_or(0)),
    };

    Ok(AnswerResult {
        correct,
        word,
        points,
    })
}

/// `auth.loggedin` of the identity endpoint; absent means not logged in.
pub fn extract_logged_in(data: &Value) -> bool {
    data.get("auth")
        .and_then(|auth| auth.get("loggedin"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_request_omits_empty_secret() {
        let body = serde_json::to_value(StartRequest {
            v: PROTOCOL_VERSION,
            activitytype: "p",
            wordlistid: 42,
            secret: None,
        })
        .unwrap();
        assert_eq!(body, json!({"v": 3, "activitytype": "p", "wordlistid": 42}));

        let body = serde_json::to_value(StartRequest {
            v: PROTOCOL_VERSION,
            activitytype: "p",
            wordlistid: 42,
            secret: Some("s1"),
        })
        .unwrap();
        assert_eq!(body["secret"], "s1");
    }

    #[test]
    fn test_answer_form() {
        let form = AnswerRequest {
            secret: "s",
            v: 3,
            rt: 4567,
            a: "nonce",
        }
        .to_form();
        assert_eq!(form[2], ("rt".to_string(), "4567".to_string()));
        assert_eq!(form[3], ("a".to_string(), "nonce".to_string()));
    }

    #[test]
    fn test_endpoints_trim_trailing_slash() {
        let ep = Endpoints::new("https://quiz.example/");
        assert_eq!(ep.start(), "https://quiz.example/challenge/start.json");
        assert_eq!(ep.me(), "https://quiz.example/auth/me.json");
    }

    #[test]
    fn test_extract_progress() {
        assert_eq!(extract_progress(&json!({"game": {"progress": 0.25}})).unwrap(), 0.25);
        assert!(extract_progress(&json!({"game": {}})).is_err());
        assert!(extract_progress(&json!({})).is_err());
    }

    #[test]
    fn test_restart_signal_requires_4xx() {
        let data = json!({"error": RESTART_SIGNAL});
        assert!(is_restart_signal(400, &data));
        assert!(!is_restart_signal(200, &data));
        assert!(!is_restart_signal(400, &json!({"error": "Other"})));
    }

    #[test]
    fn test_extract_answer_result() {
        let r = extract_answer_result(&json!({
            "answer": {"correct": true, "word": "elated", "points": 40, "bonus": 10}
        }))
        .unwrap();
        assert!(r.correct);
        assert_eq!(r.word, "elated");
        assert_eq!(r.points, Some(50));

        let r = extract_answer_result(&json!({"answer": {"correct": false, "word": "x"}})).unwrap();
        assert_eq!(r.points, None);
    }

    #[test]
    fn test_extract_answer_result_is_strict() {
        assert!(extract_answer_result(&json!({"answer": {"word": "x"}})).is_err());
        assert!(extract_answer_result(&json!({"answer": {"correct": "yes", "word": "x"}})).is_err());
        assert!(extract_answer_result(&json!({"answer": {"correct": true}})).is_err());
        assert!(extract_answer_result(&json!({})).is_err());
    }

    #[test]
    fn test_extract_logged_in() {
        assert!(extract_logged_in(&json!({"auth": {"loggedin": true}})));
        assert!(!extract_logged_in(&json!({"auth": {}})));
        assert!(!extract_logged_in(&json!({})));
    }
}
