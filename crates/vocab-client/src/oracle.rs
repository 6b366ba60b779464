//! Answer oracle backed by an Ollama-style `/api/generate` endpoint.
//!
//! The model is asked for structured output; the reply wraps that output as a
//! JSON *string* in `response`, so it is parsed twice.

use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use vocab_core::{AnswerOracle, Choice, Question, VocabError, VocabResult};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "llama3.1:8b-instruct-q5_K_S";
pub const DEFAULT_SYSTEM: &str = "You're a vocabulary teacher that answers questions about \
     vocabulary. Do not modify the question, and keep the question and answers as received.";

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    pub system: String,
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            model: DEFAULT_MODEL.into(),
            system: DEFAULT_SYSTEM.into(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Serialize)]
struct PromptChoice<'a> {
    answer: &'a str,
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct Prompt<'a> {
    context: &'a str,
    question: &'a str,
    choices: Vec<PromptChoice<'a>>,
}

/// JSON schema the model is told to answer in.
fn answer_format() -> Value {
    let choice = json!({
        "type": "object",
        "properties": {
            "answer": {"type": "string"},
            "code": {"type": "string"}
        }
    });
    json!({
        "type": "object",
        "properties": {
            "question": {"type": "string"},
            "answer": choice,
            "choices": {"type": "array", "items": choice}
        },
        "required": ["question", "answer", "choices"]
    })
}

pub fn build_request(config: &OracleConfig, question: &Question) -> VocabResult<Value> {
    let prompt = Prompt {
        context: &question.context,
        question: &question.prompt,
        choices: question
            .choices
            .iter()
            .map(|c| PromptChoice {
                answer: &c.value,
                code: &c.key,
            })
            .collect(),
    };
    Ok(json!({
        "model": config.model,
        "system": config.system,
        "prompt": serde_json::to_string(&prompt)?,
        "format": answer_format(),
        "stream": false
    }))
}

/// Pull the chosen answer out of `{"response": "{\"answer\": {...}}"}`.
pub fn parse_reply(reply: &Value) -> VocabResult<Choice> {
    let response = reply
        .get("response")
        .and_then(Value::as_str)
        .ok_or_else(|| VocabError::Decode("oracle reply without `response` string".into()))?;
    let inner: Value = serde_json::from_str(response)
        .map_err(|e| VocabError::Decode(format!("oracle response is not JSON: {e}")))?;
    let answer = inner
        .get("answer")
        .and_then(Value::as_object)
        .ok_or_else(|| VocabError::Decode("oracle response without `answer` object".into()))?;
    let value = answer
        .get("answer")
        .and_then(Value::as_str)
        .ok_or_else(|| VocabError::Decode("oracle answer without `answer` string".into()))?;
    let key = answer
        .get("code")
        .and_then(Value::as_str)
        .ok_or_else(|| VocabError::Decode("oracle answer without `code` string".into()))?;
    Ok(Choice::new(key, value))
}

pub struct OllamaOracle {
    agent: ureq::Agent,
    config: OracleConfig,
}

impl OllamaOracle {
    pub fn new(config: OracleConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { agent, config }
    }
}

impl AnswerOracle for OllamaOracle {
    fn resolve(&self, question: &Question) -> VocabResult<Choice> {
        let payload = build_request(&self.config, question)?;
        debug!(endpoint = %self.config.endpoint, model = %self.config.model, "asking oracle");

        let response = self
            .agent
            .post(&self.config.endpoint)
            .set("Content-Type", "application/json")
            .send_json(payload)
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => {
                    VocabError::Transport(format!("oracle returned status {code}"))
                }
                ureq::Error::Transport(t) => VocabError::Transport(format!("oracle: {t}")),
            })?;
        let reply: Value = serde_json::from_reader(response.into_reader())
            .map_err(|e| VocabError::Decode(format!("oracle reply is not JSON: {e}")))?;

        let choice = parse_reply(&reply)?;
        info!(answer = %choice, "oracle picked an answer");
        Ok(choice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question() -> Question {
        Question {
            question_type: "S".into(),
            context: "She was elated.".into(),
            prompt: "elated means:".into(),
            choices: vec![Choice::new("n1", "overjoyed"), Choice::new("n2", "furious")],
            ..Default::default()
        }
    }

    #[test]
    fn test_build_request() {
        let config = OracleConfig::default();
        let req = build_request(&config, &sample_question()).unwrap();
        assert_eq!(req["model"], DEFAULT_MODEL);
        assert_eq!(req["stream"], false);
        assert_eq!(req["format"]["required"][1], "answer");

        let prompt: Value = serde_json::from_str(req["prompt"].as_str().unwrap()).unwrap();
        assert_eq!(prompt["context"], "She was elated.");
        assert_eq!(prompt["question"], "elated means:");
        assert_eq!(prompt["choices"][1]["answer"], "furious");
        assert_eq!(prompt["choices"][1]["code"], "n2");
    }

    #[test]
    fn test_parse_reply() {
        let reply = json!({
            "model": DEFAULT_MODEL,
            "response": r#"{"question": "elated means:", "answer": {"answer": "overjoyed", "code": "n1"}, "choices": []}"#,
            "done": true
        });
        assert_eq!(parse_reply(&reply).unwrap(), Choice::new("n1", "overjoyed"));
    }

    #[test]
    fn test_parse_reply_rejects_every_missing_level() {
        let cases = [
            json!({}),
            json!({"response": {"answer": {"answer": "a", "code": "c"}}}),
            json!({"response": "not json"}),
            json!({"response": r#"{"question": "q"}"#}),
            json!({"response": r#"{"answer": "overjoyed"}"#}),
            json!({"response": r#"{"answer": {"code": "n1"}}"#}),
            json!({"response": r#"{"answer": {"answer": "overjoyed"}}"#}),
            json!({"response": r#"{"answer": {"answer": "overjoyed", "code": 1}}"#}),
        ];
        for reply in cases {
            assert!(
                matches!(parse_reply(&reply), Err(VocabError::Decode(_))),
                "accepted {reply}"
            );
        }
    }
}
