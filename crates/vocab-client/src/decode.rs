//! Question payload decoding.
//!
//! start/next replies carry the question as base64-encoded markup. Most
//! endpoints nest it under `question` (type in `type`); some return it inline
//! at the top level (type in `qtype`). Both shapes are normal.

use base64::{engine::general_purpose, Engine as _};
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use vocab_core::{Choice, Question, QuestionKind, VocabError, VocabResult};

use crate::protocol::extract_secret;

#[derive(Debug, Clone, Copy)]
enum PayloadShape<'a> {
    Nested(&'a Map<String, Value>),
    Inline(&'a Map<String, Value>),
}

impl<'a> PayloadShape<'a> {
    fn select(payload: &'a Value) -> VocabResult<Self> {
        let top = payload
            .as_object()
            .ok_or_else(|| VocabError::Decode("payload is not a JSON object".into()))?;
        match top.get("question").and_then(Value::as_object) {
            Some(nested) => Ok(Self::Nested(nested)),
            None => {
                debug!("no nested question object, reading question fields from top level");
                Ok(Self::Inline(top))
            }
        }
    }

    fn object(self) -> &'a Map<String, Value> {
        match self {
            Self::Nested(obj) | Self::Inline(obj) => obj,
        }
    }

    fn type_field(self) -> &'static str {
        match self {
            Self::Nested(_) => "type",
            Self::Inline(_) => "qtype",
        }
    }
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &str) -> VocabResult<&'a str> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| VocabError::Decode(format!("missing or non-string `{field}`")))
}

/// Decode a start/next reply into its question and continuation token.
pub fn decode_question(payload: &Value) -> VocabResult<(Question, String)> {
    let secret = extract_secret(payload)?;
    let shape = PayloadShape::select(payload)?;
    let obj = shape.object();

    let question_type = required_str(obj, shape.type_field())?.to_string();
    let code = required_str(obj, "code")?.to_string();
    let difficulty = obj
        .get("difficulty")
        .and_then(Value::as_f64)
        .ok_or_else(|| VocabError::Decode("missing or non-numeric `difficulty`".into()))?;

    let bytes = general_purpose::STANDARD
        .decode(code.as_bytes())
        .map_err(|e| VocabError::Decode(format!("question code is not base64: {e}")))?;
    let markup = String::from_utf8(bytes)
        .map_err(|e| VocabError::Decode(format!("question markup is not UTF-8: {e}")))?;

    let mut question = Question {
        question_type,
        code,
        difficulty,
        ..Default::default()
    };
    parse_markup(&mut question, &markup)?;
    question.markup = markup;

    Ok((question, secret))
}

/// Fill context, prompt, choices and (for spelling items) the known answer
/// from the decoded markup.
pub fn parse_markup(question: &mut Question, markup: &str) -> VocabResult<()> {
    let doc = Html::parse_fragment(markup);
    let kind = question.kind();

    let content_sel = selector("div.questionContent")?;
    let sentence_sel = selector("div.sentence")?;
    question.context = doc
        .select(&content_sel)
        .next()
        .map(|content| {
            content
                .select(&sentence_sel)
                .map(|s| text_of(&s))
                .collect::<String>()
        })
        .map(|raw| normalize_whitespace(&raw))
        .unwrap_or_default();

    let instructions_sel = selector("div.instructions")?;
    question.prompt = doc
        .select(&instructions_sel)
        .next()
        .map(|el| normalize_whitespace(&text_of(&el)))
        .unwrap_or_default();

    if kind.is_free_form() {
        let complete_sel = selector("div.complete strong")?;
        let answer = doc
            .select(&complete_sel)
            .next()
            .map(|el| normalize_whitespace(&text_of(&el)))
            .ok_or_else(|| {
                VocabError::Decode("spelling question without a completed answer".into())
            })?;
        question.answer_key = answer.clone();
        question.answer = answer;
    }

    let choice_sel = selector("div.choices a")?;
    let mut choices = Vec::new();
    for anchor in doc.select(&choice_sel) {
        let Some(key) = anchor.value().attr("data-nonce") else {
            warn!("choice anchor without data-nonce, skipping");
            continue;
        };
        let value = match (&kind, anchor.value().attr("style")) {
            (QuestionKind::Image, Some(style)) => style.trim().to_string(),
            _ => normalize_whitespace(&text_of(&anchor)),
        };

        // Spelling answers can also appear as a rendered choice; submit its token.
        if !question.answer.is_empty() && value == question.answer {
            question.is_correct = true;
            question.answer_key = key.to_string();
        }
        choices.push(Choice::new(key, value));
    }
    question.choices = choices;

    Ok(())
}

/// Collapse whitespace runs to single spaces and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect()
}

fn selector(css: &'static str) -> VocabResult<Selector> {
    Selector::parse(css).map_err(|e| VocabError::Decode(format!("bad selector {css}: {e:?}")))
}
