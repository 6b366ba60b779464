//! Practice-round state machine.
//!
//! A round is `Start → (Answer → Next)*`. Every reply rotates the continuation
//! token and usually the session cookies, and both must be echoed on the next
//! call or the server treats the session as new. When the server decides the
//! round is over it answers 400 with [`RESTART_SIGNAL`]; that is handled here as
//! a transition to [`Phase::Restarting`], never surfaced as an error.

use std::fmt;

use rand::Rng;
use tracing::{debug, info, warn};

use vocab_core::{Choice, Question, QuestionStore, VocabError, VocabResult};

use crate::cookies::CookieJar;
use crate::decode::decode_question;
use crate::protocol::{
    extract_answer_result, extract_error, extract_logged_in, extract_progress, extract_secret,
    is_restart_signal, AnswerRequest, Endpoints, NextQuestionRequest, StartRequest,
    PROTOCOL_VERSION, RESTART_SIGNAL,
};
use crate::transport::{Body, HttpRequest, Method, Transport};

const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";
const CONTENT_TYPE_URL_ENCODED: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Activity type for practice rounds.
const ACTIVITY_PRACTICE: &str = "p";

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The last exchange that completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fresh,
    Started,
    Answering,
    Transitioning,
    Restarting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Started => write!(f, "started"),
            Self::Answering => write!(f, "answering"),
            Self::Transitioning => write!(f, "transitioning"),
            Self::Restarting => write!(f, "restarting"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    /// The server's "secret"; empty until the first start.
    pub continuation_token: String,
    /// Progress through the current round, 0.0 to 1.0.
    pub completion: f64,
    pub cookies: CookieJar,
    pub current_question: Option<Question>,
    pub phase: Phase,
    /// Points reported by answer verdicts.
    pub points: u64,
}

impl SessionState {
    pub fn new(cookies: CookieJar) -> Self {
        Self {
            continuation_token: String::new(),
            completion: 0.0,
            cookies,
            current_question: None,
            phase: Phase::Fresh,
            points: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Judged { correct: bool, target_word: String },
    RoundRestarted,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: String,
    pub user_agent: String,
}

/// Simulated human response latency: uniform in [3, 9] seconds, rounded to
/// the millisecond, as an integer millisecond count.
pub fn response_time_ms<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    let seconds: f64 = rng.gen_range(3.0..=9.0);
    let rounded = (seconds * 1000.0).round() / 1000.0;
    (rounded * 1000.0) as u32
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session<T, S> {
    transport: T,
    store: S,
    endpoints: Endpoints,
    base_headers: Vec<(String, String)>,
    state: SessionState,
}

impl<T: Transport, S: QuestionStore> Session<T, S> {
    pub fn new(transport: T, store: S, config: &SessionConfig, cookies: CookieJar) -> Self {
        let endpoints = Endpoints::new(&config.base_url);
        let base_headers = vec![
            ("User-Agent".to_string(), config.user_agent.clone()),
            ("Origin".to_string(), endpoints.base_url().to_string()),
            ("X-Requested-With".to_string(), "XMLHttpRequest".to_string()),
        ];
        Self {
            transport,
            store,
            endpoints,
            base_headers,
            state: SessionState::new(cookies),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn completion(&self) -> f64 {
        self.state.completion
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.state.current_question.as_ref()
    }

    /// A finished round must be started again before answering or advancing.
    pub fn needs_restart(&self) -> bool {
        self.state.completion >= 1.0
    }

    /// Forget the continuation token so the next start opens a new round.
    pub fn reset_token(&mut self) {
        self.state.continuation_token.clear();
    }

    /// Ask the identity endpoint whether the seeded cookies are logged in.
    pub fn is_logged_in(&mut self) -> VocabResult<bool> {
        let url = self.endpoints.me();
        let data = self.exchange(Method::Get, url, Body::Empty)?;
        Ok(extract_logged_in(&data))
    }

    /// Start (or continue) a practice round on `list_id`.
    ///
    /// Returns `None` when the server signals that the round has to be
    /// restarted; completion is then 1.0 and the caller must start again.
    pub fn start(&mut self, list_id: u64) -> VocabResult<Option<Question>> {
        let secret = if self.state.continuation_token.is_empty() {
            self.state.completion = 0.0;
            None
        } else {
            info!("continuing previous round");
            Some(self.state.continuation_token.clone())
        };
        let body = serde_json::to_value(StartRequest {
            v: PROTOCOL_VERSION,
            activitytype: ACTIVITY_PRACTICE,
            wordlistid: list_id,
            secret: secret.as_deref(),
        })?;

        info!(list_id, "starting practice round");
        let url = self.endpoints.start();
        let data = match self.exchange(Method::Post, url, Body::Json(body)) {
            Ok(data) => data,
            Err(VocabError::RestartSignal) => {
                self.enter_restart();
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let (question, secret) = decode_question(&data)?;
        self.state.continuation_token = secret;
        self.store.upsert(&question)?;
        self.apply_progress_if_present(&data);

        self.state.current_question = Some(question.clone());
        self.state.phase = Phase::Started;
        Ok(Some(question))
    }

    /// Submit `choice` for the question in flight.
    ///
    /// The reply must carry the token, the verdict (`answer.correct`,
    /// `answer.word`) and `game.progress`; if any is missing nothing is
    /// updated or persisted.
    pub fn answer_question(&mut self, choice: &Choice) -> VocabResult<AnswerOutcome> {
        self.ensure_can_answer()?;

        let rt = response_time_ms(&mut rand::thread_rng());
        let form = AnswerRequest {
            secret: &self.state.continuation_token,
            v: PROTOCOL_VERSION,
            rt,
            a: &choice.key,
        }
        .to_form();

        debug!(choice = %choice, rt, "answering question");
        let url = self.endpoints.save_answer();
        let data = match self.exchange(Method::Post, url, Body::Form(form)) {
            Ok(data) => data,
            Err(VocabError::RestartSignal) => {
                self.enter_restart();
                return Ok(AnswerOutcome::RoundRestarted);
            }
            Err(e) => return Err(e),
        };

        let secret = extract_secret(&data)?;
        let result = extract_answer_result(&data)?;
        let progress = extract_progress(&data)?;

        self.state.continuation_token = secret;
        let question = self
            .state
            .current_question
            .as_mut()
            .ok_or_else(|| VocabError::Protocol("no question in flight".into()))?;
        question.apply_verdict(choice, result.correct, result.word.clone());
        self.store.upsert(question)?;

        self.state.completion = progress;
        if let Some(points) = result.points {
            self.state.points += points;
        }
        self.state.phase = Phase::Answering;

        info!(
            correct = result.correct,
            word = %result.word,
            progress,
            "answer judged"
        );
        Ok(AnswerOutcome::Judged {
            correct: result.correct,
            target_word: result.word,
        })
    }

    /// Fetch the next question of the round.
    ///
    /// A reply whose question cannot be decoded yields an empty question
    /// (see [`Question::is_empty`]) instead of failing the session.
    pub fn next_question(&mut self) -> VocabResult<Question> {
        self.ensure_can_advance()?;

        let body = serde_json::to_value(NextQuestionRequest {
            secret: &self.state.continuation_token,
            v: PROTOCOL_VERSION,
        })?;

        debug!("fetching next question");
        let url = self.endpoints.next_question();
        let data = match self.exchange(Method::Post, url, Body::Json(body)) {
            Ok(data) => data,
            Err(VocabError::RestartSignal) => {
                self.enter_restart();
                return Ok(Question::default());
            }
            Err(e) => return Err(e),
        };

        self.state.continuation_token = extract_secret(&data)?;

        let question = match decode_question(&data) {
            Ok((question, _)) => {
                self.store.upsert(&question)?;
                question
            }
            Err(e) => {
                warn!(error = %e, "could not decode next question, continuing without one");
                Question::default()
            }
        };
        self.apply_progress_if_present(&data);

        self.state.current_question = Some(question.clone());
        self.state.phase = Phase::Transitioning;
        Ok(question)
    }

    // --- internals ---

    fn ensure_can_answer(&self) -> VocabResult<()> {
        if !matches!(self.state.phase, Phase::Started | Phase::Transitioning) {
            return Err(VocabError::Protocol(format!(
                "cannot answer while {}",
                self.state.phase
            )));
        }
        if self.needs_restart() {
            return Err(VocabError::Protocol(
                "round complete, start a new one before answering".into(),
            ));
        }
        match &self.state.current_question {
            Some(q) if !q.is_empty() => Ok(()),
            _ => Err(VocabError::Protocol("no question in flight".into())),
        }
    }

    fn ensure_can_advance(&self) -> VocabResult<()> {
        if !matches!(self.state.phase, Phase::Answering | Phase::Transitioning) {
            return Err(VocabError::Protocol(format!(
                "cannot fetch next question while {}",
                self.state.phase
            )));
        }
        if self.needs_restart() {
            return Err(VocabError::Protocol(
                "round complete, start a new one before advancing".into(),
            ));
        }
        Ok(())
    }

    fn enter_restart(&mut self) {
        info!("server ended the round ({RESTART_SIGNAL})");
        self.state.current_question = None;
        self.state.completion = 1.0;
        self.state.phase = Phase::Restarting;
    }

    fn apply_progress_if_present(&mut self, data: &serde_json::Value) {
        match extract_progress(data) {
            Ok(progress) => self.state.completion = progress,
            Err(e) => debug!(error = %e, "no round progress in reply, keeping previous value"),
        }
    }

    /// One request/response cycle. Cookies from the reply are merged before
    /// the status is looked at, since the server rotates them on errors too.
    fn exchange(
        &mut self,
        method: Method,
        url: String,
        body: Body,
    ) -> VocabResult<serde_json::Value> {
        let mut headers = self.base_headers.clone();
        match &body {
            Body::Json(_) => headers.push(("Content-Type".into(), CONTENT_TYPE_JSON.into())),
            Body::Form(_) => {
                headers.push(("Content-Type".into(), CONTENT_TYPE_URL_ENCODED.into()))
            }
            Body::Empty => {}
        }
        match self.state.cookies.render() {
            Ok(cookie) => headers.push(("Cookie".into(), cookie)),
            Err(VocabError::NoCookies) => debug!("no session cookies yet, sending none"),
            Err(e) => return Err(e),
        }

        let request = HttpRequest {
            method,
            url,
            headers,
            body,
        };
        let response = self.transport.execute(&request)?;
        self.state.cookies = self.state.cookies.merge_headers(&response.set_cookies);

        let data = response.json()?;
        if is_restart_signal(response.status, &data) {
            return Err(VocabError::RestartSignal);
        }
        if !response.is_success() {
            return Err(VocabError::Protocol(format!(
                "{} returned {}: {}",
                request.url,
                response.status,
                extract_error(&data).unwrap_or("no error message")
            )));
        }
        Ok(data)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
