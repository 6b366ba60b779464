//! The practice loop: start, then ask → answer → next until stopped.
//!
//! When an answer finishes the round (or the server signals a restart) the
//! token is dropped, a fresh round is started and the same answer is submitted
//! once more against it. The oracle's pick is only submitted if it is one of
//! the offered choices.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use vocab_core::{AnswerOracle, Choice, Question, QuestionStore, VocabError, VocabResult};

use crate::session::{AnswerOutcome, Session};
use crate::transport::Transport;

#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    /// Pause between steps.
    pub pacing: Duration,
    /// Stop after this many submitted answers; `None` runs until an error.
    pub max_answers: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub answered: usize,
    pub correct: usize,
    pub rounds_completed: usize,
    pub points: u64,
}

pub struct Driver<'a, T, S, O> {
    session: &'a mut Session<T, S>,
    oracle: &'a O,
    config: DriverConfig,
    summary: RunSummary,
}

impl<'a, T: Transport, S: QuestionStore, O: AnswerOracle> Driver<'a, T, S, O> {
    pub fn new(session: &'a mut Session<T, S>, oracle: &'a O, config: DriverConfig) -> Self {
        Self {
            session,
            oracle,
            config,
            summary: RunSummary::default(),
        }
    }

    pub fn run(mut self, list_id: u64) -> VocabResult<RunSummary> {
        self.session.start(list_id)?;

        while !self.limit_reached() {
            match self.step(list_id) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    info!(error = %e, "round interrupted, starting over");
                    self.restart_round(list_id)?;
                }
            }
        }

        self.summary.points = self.session.state().points;
        info!(
            answered = self.summary.answered,
            correct = self.summary.correct,
            rounds = self.summary.rounds_completed,
            points = self.summary.points,
            "practice run finished"
        );
        Ok(self.summary)
    }

    /// One resolve → answer → next cycle.
    fn step(&mut self, list_id: u64) -> VocabResult<()> {
        if self.session.needs_restart() {
            self.restart_round(list_id)?;
        }

        let current = self
            .session
            .current_question()
            .filter(|q| !q.is_empty())
            .cloned();
        let Some(question) = current else {
            warn!("no usable question, fetching the next one");
            self.pace();
            self.session.next_question()?;
            self.pace();
            return Ok(());
        };

        let choice = self.choose(&question)?;
        self.pace();
        self.submit(&choice)?;

        if self.session.needs_restart() {
            self.restart_round(list_id)?;
            self.pace();
            self.submit(&choice)?;
        }

        self.pace();
        if !self.session.needs_restart() {
            self.session.next_question()?;
        }
        self.pace();
        Ok(())
    }

    /// Pick the answer to submit. A spelling answer already known from the
    /// markup is used as is; otherwise the oracle decides, and its pick must be
    /// one of the offered choices.
    fn choose(&self, question: &Question) -> VocabResult<Choice> {
        if let Some(known) = known_answer(question) {
            debug!(answer = %known, "answer already known, skipping oracle");
            return Ok(known);
        }
        if question.choices.is_empty() {
            return Err(VocabError::Decode(format!(
                "{} question has no choices and no known answer",
                question.kind()
            )));
        }

        let picked = self.oracle.resolve(question)?;
        question
            .choices
            .iter()
            .find(|c| c.key == picked.key)
            .cloned()
            .ok_or_else(|| {
                VocabError::Decode(format!(
                    "oracle picked `{}`, which is not among the offered choices",
                    picked.key
                ))
            })
    }

    fn submit(&mut self, choice: &Choice) -> VocabResult<()> {
        match self.session.answer_question(choice)? {
            AnswerOutcome::Judged { correct, .. } => {
                self.summary.answered += 1;
                if correct {
                    self.summary.correct += 1;
                }
            }
            AnswerOutcome::RoundRestarted => {}
        }
        Ok(())
    }

    fn restart_round(&mut self, list_id: u64) -> VocabResult<()> {
        info!("round over, restarting");
        self.summary.rounds_completed += 1;
        self.session.reset_token();
        match self.session.start(list_id)? {
            Some(_) => Ok(()),
            None => Err(VocabError::Protocol(
                "restarted round did not produce a question".into(),
            )),
        }
    }

    fn limit_reached(&self) -> bool {
        self.config
            .max_answers
            .is_some_and(|max| self.summary.answered >= max)
    }

    fn pace(&self) {
        if !self.config.pacing.is_zero() {
            thread::sleep(self.config.pacing);
        }
    }
}

/// The answer a free-form question carries in its own markup, when it can be
/// submitted: either there are no choices, or reconciliation already swapped in
/// a choice token.
fn known_answer(question: &Question) -> Option<Choice> {
    if !question.kind().is_free_form() || question.answer_key.is_empty() {
        return None;
    }
    let offered = question.choices.is_empty()
        || question.choices.iter().any(|c| c.key == question.answer_key);
    offered.then(|| Choice::new(&question.answer_key, &question.answer))
}
