use thiserror::Error;

#[derive(Debug, Error)]
pub enum VocabError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server requested a round restart")]
    RestartSignal,

    #[error("no session cookies to present")]
    NoCookies,

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl VocabError {
    /// Whether this error must stop the session. A restart signal is a round
    /// transition, everything else ends the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RestartSignal)
    }
}

pub type VocabResult<T> = Result<T, VocabError>;
