pub mod cookies;
pub mod decode;
pub mod driver;
pub mod oracle;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cookies::{Cookie, CookieJar};
pub use decode::decode_question;
pub use driver::{Driver, DriverConfig, RunSummary};
pub use oracle::{OllamaOracle, OracleConfig};
pub use session::{AnswerOutcome, Phase, Session, SessionConfig, SessionState};
pub use transport::{Transport, TransportConfig, UreqTransport};
