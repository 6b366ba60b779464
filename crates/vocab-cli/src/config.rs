//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `$VOCAB_CONFIG` environment variable
//! 2. `~/.config/vocab/config.toml`
//! 3. Built-in defaults (everything is optional)
//!
//! Session cookies and the TLS fingerprint can also come from `VOCAB_AWSALB`,
//! `VOCAB_JSESSIONID`, `VOCAB_GUID` and `VOCAB_JA3`, which win over the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use vocab_client::oracle::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_SYSTEM};
use vocab_client::{CookieJar, DriverConfig, OracleConfig, SessionConfig, TransportConfig};
use vocab_core::{VocabError, VocabResult};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 OPR/117.0.0.0";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub session: SessionSettings,
    pub cookies: CookieConfig,
    pub oracle: OracleSettings,
    pub pacing: PacingConfig,
    pub run: RunConfig,
}

/// Database storage settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path. Default: platform-specific data dir.
    pub path: Option<String>,
}

/// Challenge service settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub base_url: String,
    /// Word list practiced by `vocab run`.
    pub list_id: u64,
    pub user_agent: String,
    pub ja3: Option<String>,
    pub timeout_secs: u64,
}

/// Seed values for the session cookies, copied from a logged-in browser.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub awsalb: Option<String>,
    pub jsessionid: Option<String>,
    pub guid: Option<String>,
}

/// Answer oracle settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub endpoint: String,
    pub model: String,
    pub system: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause between driver steps.
    pub step_secs: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_answers: Option<usize>,
}

// --- Defaults ---

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.vocabulary.com".into(),
            list_id: 1,
            user_agent: DEFAULT_USER_AGENT.into(),
            ja3: None,
            timeout_secs: 30,
        }
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            model: DEFAULT_MODEL.into(),
            system: DEFAULT_SYSTEM.into(),
            timeout_secs: 120,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self { step_secs: 3.0 }
    }
}

// --- Conversions into client settings ---

impl Config {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            base_url: self.session.base_url.clone(),
            user_agent: self.session.user_agent.clone(),
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: Duration::from_secs(self.session.timeout_secs),
            user_agent: self.session.user_agent.clone(),
            ja3: self.session.ja3.clone(),
        }
    }

    pub fn oracle_config(&self) -> OracleConfig {
        OracleConfig {
            endpoint: self.oracle.endpoint.clone(),
            model: self.oracle.model.clone(),
            system: self.oracle.system.clone(),
            timeout: Duration::from_secs(self.oracle.timeout_secs),
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            pacing: Duration::from_secs_f64(self.pacing.step_secs),
            max_answers: self.run.max_answers,
        }
    }

    pub fn cookie_jar(&self) -> CookieJar {
        CookieJar::seed([
            ("AWSALB", self.cookies.awsalb.as_deref().unwrap_or_default()),
            (
                "JSESSIONID",
                self.cookies.jsessionid.as_deref().unwrap_or_default(),
            ),
            ("guid", self.cookies.guid.as_deref().unwrap_or_default()),
        ])
    }

    /// Reject values the client cannot work with.
    pub fn validate(&self) -> VocabResult<()> {
        if self.session.base_url.trim().is_empty() {
            return Err(VocabError::Config("session.base_url is empty".into()));
        }
        if !self.pacing.step_secs.is_finite() || self.pacing.step_secs < 0.0 {
            return Err(VocabError::Config(format!(
                "pacing.step_secs must be a non-negative number, got {}",
                self.pacing.step_secs
            )));
        }
        if self.oracle.endpoint.trim().is_empty() {
            return Err(VocabError::Config("oracle.endpoint is empty".into()));
        }
        Ok(())
    }

    /// Apply `VOCAB_*` overrides; `lookup` is normally `std::env::var`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("VOCAB_AWSALB") {
            self.cookies.awsalb = Some(v);
        }
        if let Some(v) = lookup("VOCAB_JSESSIONID") {
            self.cookies.jsessionid = Some(v);
        }
        if let Some(v) = lookup("VOCAB_GUID") {
            self.cookies.guid = Some(v);
        }
        if let Some(v) = lookup("VOCAB_JA3") {
            self.session.ja3 = Some(v);
        }
    }
}

/// Load config from disk. Returns defaults if no config file exists.
pub fn load_config() -> Result<Config> {
    let path = config_path();

    let mut config = match &path {
        Some(p) if p.exists() => {
            let content =
                std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing {}", p.display()))?
        }
        _ => Config::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    // 1. Environment variable
    if let Ok(p) = std::env::var("VOCAB_CONFIG") {
        return Some(PathBuf::from(p));
    }

    // 2. ~/.config/vocab/config.toml
    if let Some(home) = dirs_home() {
        let p = home.join(".config").join("vocab").join("config.toml");
        return Some(p);
    }

    None
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Show the active config path (for `vocab config`).
pub fn show_config_path() -> String {
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}
