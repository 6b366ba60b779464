mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use vocab_client::{decode_question, Driver, OllamaOracle, Session, UreqTransport};
use vocab_core::{AnswerOracle, Question, QuestionStore};
use vocab_store::SqliteStore;

use config::Config;

#[derive(Parser)]
#[command(
    name = "vocab",
    version,
    about = "Automated practice sessions against a vocabulary challenge service"
)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Practice a word list until stopped
    Run {
        /// Word list to practice (overrides [session] list_id)
        #[arg(short, long)]
        list_id: Option<u64>,

        /// Stop after this many answers (overrides [run] max_answers)
        #[arg(short, long)]
        max_answers: Option<usize>,
    },

    /// Check whether the configured cookies are logged in
    Check,

    /// Decode a saved start/next reply and print the question
    Decode {
        /// JSON file holding the server reply
        file: PathBuf,

        /// Also record the question in the database
        #[arg(long)]
        save: bool,

        /// Ask the oracle which choice it would pick
        #[arg(long)]
        ask: bool,
    },

    /// Show database statistics
    Stats,

    /// List recently seen questions
    List {
        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show the active configuration
    Config,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("dev", "vocab", "vocab")
        .map(|dirs| dirs.data_dir().join("questions.db"))
        .unwrap_or_else(|| PathBuf::from("questions.db"))
}

/// `--db` wins over `[store] path`, which wins over the platform default.
fn resolve_db_path(flag: Option<PathBuf>, cfg: &Config) -> PathBuf {
    flag.or_else(|| cfg.store.path.as_ref().map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn open_store(path: &Path) -> Result<SqliteStore> {
    SqliteStore::new(path).context("failed to open database")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // A practice run reports progress at info; everything else stays quiet.
    let level = match cli.command {
        Commands::Run { .. } => tracing_subscriber::filter::LevelFilter::INFO,
        _ => tracing_subscriber::filter::LevelFilter::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let cfg = config::load_config()?;
    let db_path = resolve_db_path(cli.db, &cfg);

    match cli.command {
        Commands::Run {
            list_id,
            max_answers,
        } => cmd_run(&cfg, &db_path, list_id, max_answers),
        Commands::Check => cmd_check(&cfg, &db_path),
        Commands::Decode { file, save, ask } => cmd_decode(&cfg, &db_path, &file, save, ask),
        Commands::Stats => cmd_stats(&open_store(&db_path)?),
        Commands::List { limit } => cmd_list(&open_store(&db_path)?, limit),
        Commands::Config => cmd_config(&cfg, &db_path),
    }
}

fn build_session(cfg: &Config, db_path: &Path) -> Result<Session<UreqTransport, SqliteStore>> {
    let cookies = cfg.cookie_jar();
    if cookies.is_empty() {
        bail!("no session cookies configured; set [cookies] or VOCAB_JSESSIONID");
    }
    let transport = UreqTransport::new(&cfg.transport_config());
    let store = open_store(db_path)?;
    Ok(Session::new(transport, store, &cfg.session_config(), cookies))
}

fn cmd_run(
    cfg: &Config,
    db_path: &Path,
    list_id: Option<u64>,
    max_answers: Option<usize>,
) -> Result<()> {
    let list_id = list_id.unwrap_or(cfg.session.list_id);
    let mut driver_config = cfg.driver_config();
    if max_answers.is_some() {
        driver_config.max_answers = max_answers;
    }

    let mut session = build_session(cfg, db_path)?;
    let oracle = OllamaOracle::new(cfg.oracle_config());

    tracing::info!(list_id, db = %db_path.display(), "starting practice run");
    let summary = Driver::new(&mut session, &oracle, driver_config)
        .run(list_id)
        .with_context(|| format!("practice run on list {list_id} failed"))?;

    println!("Answered:  {}", summary.answered);
    println!("Correct:   {}", summary.correct);
    println!("Rounds:    {}", summary.rounds_completed);
    println!("Points:    {}", summary.points);
    Ok(())
}

fn cmd_check(cfg: &Config, db_path: &Path) -> Result<()> {
    let mut session = build_session(cfg, db_path)?;
    let names = session.state().cookies.names().collect::<Vec<_>>().join(", ");
    println!("Cookies:   {names}");
    if session.is_logged_in().context("identity check failed")? {
        println!("Logged in.");
        Ok(())
    } else {
        bail!("not logged in; refresh the session cookies")
    }
}

/// Read a saved server reply and decode the question inside it.
fn load_payload(file: &Path) -> Result<(Question, String)> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let payload: Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
    decode_question(&payload).with_context(|| format!("decoding {}", file.display()))
}

fn cmd_decode(cfg: &Config, db_path: &Path, file: &Path, save: bool, ask: bool) -> Result<()> {
    let (question, secret) = load_payload(file)?;
    print_question(&question);
    println!("Secret:    {secret}");

    if save {
        let store = open_store(db_path)?;
        store.upsert(&question)?;
        println!("Saved to {}", db_path.display());
    }
    if ask {
        let oracle = OllamaOracle::new(cfg.oracle_config());
        let choice = oracle.resolve(&question).context("oracle failed")?;
        println!("Oracle:    {choice}");
    }
    Ok(())
}

fn print_question(q: &Question) {
    println!("Type:      {} ({})", q.question_type, q.kind());
    println!("Difficulty: {:.2}", q.difficulty);
    if !q.context.is_empty() {
        println!("Context:   {}", q.context);
    }
    println!("Prompt:    {}", q.prompt);
    for choice in &q.choices {
        println!("  - {choice}");
    }
    if !q.answer.is_empty() {
        println!("Answer:    {} ({})", q.answer, q.answer_key);
    }
}

fn cmd_stats(store: &SqliteStore) -> Result<()> {
    let stats = store.stats()?;
    println!("Questions: {}", stats.total_questions);
    println!("Correct:   {}", stats.correct_questions);
    for (question_type, count) in &stats.by_type {
        println!("  {question_type}: {count}");
    }
    if let Some(first) = stats.first_seen {
        println!("First:     {}", first.format("%Y-%m-%d %H:%M"));
    }
    if let Some(last) = stats.last_seen {
        println!("Last:      {}", last.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

fn cmd_list(store: &SqliteStore, limit: usize) -> Result<()> {
    let questions = store.list_recent(limit)?;
    if questions.is_empty() {
        println!("No questions recorded.");
        return Ok(());
    }
    for q in &questions {
        let mark = if q.is_correct { "✓" } else { " " };
        let answer = if q.answer.is_empty() { "-" } else { &q.answer };
        println!("[{mark}] {:<2} {} => {answer}", q.question_type, q.prompt);
    }
    Ok(())
}

fn cmd_config(cfg: &Config, db_path: &Path) -> Result<()> {
    println!("Config: {}", config::show_config_path());
    println!();
    println!("[store]");
    println!("  path = {}", db_path.display());
    println!();
    println!("[session]");
    println!("  base_url = {}", cfg.session.base_url);
    println!("  list_id = {}", cfg.session.list_id);
    println!("  user_agent = {}", cfg.session.user_agent);
    println!("  ja3 = {}", cfg.session.ja3.as_deref().unwrap_or("(none)"));
    println!("  timeout_secs = {}", cfg.session.timeout_secs);
    println!();
    println!("[cookies]");
    let jar = cfg.cookie_jar();
    let names: Vec<&str> = jar.names().collect();
    if names.is_empty() {
        println!("  (none)");
    } else {
        println!("  set = {}", names.join(", "));
    }
    println!();
    println!("[oracle]");
    println!("  endpoint = {}", cfg.oracle.endpoint);
    println!("  model = {}", cfg.oracle.model);
    println!("  timeout_secs = {}", cfg.oracle.timeout_secs);
    println!();
    println!("[pacing]");
    println!("  step_secs = {}", cfg.pacing.step_secs);
    println!();
    println!("[run]");
    match cfg.run.max_answers {
        Some(n) => println!("  max_answers = {n}"),
        None => println!("  max_answers = (unlimited)"),
    }
    Ok(())
}
