use ai2query::config::AppConfig;
use ai2query::evaluation::EvaluationHarness;
use ai2query::llm::LlmClient;
use ai2query::reflexion::JsonFileReflexionLog;
use ai2query::{QueryAssistant, Session};
use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ai2query")]
#[command(about = "Natural-language questions to validated, executed PostgreSQL")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs)]
struct Overrides {
    /// Postgres host (or set POSTGRES_HOST)
    #[arg(long, global = true)]
    db_host: Option<String>,

    /// Postgres port (or set POSTGRES_PORT)
    #[arg(long, global = true)]
    db_port: Option<u16>,

    /// Database name (or set POSTGRES_DB)
    #[arg(long, global = true)]
    db_name: Option<String>,

    /// Chat-completions base URL (or set LLM_BASE_URL)
    #[arg(long, global = true)]
    llm_url: Option<String>,

    /// Model name (or set LLM_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Generation attempts per question (or set AI2QUERY_MAX_ATTEMPTS)
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Directory for reflexion and evaluation logs (or set AI2QUERY_LOG_DIR)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate, validate and execute SQL for a question
    Generate {
        /// The question in natural language
        question: String,
    },
    /// Score generated SQL against labeled reference queries
    Evaluate {
        /// JSON array of {question, sql}
        #[arg(long, default_value = "tests/test_cases.json")]
        cases: PathBuf,

        /// Where to write the results (default: <log_dir>/eval_results.json)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check that the database answers `SELECT 1`
    Health,
}

impl Overrides {
    fn apply(self, config: &mut AppConfig) {
        if let Some(host) = self.db_host {
            config.database.host = host;
        }
        if let Some(port) = self.db_port {
            config.database.port = port;
        }
        if let Some(dbname) = self.db_name {
            config.database.dbname = dbname;
        }
        if let Some(url) = self.llm_url {
            config.llm.base_url = url;
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = log_dir;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    let llm = Arc::new(LlmClient::from_settings(&config.llm));

    match cli.command {
        Command::Generate { question } => {
            let session = Session::connect(config.database.clone()).await?;
            llm.warm_up().await;

            let reflexion = Arc::new(JsonFileReflexionLog::new(config.reflexion_log_path()));
            let assistant = QueryAssistant::from_config(&config, llm, reflexion);

            info!("Question: {}", question);
            let response = assistant.generate(&session, &question).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Evaluate { cases, output } => {
            let session = Session::connect(config.database.clone()).await?;
            let output = output.unwrap_or_else(|| config.eval_results_path());

            let harness = EvaluationHarness::new(session.schema(), llm.as_ref(), session.probe());
            let results = harness.run_file(&cases, &output).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Health => {
            let report = health_report(&config).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// `{ok, db}` or `{ok: false, error}`; connection failures are reported, not raised.
async fn health_report(config: &AppConfig) -> serde_json::Value {
    let session = match Session::connect(config.database.clone()).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Health check could not connect: {}", e);
            return health_failure(&e.to_string());
        }
    };
    match session.probe().run("SELECT 1;").await {
        Ok(rows) => serde_json::json!({"ok": true, "db": rows}),
        Err(e) => health_failure(&e.message),
    }
}

fn health_failure(error: &str) -> serde_json::Value {
    serde_json::json!({"ok": false, "error": error})
}
