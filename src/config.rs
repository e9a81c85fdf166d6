//! Runtime configuration
//!
//! Read from the environment (optionally seeded from a `.env` file by the
//! binary). Command-line flags override individual fields afterwards.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Postgres connection parameters used by the "connect" step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "postgres".to_string(),
            port: 5432,
            dbname: "ai2query".to_string(),
            user: "user".to_string(),
            password: "pass".to_string(),
        }
    }
}

/// OpenAI-compatible chat endpoint (Ollama exposes one under `/v1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://ollama:11434/v1".to_string(),
            model: "sqlcoder:7b-q4_0".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: ConnectionSettings,
    pub llm: LlmSettings,
    pub max_attempts: u32,
    pub preview_rows: usize,
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: ConnectionSettings::default(),
            llm: LlmSettings::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database = ConnectionSettings {
            host: lookup("POSTGRES_HOST").unwrap_or(defaults.database.host),
            port: parse_or("POSTGRES_PORT", &lookup, defaults.database.port)?,
            dbname: lookup("POSTGRES_DB").unwrap_or(defaults.database.dbname),
            user: lookup("POSTGRES_USER").unwrap_or(defaults.database.user),
            password: lookup("POSTGRES_PASSWORD").unwrap_or(defaults.database.password),
        };

        let llm = LlmSettings {
            base_url: lookup("LLM_BASE_URL").unwrap_or(defaults.llm.base_url),
            model: lookup("LLM_MODEL").unwrap_or(defaults.llm.model),
            api_key: lookup("LLM_API_KEY").filter(|k| !k.trim().is_empty()),
        };

        let config = Self {
            database,
            llm,
            max_attempts: parse_or("AI2QUERY_MAX_ATTEMPTS", &lookup, defaults.max_attempts)?,
            preview_rows: parse_or("AI2QUERY_PREVIEW_ROWS", &lookup, defaults.preview_rows)?,
            log_dir: lookup("AI2QUERY_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(QueryError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reflexion_log_path(&self) -> PathBuf {
        self.log_dir.join("reflexion_logs.json")
    }

    pub fn eval_results_path(&self) -> PathBuf {
        self.log_dir.join("eval_results.json")
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            QueryError::Configuration(format!("{} has an invalid value: {:?}", key, raw))
        }),
    }
}
