//! Generate operation
//!
//! Question in, one of three response shapes out. Callers branch on
//! `status` rather than on error text.

use crate::config::{AppConfig, DEFAULT_PREVIEW_ROWS};
use crate::enrichment::{enrich, Enrichment};
use crate::error::Result;
use crate::execution::{ExecutionProbe, Row};
use crate::execution_loop::{LoopContext, RetryController, RetryOutcome};
use crate::llm::GenerationClient;
use crate::reflexion::ReflexionLog;
use crate::schema::SchemaContext;
use crate::session::Session;
use crate::validation::NO_KNOWN_TABLE;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerateResponse {
    RejectedByValidation {
        sql: String,
        error: String,
        attempts: u32,
    },
    ExhaustedRetries {
        sql: String,
        error: String,
        attempts: u32,
    },
    Succeeded {
        sql: String,
        preview: Vec<Row>,
        explanation: Enrichment,
        plan_explanation: Enrichment,
        attempts: u32,
    },
}

impl GenerateResponse {
    pub fn sql(&self) -> &str {
        match self {
            GenerateResponse::RejectedByValidation { sql, .. }
            | GenerateResponse::ExhaustedRetries { sql, .. }
            | GenerateResponse::Succeeded { sql, .. } => sql,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            GenerateResponse::RejectedByValidation { attempts, .. }
            | GenerateResponse::ExhaustedRetries { attempts, .. }
            | GenerateResponse::Succeeded { attempts, .. } => *attempts,
        }
    }
}

pub struct QueryAssistant {
    generator: Arc<dyn GenerationClient>,
    reflexion: Arc<dyn ReflexionLog>,
    controller: RetryController,
    preview_rows: usize,
}

impl QueryAssistant {
    pub fn new(generator: Arc<dyn GenerationClient>, reflexion: Arc<dyn ReflexionLog>) -> Self {
        Self {
            generator,
            reflexion,
            controller: RetryController::default(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        generator: Arc<dyn GenerationClient>,
        reflexion: Arc<dyn ReflexionLog>,
    ) -> Self {
        Self::new(generator, reflexion)
            .with_max_attempts(config.max_attempts)
            .with_preview_rows(config.preview_rows)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.controller = RetryController::new(max_attempts);
        self
    }

    pub fn with_preview_rows(mut self, preview_rows: usize) -> Self {
        self.preview_rows = preview_rows;
        self
    }

    pub fn controller(&self) -> &RetryController {
        &self.controller
    }

    pub async fn generate(&self, session: &Session, question: &str) -> Result<GenerateResponse> {
        self.generate_with(session.schema(), session.probe(), question)
            .await
    }

    /// Run the retry loop and, on success, the enrichment stage.
    pub async fn generate_with(
        &self,
        schema: &SchemaContext,
        probe: &dyn ExecutionProbe,
        question: &str,
    ) -> Result<GenerateResponse> {
        let ctx = LoopContext {
            schema,
            generator: self.generator.as_ref(),
            probe,
            reflexion: self.reflexion.as_ref(),
        };

        let response = match self.controller.run(question, &ctx).await? {
            RetryOutcome::RejectedByValidation { sql, attempts } => {
                GenerateResponse::RejectedByValidation {
                    sql,
                    error: NO_KNOWN_TABLE.to_string(),
                    attempts,
                }
            }
            RetryOutcome::ExhaustedRetries {
                sql,
                error,
                attempts,
            } => GenerateResponse::ExhaustedRetries {
                sql,
                error,
                attempts,
            },
            RetryOutcome::Succeeded {
                sql,
                mut rows,
                attempts,
            } => {
                let report = enrich(&sql, self.generator.as_ref(), probe).await;
                rows.truncate(self.preview_rows);
                GenerateResponse::Succeeded {
                    sql,
                    preview: rows,
                    explanation: report.explanation,
                    plan_explanation: report.plan_explanation,
                    attempts,
                }
            }
        };
        Ok(response)
    }
}
