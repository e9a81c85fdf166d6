//! Retry controller
//!
//! Bounded generate -> validate -> execute loop, written as an explicit state
//! machine:
//!
//! ```text
//! GENERATING -> VALIDATING -> EXECUTING -> SUCCEEDED
//!                    |            |
//!                    v            v (execution error, attempts remain)
//!                REJECTED     GENERATING
//!                                 |
//!                                 v (execution error, no attempts left)
//!                             EXHAUSTED
//! ```
//!
//! Only configuration and remote generation errors escape as `Err`; the three
//! terminal states are ordinary values of [`RetryOutcome`].

use crate::config::DEFAULT_MAX_ATTEMPTS;
use crate::error::Result;
use crate::execution::{ExecutionProbe, RowSet};
use crate::execution_loop::error_classifier::{ErrorClassifier, SqlErrorClass};
use crate::llm::GenerationClient;
use crate::prompt::{extract_sql, PromptBuilder};
use crate::reflexion::{ReflexionLog, ReflexionRecord};
use crate::schema::SchemaContext;
use crate::validation::{ValidationGate, NO_KNOWN_TABLE};
use tracing::{debug, info, warn};

/// Collaborators one loop run talks to.
pub struct LoopContext<'a> {
    pub schema: &'a SchemaContext,
    pub generator: &'a dyn GenerationClient,
    pub probe: &'a dyn ExecutionProbe,
    pub reflexion: &'a dyn ReflexionLog,
}

/// One pass through the loop. Superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationAttempt {
    pub question: String,
    /// 1-based, never above the controller's `max_attempts`
    pub attempt: u32,
    pub candidate_sql: String,
    pub prior_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Succeeded {
        sql: String,
        rows: RowSet,
        attempts: u32,
    },
    RejectedByValidation {
        sql: String,
        attempts: u32,
    },
    ExhaustedRetries {
        sql: String,
        error: String,
        attempts: u32,
    },
}

impl RetryOutcome {
    /// Last candidate query tried, whatever the outcome.
    pub fn sql(&self) -> &str {
        match self {
            RetryOutcome::Succeeded { sql, .. }
            | RetryOutcome::RejectedByValidation { sql, .. }
            | RetryOutcome::ExhaustedRetries { sql, .. } => sql,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. }
            | RetryOutcome::RejectedByValidation { attempts, .. }
            | RetryOutcome::ExhaustedRetries { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }
}

#[derive(Debug)]
enum LoopState {
    Generating {
        attempt: u32,
        prior_error: Option<String>,
    },
    Validating(GenerationAttempt),
    Executing(GenerationAttempt),
    Finished(RetryOutcome),
}

#[derive(Debug, Clone)]
pub struct RetryController {
    max_attempts: u32,
    error_classifier: ErrorClassifier,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryController {
    /// `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            error_classifier: ErrorClassifier::new(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run the loop for `question` until a terminal state.
    ///
    /// Rejections and exhausted retries are written to the reflexion log
    /// before returning.
    pub async fn run(&self, question: &str, ctx: &LoopContext<'_>) -> Result<RetryOutcome> {
        let mut state = LoopState::Generating {
            attempt: 1,
            prior_error: None,
        };

        loop {
            state = match state {
                LoopState::Finished(outcome) => {
                    self.record_failure(question, &outcome, ctx.reflexion);
                    return Ok(outcome);
                }
                other => self.step(question, other, ctx).await?,
            };
        }
    }

    async fn step(&self, question: &str, state: LoopState, ctx: &LoopContext<'_>) -> Result<LoopState> {
        let next = match state {
            LoopState::Generating {
                attempt,
                prior_error,
            } => {
                info!("Generation attempt {} of {}", attempt, self.max_attempts);
                let prompt = PromptBuilder::build(
                    ctx.schema.descriptor(),
                    question,
                    prior_error.as_deref(),
                )?;
                debug!("Prompt: {:?}", prompt);

                // Remote failures are fatal for this run; callers may retry
                // the whole operation.
                let generated = ctx.generator.generate(&prompt.to_messages()).await?;

                LoopState::Validating(GenerationAttempt {
                    question: question.to_string(),
                    attempt,
                    candidate_sql: extract_sql(&generated),
                    prior_error,
                })
            }

            LoopState::Validating(attempt) => {
                if ValidationGate::accepts(&attempt.candidate_sql, ctx.schema.known_tables()) {
                    LoopState::Executing(attempt)
                } else {
                    warn!(
                        "Attempt {} rejected by validation: {}",
                        attempt.attempt, attempt.candidate_sql
                    );
                    LoopState::Finished(RetryOutcome::RejectedByValidation {
                        sql: attempt.candidate_sql,
                        attempts: attempt.attempt,
                    })
                }
            }

            LoopState::Executing(attempt) => match ctx.probe.run(&attempt.candidate_sql).await {
                Ok(rows) => {
                    info!(
                        "SQL execution succeeded on attempt {} ({} rows)",
                        attempt.attempt,
                        rows.len()
                    );
                    LoopState::Finished(RetryOutcome::Succeeded {
                        sql: attempt.candidate_sql,
                        rows,
                        attempts: attempt.attempt,
                    })
                }
                Err(error) => {
                    let error_class = self.error_classifier.classify(&error.message);
                    warn!(
                        "Attempt {} failed ({}): {}",
                        attempt.attempt, error_class, error.message
                    );
                    if attempt.attempt < self.max_attempts {
                        LoopState::Generating {
                            attempt: attempt.attempt + 1,
                            prior_error: Some(error.message),
                        }
                    } else {
                        LoopState::Finished(RetryOutcome::ExhaustedRetries {
                            sql: attempt.candidate_sql,
                            error: error.message,
                            attempts: attempt.attempt,
                        })
                    }
                }
            },

            LoopState::Finished(outcome) => LoopState::Finished(outcome),
        };
        Ok(next)
    }

    fn record_failure(&self, question: &str, outcome: &RetryOutcome, reflexion: &dyn ReflexionLog) {
        let record = match outcome {
            RetryOutcome::Succeeded { .. } => return,
            RetryOutcome::RejectedByValidation { sql, attempts } => {
                ReflexionRecord::new(question, sql, NO_KNOWN_TABLE, *attempts)
                    .with_error_class(SqlErrorClass::Ungrounded)
            }
            RetryOutcome::ExhaustedRetries {
                sql,
                error,
                attempts,
            } => ReflexionRecord::new(question, sql, error, *attempts)
                .with_error_class(self.error_classifier.classify(error)),
        };

        // The log is best effort: a failed append never changes the outcome.
        if let Err(e) = reflexion.record(&record) {
            warn!("Failed to write reflexion record: {}", e);
        }
    }
}
