//! Offline evaluation against labeled reference queries.

use crate::error::{QueryError, Result};
use crate::evaluation::bleu::sentence_bleu;
use crate::execution::{ExecutionProbe, RowSet};
use crate::llm::GenerationClient;
use crate::prompt::{extract_sql, PromptBuilder};
use crate::schema::SchemaContext;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationCase {
    pub question: String,
    /// Reference query
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub question: String,
    pub reference_sql: String,
    pub generated_sql: String,
    pub bleu: f64,
    pub execution_match: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub total: usize,
    pub execution_matches: usize,
    pub mean_bleu: f64,
}

impl EvaluationSummary {
    pub fn from_results(results: &[EvaluationResult]) -> Self {
        let total = results.len();
        let execution_matches = results.iter().filter(|r| r.execution_match).count();
        let mean_bleu = if total == 0 {
            0.0
        } else {
            results.iter().map(|r| r.bleu).sum::<f64>() / total as f64
        };
        Self {
            total,
            execution_matches,
            mean_bleu,
        }
    }
}

/// Exact, order-sensitive equality of two row sequences.
pub fn execution_match(reference: &RowSet, candidate: &RowSet) -> bool {
    reference == candidate
}

pub fn load_cases(path: impl AsRef<Path>) -> Result<Vec<EvaluationCase>> {
    let content = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&content)?)
}

/// Write the whole result sequence as one snapshot.
pub fn write_results(path: impl AsRef<Path>, results: &[EvaluationResult]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(results)?)?;
    Ok(())
}

/// Runs labeled cases one at a time: one generation per case, no validation
/// gate and no retries.
pub struct EvaluationHarness<'a> {
    schema: &'a SchemaContext,
    generator: &'a dyn GenerationClient,
    probe: &'a dyn ExecutionProbe,
}

impl<'a> EvaluationHarness<'a> {
    pub fn new(
        schema: &'a SchemaContext,
        generator: &'a dyn GenerationClient,
        probe: &'a dyn ExecutionProbe,
    ) -> Self {
        Self {
            schema,
            generator,
            probe,
        }
    }

    /// One result per case, in input order. A failing case never aborts the
    /// batch; only a missing schema does, before any case runs.
    pub async fn run(&self, cases: &[EvaluationCase]) -> Result<Vec<EvaluationResult>> {
        if self.schema.descriptor().is_empty() {
            return Err(QueryError::Configuration(
                "Schema context is not set.".to_string(),
            ));
        }

        let mut results = Vec::with_capacity(cases.len());
        for (idx, case) in cases.iter().enumerate() {
            info!("Evaluating case {}/{}: {}", idx + 1, cases.len(), case.question);
            results.push(self.evaluate_case(case).await);
        }

        let summary = EvaluationSummary::from_results(&results);
        info!(
            "Evaluation finished: {}/{} execution matches, mean BLEU {:.4}",
            summary.execution_matches, summary.total, summary.mean_bleu
        );
        Ok(results)
    }

    /// Load cases, run them, and persist the results snapshot.
    pub async fn run_file(
        &self,
        cases_path: impl AsRef<Path>,
        results_path: impl AsRef<Path>,
    ) -> Result<Vec<EvaluationResult>> {
        let cases = load_cases(cases_path)?;
        let results = self.run(&cases).await?;
        write_results(results_path.as_ref(), &results)?;
        info!("Evaluation results written to {}", results_path.as_ref().display());
        Ok(results)
    }

    async fn evaluate_case(&self, case: &EvaluationCase) -> EvaluationResult {
        let generated = match self.generate_candidate(&case.question).await {
            Ok(sql) => Some(sql),
            Err(e) => {
                warn!("Generation failed for {:?}: {}", case.question, e);
                None
            }
        };

        let reference_rows = self.execute(&case.sql, "reference").await;
        let candidate_rows = match generated {
            Some(ref sql) => self.execute(sql, "generated").await,
            None => None,
        };

        // A failed execution scores as an empty row set and never matches.
        let executed_both = reference_rows.is_some() && candidate_rows.is_some();
        let reference_rows = reference_rows.unwrap_or_default();
        let candidate_rows = candidate_rows.unwrap_or_default();

        let generated_sql = generated.unwrap_or_default();
        EvaluationResult {
            question: case.question.clone(),
            reference_sql: case.sql.clone(),
            bleu: sentence_bleu(&case.sql, &generated_sql),
            generated_sql,
            execution_match: executed_both && execution_match(&reference_rows, &candidate_rows),
        }
    }

    async fn generate_candidate(&self, question: &str) -> Result<String> {
        let prompt = PromptBuilder::build(self.schema.descriptor(), question, None)?;
        let generated = self.generator.generate(&prompt.to_messages()).await?;
        Ok(extract_sql(&generated))
    }

    async fn execute(&self, sql: &str, label: &str) -> Option<RowSet> {
        match self.probe.run(sql).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!("Execution of {} query failed: {}", label, e);
                None
            }
        }
    }
}
