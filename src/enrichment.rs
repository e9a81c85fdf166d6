//! Post-success enrichment
//!
//! Natural-language explanations of a query that already succeeded. Each
//! kind degrades on its own to a fixed placeholder; the stage has no error
//! path, so it cannot turn a success into a failure.

use crate::execution::ExecutionProbe;
use crate::llm::GenerationClient;
use crate::prompt::PromptBuilder;
use serde::{Serialize, Serializer};
use tracing::warn;

pub const EXPLANATION_UNAVAILABLE: &str = "Query explanation failed.";
pub const PLAN_EXPLANATION_UNAVAILABLE: &str = "Query plan explanation failed.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment {
    Available(String),
    Unavailable { placeholder: &'static str },
}

impl Enrichment {
    pub fn text(&self) -> &str {
        match self {
            Enrichment::Available(text) => text,
            Enrichment::Unavailable { placeholder } => placeholder,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Enrichment::Available(_))
    }
}

// Callers see plain text either way.
impl Serialize for Enrichment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.text())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub explanation: Enrichment,
    pub plan_explanation: Enrichment,
}

pub async fn enrich(
    sql: &str,
    generator: &dyn GenerationClient,
    probe: &dyn ExecutionProbe,
) -> EnrichmentReport {
    EnrichmentReport {
        explanation: explain_query(sql, generator).await,
        plan_explanation: explain_plan(sql, generator, probe).await,
    }
}

async fn explain_query(sql: &str, generator: &dyn GenerationClient) -> Enrichment {
    match generator.generate(&PromptBuilder::explain_sql(sql)).await {
        Ok(text) => Enrichment::Available(text),
        Err(e) => {
            warn!("Query explanation failed: {}", e);
            Enrichment::Unavailable {
                placeholder: EXPLANATION_UNAVAILABLE,
            }
        }
    }
}

async fn explain_plan(
    sql: &str,
    generator: &dyn GenerationClient,
    probe: &dyn ExecutionProbe,
) -> Enrichment {
    let unavailable = Enrichment::Unavailable {
        placeholder: PLAN_EXPLANATION_UNAVAILABLE,
    };

    let plan = match probe.explain(sql).await {
        Ok(plan) => plan,
        Err(e) => {
            warn!("Query plan unavailable: {}", e);
            return unavailable;
        }
    };

    let messages = match PromptBuilder::explain_plan(&plan) {
        Ok(messages) => messages,
        Err(e) => {
            warn!("Query plan could not be rendered: {}", e);
            return unavailable;
        }
    };

    match generator.generate(&messages).await {
        Ok(text) => Enrichment::Available(text),
        Err(e) => {
            warn!("Query plan explanation failed: {}", e);
            unavailable
        }
    }
}
