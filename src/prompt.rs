//! Prompt construction
//!
//! Every prompt is a pure function of its inputs so that identical inputs
//! always produce identical messages.

use crate::error::{QueryError, Result};
use crate::llm::ChatMessage;
use crate::schema::SchemaDescriptor;

/// Query returned by the model when nothing in the schema fits the question.
pub const EMPTY_RESULT_FALLBACK: &str = "SELECT 'No matching table found' WHERE false;";

/// Instruction (system) and context (user) message for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePair {
    pub instruction: ChatMessage,
    pub context: ChatMessage,
}

impl MessagePair {
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        vec![self.instruction.clone(), self.context.clone()]
    }
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the generation prompt.
    ///
    /// Fails with a configuration error when the schema is empty: the model
    /// must never be asked to write SQL with no grounding context.
    pub fn build(
        schema: &SchemaDescriptor,
        question: &str,
        prior_error: Option<&str>,
    ) -> Result<MessagePair> {
        if schema.is_empty() {
            return Err(QueryError::Configuration(
                "Schema context is not set.".to_string(),
            ));
        }

        let instruction = format!(
            "You are a PostgreSQL expert. Generate a PostgreSQL query.\n\
             You will only use the schema provided below.\n\
             - Do NOT hallucinate tables or columns.\n\
             - Use CTEs or subqueries where appropriate.\n\
             - If the question is unanswerable, return a syntactically correct SELECT query that returns an empty result.\n\
             - Return only the SQL query, without commentary.\n\
             \n\
             Schema:\n\
             {}",
            schema.render()
        );

        let context = match prior_error {
            Some(error) => format!(
                "The previous query failed with the error:\n\
                 {}\n\
                 \n\
                 Please correct the SQL for the question below. If the error is caused by missing tables or columns \
                 and the schema doesn't contain any table relevant to this question, return:\n\
                 {}\n\
                 \n\
                 Question:\n\
                 {}",
                error, EMPTY_RESULT_FALLBACK, question
            ),
            None => format!("Generate a SQL query to answer:\n{}", question),
        };

        Ok(MessagePair {
            instruction: ChatMessage::system(instruction),
            context: ChatMessage::user(context),
        })
    }

    pub fn explain_sql(sql: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::user(format!(
            "Explain this SQL step-by-step:\n\n{}",
            sql
        ))]
    }

    pub fn explain_plan(plan: &serde_json::Value) -> Result<Vec<ChatMessage>> {
        let plan_text = serde_json::to_string_pretty(plan)?;
        Ok(vec![ChatMessage::user(format!(
            "Explain this PostgreSQL query plan:\n\n{}",
            plan_text
        ))])
    }
}

/// Normalize model output into query text: trim, and unwrap a Markdown code
/// fence if the model added one.
pub fn extract_sql(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    // Drop the info string (```sql) up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    let body = match body.rfind("```") {
        Some(idx) => &body[..idx],
        None => body,
    };
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new().with_table("orders", &[("id", "integer"), ("total", "numeric")])
    }

    #[test]
    fn test_empty_schema_is_a_configuration_error() {
        let err = PromptBuilder::build(&SchemaDescriptor::new(), "how many orders?", None).unwrap_err();
        assert!(matches!(err, QueryError::Configuration(_)));
    }

    #[test]
    fn test_first_attempt_prompt() {
        let pair = PromptBuilder::build(&schema(), "how many orders?", None).unwrap();
        assert_eq!(pair.instruction.role, "system");
        assert!(pair.instruction.content.contains("Table orders:\nid integer\ntotal numeric"));
        assert_eq!(pair.context.role, "user");
        assert!(pair.context.content.ends_with("how many orders?"));
        assert!(!pair.context.content.contains("previous query failed"));
    }

    #[test]
    fn test_retry_prompt_carries_error_verbatim_and_fallback() {
        let error = "ERROR:  column \"totl\" does not exist\nLINE 1: SELECT totl FROM orders";
        let pair = PromptBuilder::build(&schema(), "sum of totals", Some(error)).unwrap();
        assert!(pair.context.content.contains(error));
        assert!(pair.context.content.contains(EMPTY_RESULT_FALLBACK));
        assert!(pair.context.content.ends_with("sum of totals"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = PromptBuilder::build(&schema(), "q", Some("e")).unwrap();
        let b = PromptBuilder::build(&schema(), "q", Some("e")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_messages().len(), 2);
    }

    #[test]
    fn test_extract_sql() {
        assert_eq!(extract_sql("  SELECT 1;\n"), "SELECT 1;");
        assert_eq!(extract_sql("```sql\nSELECT * FROM orders;\n```"), "SELECT * FROM orders;");
        assert_eq!(extract_sql("```\nSELECT 1\n```\n"), "SELECT 1");
    }
}
