//! Scripted stand-ins for the generation and execution capabilities.

#![allow(dead_code)]

use ai2query::error::{ExecutionError, QueryError, Result};
use ai2query::execution::{ExecutionProbe, Row, RowSet};
use ai2query::llm::{ChatMessage, GenerationClient};
use ai2query::schema::{SchemaContext, SchemaDescriptor};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub fn orders_schema() -> SchemaContext {
    SchemaContext::new(
        SchemaDescriptor::new()
            .with_table("orders", &[("id", "integer"), ("total", "numeric")])
            .with_table("customers", &[("id", "integer"), ("name", "text")]),
    )
}

pub fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().expect("row must be a JSON object")
}

/// Replies in order; once the script runs out the last reply repeats.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String>>>,
    last: Mutex<Option<String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_results<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self::with_results(vec![Err(QueryError::RemoteGeneration(message.to_string()))])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => {
                *self.last.lock().unwrap() = Some(text.clone());
                Ok(text)
            }
            Some(Err(e)) => Err(e),
            None => match self.last.lock().unwrap().clone() {
                Some(text) => Ok(text),
                None => Err(QueryError::RemoteGeneration("script exhausted".to_string())),
            },
        }
    }
}

/// Answers for the generation prompt with the SQL mapped to the question,
/// and for anything else (explanations) with a fixed text.
pub struct QuestionGenerator {
    answers: HashMap<String, Result<String>>,
}

impl QuestionGenerator {
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
        }
    }

    pub fn answer(mut self, question: &str, sql: &str) -> Self {
        self.answers.insert(question.to_string(), Ok(sql.to_string()));
        self
    }

    pub fn fail_on(mut self, question: &str) -> Self {
        self.answers.insert(
            question.to_string(),
            Err(QueryError::RemoteGeneration("upstream timeout".to_string())),
        );
        self
    }
}

#[async_trait]
impl GenerationClient for QuestionGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let context = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        for (question, answer) in &self.answers {
            if context.ends_with(question.as_str()) {
                return match answer {
                    Ok(sql) => Ok(sql.clone()),
                    Err(_) => Err(QueryError::RemoteGeneration("upstream timeout".to_string())),
                };
            }
        }
        Ok("An explanation.".to_string())
    }
}

/// Rows or an error per exact SQL text; unknown SQL fails like Postgres
/// would for a missing relation.
pub struct StubProbe {
    responses: HashMap<String, std::result::Result<RowSet, ExecutionError>>,
    plan: Option<serde_json::Value>,
    runs: Mutex<Vec<String>>,
}

impl StubProbe {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            plan: None,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn rows(mut self, sql: &str, rows: RowSet) -> Self {
        self.responses.insert(sql.to_string(), Ok(rows));
        self
    }

    pub fn error(mut self, sql: &str, message: &str) -> Self {
        self.responses
            .insert(sql.to_string(), Err(ExecutionError::new(message)));
        self
    }

    pub fn with_plan(mut self, plan: serde_json::Value) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionProbe for StubProbe {
    async fn run(&self, sql: &str) -> std::result::Result<RowSet, ExecutionError> {
        self.runs.lock().unwrap().push(sql.to_string());
        match self.responses.get(sql) {
            Some(response) => response.clone(),
            None => Err(ExecutionError::new(format!(
                "syntax error at or near \"{}\"",
                sql
            ))),
        }
    }

    async fn explain(&self, _sql: &str) -> std::result::Result<serde_json::Value, ExecutionError> {
        self.plan
            .clone()
            .ok_or_else(|| ExecutionError::new("EXPLAIN failed"))
    }
}
