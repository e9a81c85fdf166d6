//! Error Classifier
//!
//! Tags Postgres execution errors with a coarse class for structured logs and
//! reflexion records. The class never replaces the error text that is fed
//! back into the prompt.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlErrorClass {
    /// Candidate did not reference any known table (validation gate)
    Ungrounded,
    UndefinedTable,
    UndefinedColumn,
    AmbiguousColumn,
    SyntaxError,
    TypeMismatch,
    GroupingError,
    Other,
}

impl fmt::Display for SqlErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlErrorClass::Ungrounded => "Ungrounded",
            SqlErrorClass::UndefinedTable => "UndefinedTable",
            SqlErrorClass::UndefinedColumn => "UndefinedColumn",
            SqlErrorClass::AmbiguousColumn => "AmbiguousColumn",
            SqlErrorClass::SyntaxError => "SyntaxError",
            SqlErrorClass::TypeMismatch => "TypeMismatch",
            SqlErrorClass::GroupingError => "GroupingError",
            SqlErrorClass::Other => "Other",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify database error text by pattern.
    pub fn classify(&self, error_text: &str) -> SqlErrorClass {
        let error_msg = error_text.to_lowercase();

        if error_msg.contains("column") && error_msg.contains("is ambiguous") {
            return SqlErrorClass::AmbiguousColumn;
        }

        if error_msg.contains("column") && error_msg.contains("does not exist") {
            return SqlErrorClass::UndefinedColumn;
        }

        if (error_msg.contains("relation") || error_msg.contains("table"))
            && error_msg.contains("does not exist")
        {
            return SqlErrorClass::UndefinedTable;
        }

        if error_msg.contains("syntax error") {
            return SqlErrorClass::SyntaxError;
        }

        if error_msg.contains("must appear in the group by clause")
            || error_msg.contains("aggregate functions are not allowed")
        {
            return SqlErrorClass::GroupingError;
        }

        if error_msg.contains("operator does not exist")
            || error_msg.contains("invalid input syntax")
            || error_msg.contains("cannot cast")
            || error_msg.contains("is of type")
        {
            return SqlErrorClass::TypeMismatch;
        }

        SqlErrorClass::Other
    }
}
