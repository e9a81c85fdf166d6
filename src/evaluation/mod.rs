//! Evaluation harness
//!
//! Scores generated queries against labeled references by lexical
//! similarity (BLEU) and by execution equivalence.

pub mod bleu;
pub mod harness;

pub use bleu::sentence_bleu;
pub use harness::{
    execution_match, load_cases, write_results, EvaluationCase, EvaluationHarness,
    EvaluationResult, EvaluationSummary,
};
