//! Execution Loop
//!
//! Bounded generate/validate/execute retry loop with error feedback.

pub mod controller;
pub mod error_classifier;

pub use controller::{GenerationAttempt, LoopContext, RetryController, RetryOutcome};
pub use error_classifier::{ErrorClassifier, SqlErrorClass};
