//! Validation gate
//!
//! Stateless grounding check run on every candidate before it reaches the
//! database. A rejection ends the retry loop: a query that names no known
//! table is treated as a hallucination, not as something the error feedback
//! loop can repair.

use crate::schema::KnownTableSet;

/// Message reported to callers when the gate rejects a candidate.
pub const NO_KNOWN_TABLE: &str = "No known table was referenced in the generated query.";

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationGate;

impl ValidationGate {
    /// Does `candidate_sql` reference at least one known table?
    pub fn accepts(candidate_sql: &str, known_tables: &KnownTableSet) -> bool {
        known_tables.contains(candidate_sql)
    }
}
