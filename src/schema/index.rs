//! Known table identifiers and the whole-token membership test.

use crate::schema::descriptor::SchemaDescriptor;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use tracing::warn;

// regex's own default compiled-size limit.
const MATCHER_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Table identifiers derived once from a [`SchemaDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct KnownTableSet {
    tables: BTreeSet<String>,
    // One alternation over every identifier. `None` when the set is empty or
    // the alternation is too large to compile; `contains` then scans tokens.
    matcher: Option<Regex>,
}

impl KnownTableSet {
    pub fn build(descriptor: &SchemaDescriptor) -> Self {
        Self::from_names(descriptor.table_names())
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_size_limit(names, MATCHER_SIZE_LIMIT)
    }

    pub(crate) fn with_size_limit<I, S>(names: I, size_limit: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tables: BTreeSet<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        let matcher = if tables.is_empty() {
            None
        } else {
            let alternation = tables
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            match RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
                .case_insensitive(true)
                .size_limit(size_limit)
                .build()
            {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(
                        "Table matcher for {} tables did not compile ({}); using token scan",
                        tables.len(),
                        e
                    );
                    None
                }
            }
        };

        Self { tables, matcher }
    }

    /// True iff any known identifier occurs in `sql` as a whole token,
    /// ignoring case. `orders` does not match inside `orders_archive`.
    pub fn contains(&self, sql: &str) -> bool {
        match &self.matcher {
            Some(re) => re.is_match(sql),
            None => self.scan(sql),
        }
    }

    // Same whole-token, case-insensitive semantics without the regex.
    fn scan(&self, sql: &str) -> bool {
        let haystack = sql.to_lowercase();
        self.tables.iter().any(|table| {
            let needle = table.to_lowercase();
            haystack.match_indices(needle.as_str()).any(|(start, _)| {
                let end = start + needle.len();
                let before = haystack[..start].chars().next_back();
                let after = haystack[end..].chars().next();
                !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
            })
        })
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
