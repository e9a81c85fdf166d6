//! Schema grounding
//!
//! The structured descriptor handed to the core by the catalog step, and the
//! set of known table identifiers derived from it.

pub mod descriptor;
pub mod index;

pub use descriptor::{ColumnSchema, SchemaDescriptor, TableSchema};
pub use index::KnownTableSet;

/// A descriptor together with the table set derived from it.
///
/// The set is computed once here; a changed descriptor means a new context.
#[derive(Debug, Clone)]
pub struct SchemaContext {
    descriptor: SchemaDescriptor,
    known_tables: KnownTableSet,
}

impl SchemaContext {
    pub fn new(descriptor: SchemaDescriptor) -> Self {
        let known_tables = KnownTableSet::build(&descriptor);
        Self {
            descriptor,
            known_tables,
        }
    }

    pub fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }

    pub fn known_tables(&self) -> &KnownTableSet {
        &self.known_tables
    }
}
