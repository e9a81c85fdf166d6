use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

/// Ordered table -> columns mapping produced by catalog introspection.
///
/// Table order is the order the producer emitted; it is preserved when
/// rendering so prompts stay deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub tables: Vec<TableSchema>,
}

impl SchemaDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, creating its table on first sight.
    ///
    /// Rows for one table need not be contiguous; the table keeps the
    /// position of its first column.
    pub fn push_column(&mut self, table: &str, column: &str, data_type: &str) {
        let column = ColumnSchema {
            name: column.to_string(),
            data_type: data_type.to_string(),
        };
        match self.tables.iter_mut().find(|t| t.name == table) {
            Some(existing) => existing.columns.push(column),
            None => self.tables.push(TableSchema {
                name: table.to_string(),
                columns: vec![column],
            }),
        }
    }

    pub fn with_table(mut self, table: &str, columns: &[(&str, &str)]) -> Self {
        for (name, data_type) in columns {
            self.push_column(table, name, data_type);
        }
        if columns.is_empty() && !self.tables.iter().any(|t| t.name == table) {
            self.tables.push(TableSchema {
                name: table.to_string(),
                columns: Vec::new(),
            });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Plain-text block used as prompt context:
    ///
    /// ```text
    /// Table orders:
    /// id integer
    /// total numeric
    ///
    /// Table customers:
    /// ...
    /// ```
    pub fn render(&self) -> String {
        self.tables
            .iter()
            .map(|table| {
                let mut block = format!("Table {}:", table.name);
                for column in &table.columns {
                    block.push('\n');
                    block.push_str(&column.name);
                    block.push(' ');
                    block.push_str(&column.data_type);
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
