//! Catalog introspection into a structured [`SchemaDescriptor`].

use crate::schema::SchemaDescriptor;
use sqlx::{PgPool, Row};

const COLUMNS_QUERY: &str = r#"
    SELECT table_name::text, column_name::text, data_type::text
    FROM information_schema.columns
    WHERE table_schema = 'public'
    ORDER BY table_name, ordinal_position
"#;

/// Describe every column of every table in the `public` schema.
pub async fn load_schema(pool: &PgPool) -> Result<SchemaDescriptor, sqlx::Error> {
    let rows = sqlx::query(COLUMNS_QUERY).fetch_all(pool).await?;

    let mut schema = SchemaDescriptor::new();
    for row in rows {
        let table: String = row.try_get(0)?;
        let column: String = row.try_get(1)?;
        let data_type: String = row.try_get(2)?;
        schema.push_column(&table, &column, &data_type);
    }
    Ok(schema)
}
