// SQLite SQL generation
//
// SQLite has no ALTER COLUMN, so a type change is rewritten as an
// add-copy-drop-rename sequence using a temporary column. The catalog
// queries go through sqlite_master instead of information_schema.

use crate::adapters::sql_generator::SqlGenerator;
use crate::adapters::sql_quote::quote_identifier;
use crate::core::config::Dialect;
use crate::core::table_spec::ColumnSpec;

/// SQLite dialect generator
#[derive(Debug, Default)]
pub struct SqliteSqlGenerator;

impl SqliteSqlGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for SqliteSqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    /// Emulated via a temporary column: add, copy with cast, drop the
    /// original, rename back
    fn change_column_type(
        &self,
        table: &str,
        before: &ColumnSpec,
        after: &ColumnSpec,
    ) -> Vec<String> {
        let dialect = self.dialect();
        let table_q = quote_identifier(dialect, table);
        let column_q = quote_identifier(dialect, &before.name);
        let tmp_name = format!("{}__tmp", before.name);
        let tmp_q = quote_identifier(dialect, &tmp_name);
        let sql_type = after.column_type.to_sql_type(dialect);

        vec![
            format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                table_q, tmp_q, sql_type
            ),
            format!(
                "UPDATE {} SET {} = CAST({} AS {})",
                table_q, tmp_q, column_q, sql_type
            ),
            format!("ALTER TABLE {} DROP COLUMN {}", table_q, column_q),
            format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                table_q, tmp_q, column_q
            ),
        ]
    }

    fn table_exists_query(&self) -> String {
        format!(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = {}",
            self.placeholder(1)
        )
    }

    fn list_tables_query(&self) -> String {
        format!(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE {}",
            self.placeholder(1)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table_spec::{ColumnType, TableSpec};

    #[test]
    fn test_create_table_renders_affinity_types() {
        let generator = SqliteSqlGenerator::new();
        let spec = TableSpec::new(
            "form_event",
            vec![ColumnSpec::new("held_on", ColumnType::DATE)],
        );

        let sql = generator.create_table(&spec);
        assert!(sql.contains("\"held_on\" TEXT"));
        assert!(sql.contains("\"submitted_at\" TEXT"));
        assert!(sql.contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn test_change_column_type_emulation_sequence() {
        let generator = SqliteSqlGenerator::new();
        let before = ColumnSpec::new("age", ColumnType::VARCHAR { length: 255 });
        let after = ColumnSpec::new("age", ColumnType::INTEGER);

        let statements = generator.change_column_type("form_t", &before, &after);
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE \"form_t\" ADD COLUMN \"age__tmp\" INTEGER",
                "UPDATE \"form_t\" SET \"age__tmp\" = CAST(\"age\" AS INTEGER)",
                "ALTER TABLE \"form_t\" DROP COLUMN \"age\"",
                "ALTER TABLE \"form_t\" RENAME COLUMN \"age__tmp\" TO \"age\"",
            ]
        );
    }

    #[test]
    fn test_catalog_queries_use_sqlite_master() {
        let generator = SqliteSqlGenerator::new();
        assert!(generator.table_exists_query().contains("sqlite_master"));
        assert!(generator.list_tables_query().contains("LIKE ?"));
    }
}
