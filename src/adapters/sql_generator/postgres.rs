// PostgreSQL SQL generation

use crate::adapters::sql_generator::SqlGenerator;
use crate::adapters::sql_quote::quote_identifier;
use crate::core::config::Dialect;
use crate::core::table_spec::ColumnSpec;

/// PostgreSQL dialect generator
#[derive(Debug, Default)]
pub struct PostgresSqlGenerator;

impl PostgresSqlGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for PostgresSqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSQL
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    /// Single ALTER with a USING cast so existing values are converted
    /// in place
    fn change_column_type(
        &self,
        table: &str,
        _before: &ColumnSpec,
        after: &ColumnSpec,
    ) -> Vec<String> {
        let sql_type = after.column_type.to_sql_type(self.dialect());
        let column = quote_identifier(self.dialect(), &after.name);
        vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING CAST({} AS {})",
            quote_identifier(self.dialect(), table),
            column,
            sql_type,
            column,
            sql_type
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table_spec::{ColumnType, TableSpec};

    #[test]
    fn test_create_table_with_bookkeeping_columns() {
        let generator = PostgresSqlGenerator::new();
        let spec = TableSpec::new(
            "form_customer_intake",
            vec![ColumnSpec::new(
                "full_name",
                ColumnType::VARCHAR { length: 255 },
            )],
        );

        let sql = generator.create_table(&spec);
        assert!(sql.starts_with("CREATE TABLE \"form_customer_intake\""));
        assert!(sql.contains("\"id\" VARCHAR(36) NOT NULL"));
        assert!(sql.contains("\"full_name\" VARCHAR(255)"));
        assert!(sql.contains("\"submitted_at\" TIMESTAMP"));
        assert!(sql.contains("PRIMARY KEY (\"id\")"));
        assert!(!sql.contains("FOREIGN KEY"));
    }

    #[test]
    fn test_create_sub_form_table_cascades() {
        let generator = PostgresSqlGenerator::new();
        let spec = TableSpec::with_parent(
            "form_line_items",
            vec![ColumnSpec::new("item", ColumnType::TEXT)],
            "form_purchase_order",
        );

        let sql = generator.create_table(&spec);
        assert!(sql.contains(
            "FOREIGN KEY (\"parent_id\") REFERENCES \"form_purchase_order\" (\"id\") ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_change_column_type_uses_using_cast() {
        let generator = PostgresSqlGenerator::new();
        let before = ColumnSpec::new("age", ColumnType::VARCHAR { length: 255 });
        let after = ColumnSpec::new("age", ColumnType::INTEGER);

        let statements = generator.change_column_type("form_t", &before, &after);
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0],
            "ALTER TABLE \"form_t\" ALTER COLUMN \"age\" TYPE BIGINT USING CAST(\"age\" AS BIGINT)"
        );
    }

    #[test]
    fn test_numbered_placeholders() {
        let generator = PostgresSqlGenerator::new();
        assert_eq!(generator.placeholder(1), "$1");
        assert_eq!(generator.placeholder(3), "$3");

        let sql = generator.restore_update(
            "form_t",
            "amount",
            &ColumnType::DECIMAL {
                precision: 18,
                scale: 4,
            },
        );
        assert_eq!(
            sql,
            "UPDATE \"form_t\" SET \"amount\" = CAST($1 AS NUMERIC(18, 4)) WHERE \"id\" = $2"
        );
    }
}
