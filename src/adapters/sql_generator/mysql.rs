// MySQL SQL generation
//
// MySQL caveats handled here: type changes go through MODIFY COLUMN, and
// CAST accepts its own set of target type names (SIGNED instead of BIGINT,
// CHAR instead of VARCHAR/TEXT, DATETIME instead of TIMESTAMP).

use crate::adapters::sql_generator::SqlGenerator;
use crate::adapters::sql_quote::quote_identifier;
use crate::core::config::Dialect;
use crate::core::table_spec::{ColumnSpec, ColumnType, IDENTITY_COLUMN};

/// MySQL dialect generator
#[derive(Debug, Default)]
pub struct MysqlSqlGenerator;

impl MysqlSqlGenerator {
    pub fn new() -> Self {
        Self
    }

    /// CAST target type name, which differs from the DDL type name
    fn cast_type(column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::VARCHAR { .. } | ColumnType::TEXT => "CHAR".to_string(),
            ColumnType::INTEGER | ColumnType::BOOLEAN => "SIGNED".to_string(),
            ColumnType::DECIMAL { precision, scale } => {
                format!("DECIMAL({}, {})", precision, scale)
            }
            ColumnType::DOUBLE => "DOUBLE".to_string(),
            ColumnType::DATE => "DATE".to_string(),
            ColumnType::TIME => "TIME".to_string(),
            ColumnType::TIMESTAMP => "DATETIME".to_string(),
        }
    }
}

impl SqlGenerator for MysqlSqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::MySQL
    }

    fn change_column_type(
        &self,
        table: &str,
        _before: &ColumnSpec,
        after: &ColumnSpec,
    ) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {} {} NULL",
            quote_identifier(self.dialect(), table),
            quote_identifier(self.dialect(), &after.name),
            after.column_type.to_sql_type(self.dialect())
        )]
    }

    fn snapshot_select(&self, table: &str, column: &str) -> String {
        format!(
            "SELECT {}, CAST({} AS CHAR) FROM {}",
            quote_identifier(self.dialect(), IDENTITY_COLUMN),
            quote_identifier(self.dialect(), column),
            quote_identifier(self.dialect(), table)
        )
    }

    fn cast_expression(&self, index: usize, column_type: &ColumnType) -> String {
        format!(
            "CAST({} AS {})",
            self.placeholder(index),
            Self::cast_type(column_type)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table_spec::TableSpec;

    #[test]
    fn test_create_table_uses_backticks() {
        let generator = MysqlSqlGenerator::new();
        let spec = TableSpec::new(
            "form_survey",
            vec![ColumnSpec::new("score", ColumnType::INTEGER)],
        );

        let sql = generator.create_table(&spec);
        assert!(sql.starts_with("CREATE TABLE `form_survey`"));
        assert!(sql.contains("`score` BIGINT"));
        assert!(sql.contains("`submitted_at` DATETIME"));
        assert!(sql.contains("PRIMARY KEY (`id`)"));
    }

    #[test]
    fn test_change_column_type_uses_modify() {
        let generator = MysqlSqlGenerator::new();
        let before = ColumnSpec::new("note", ColumnType::VARCHAR { length: 255 });
        let after = ColumnSpec::new("note", ColumnType::TEXT);

        let statements = generator.change_column_type("form_t", &before, &after);
        assert_eq!(
            statements,
            vec!["ALTER TABLE `form_t` MODIFY COLUMN `note` TEXT NULL"]
        );
    }

    #[test]
    fn test_snapshot_casts_to_char() {
        let generator = MysqlSqlGenerator::new();
        assert_eq!(
            generator.snapshot_select("form_t", "amount"),
            "SELECT `id`, CAST(`amount` AS CHAR) FROM `form_t`"
        );
    }

    #[test]
    fn test_restore_cast_targets() {
        let generator = MysqlSqlGenerator::new();

        let sql = generator.restore_update("form_t", "count", &ColumnType::INTEGER);
        assert!(sql.contains("CAST(? AS SIGNED)"));

        let sql = generator.restore_update("form_t", "when", &ColumnType::TIMESTAMP);
        assert!(sql.contains("CAST(? AS DATETIME)"));
    }
}
