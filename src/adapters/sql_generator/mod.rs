// SQL generation
//
// Per-dialect DDL/DML generation for materialized tables. Identifiers are
// validated by the generator contract and quoted here; data values are
// always bound as parameters by the calling service.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use crate::adapters::sql_quote::quote_identifier;
use crate::core::config::Dialect;
use crate::core::table_spec::{ColumnSpec, ColumnType, TableSpec, IDENTITY_COLUMN};

pub use mysql::MysqlSqlGenerator;
pub use postgres::PostgresSqlGenerator;
pub use sqlite::SqliteSqlGenerator;

/// Dialect-specific SQL generation
pub trait SqlGenerator: Send + Sync {
    /// The dialect this generator targets
    fn dialect(&self) -> Dialect;

    /// Positional parameter placeholder (1-based index)
    fn placeholder(&self, index: usize) -> String {
        let _ = index;
        "?".to_string()
    }

    /// CREATE TABLE for a full table spec, including the primary key and,
    /// for sub-form tables, the cascade-delete parent foreign key
    fn create_table(&self, spec: &TableSpec) -> String {
        let dialect = self.dialect();
        let mut elements: Vec<String> = spec
            .all_columns()
            .iter()
            .map(|column| format!("    {}", column_definition(dialect, column)))
            .collect();

        elements.push(format!(
            "    PRIMARY KEY ({})",
            quote_identifier(dialect, IDENTITY_COLUMN)
        ));

        if let Some(link) = &spec.parent_link {
            elements.push(format!(
                "    FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                quote_identifier(dialect, &link.column),
                quote_identifier(dialect, &link.parent_table),
                quote_identifier(dialect, IDENTITY_COLUMN)
            ));
        }

        format!(
            "CREATE TABLE {} (\n{}\n)",
            quote_identifier(dialect, &spec.name),
            elements.join(",\n")
        )
    }

    /// DROP TABLE
    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", quote_identifier(self.dialect(), table))
    }

    /// ALTER TABLE ... ADD COLUMN
    fn add_column(&self, table: &str, column: &ColumnSpec) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_identifier(self.dialect(), table),
            column_definition(self.dialect(), column)
        )
    }

    /// ALTER TABLE ... DROP COLUMN
    fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_identifier(self.dialect(), table),
            quote_identifier(self.dialect(), column)
        )
    }

    /// ALTER TABLE ... RENAME COLUMN
    fn rename_column(&self, table: &str, old: &str, new: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            quote_identifier(self.dialect(), table),
            quote_identifier(self.dialect(), old),
            quote_identifier(self.dialect(), new)
        )
    }

    /// Statements changing a column's type in place
    fn change_column_type(
        &self,
        table: &str,
        before: &ColumnSpec,
        after: &ColumnSpec,
    ) -> Vec<String>;

    /// SELECT capturing {row id, value-as-text} for every row of a column
    fn snapshot_select(&self, table: &str, column: &str) -> String {
        let dialect = self.dialect();
        format!(
            "SELECT {}, CAST({} AS TEXT) FROM {}",
            quote_identifier(dialect, IDENTITY_COLUMN),
            quote_identifier(dialect, column),
            quote_identifier(dialect, table)
        )
    }

    /// Expression casting the bound parameter at `index` to a column type
    fn cast_expression(&self, index: usize, column_type: &ColumnType) -> String {
        format!(
            "CAST({} AS {})",
            self.placeholder(index),
            column_type.to_sql_type(self.dialect())
        )
    }

    /// UPDATE writing one captured value back, cast to the recorded type;
    /// binds (value, row id)
    fn restore_update(&self, table: &str, column: &str, column_type: &ColumnType) -> String {
        let dialect = self.dialect();
        format!(
            "UPDATE {} SET {} = {} WHERE {} = {}",
            quote_identifier(dialect, table),
            quote_identifier(dialect, column),
            self.cast_expression(1, column_type),
            quote_identifier(dialect, IDENTITY_COLUMN),
            self.placeholder(2)
        )
    }

    /// Probe for a table's existence; binds (table name)
    fn table_exists_query(&self) -> String {
        format!(
            "SELECT table_name FROM information_schema.tables WHERE table_name = {}",
            self.placeholder(1)
        )
    }

    /// List table names matching a LIKE pattern; binds (pattern)
    fn list_tables_query(&self) -> String {
        format!(
            "SELECT table_name FROM information_schema.tables WHERE table_name LIKE {}",
            self.placeholder(1)
        )
    }
}

/// Render one column definition
fn column_definition(dialect: Dialect, column: &ColumnSpec) -> String {
    let mut parts = vec![
        quote_identifier(dialect, &column.name),
        column.column_type.to_sql_type(dialect),
    ];

    if !column.nullable {
        parts.push("NOT NULL".to_string());
    }

    if let Some(default_value) = &column.default_value {
        parts.push(format!("DEFAULT {}", default_value));
    }

    parts.join(" ")
}

/// Generator for the given dialect
pub fn generator_for(dialect: Dialect) -> Box<dyn SqlGenerator> {
    match dialect {
        Dialect::PostgreSQL => Box::new(PostgresSqlGenerator::new()),
        Dialect::MySQL => Box::new(MysqlSqlGenerator::new()),
        Dialect::SQLite => Box::new(SqliteSqlGenerator::new()),
    }
}
