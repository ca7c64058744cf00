// Concrete table model
//
// The SQL-level shape of a materialized table: concrete column types,
// column specs, and the full table spec with identity, bookkeeping and
// parent-link columns.

use serde::{Deserialize, Serialize};

use crate::core::config::Dialect;

/// Identity column shared between the submission ledger and the table
pub const IDENTITY_COLUMN: &str = "id";

/// Bookkeeping column: submitter reference
pub const SUBMITTED_BY_COLUMN: &str = "submitted_by";

/// Bookkeeping column: submission time
pub const SUBMITTED_AT_COLUMN: &str = "submitted_at";

/// Bookkeeping column: lifecycle status
pub const STATUS_COLUMN: &str = "status";

/// Parent-link column on sub-form tables
pub const PARENT_LINK_COLUMN: &str = "parent_id";

/// Column names a generated field column may never use
pub const RESERVED_COLUMNS: [&str; 5] = [
    IDENTITY_COLUMN,
    SUBMITTED_BY_COLUMN,
    SUBMITTED_AT_COLUMN,
    STATUS_COLUMN,
    PARENT_LINK_COLUMN,
];

/// Concrete column type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ColumnType {
    /// Bounded text
    VARCHAR {
        /// Maximum length
        length: u32,
    },

    /// Unbounded text
    TEXT,

    /// 64-bit integer
    INTEGER,

    /// Fixed-point number
    DECIMAL {
        /// Total digits
        precision: u32,
        /// Digits after the decimal point
        scale: u32,
    },

    /// Double-precision float
    DOUBLE,

    /// Boolean flag
    BOOLEAN,

    /// Calendar date
    DATE,

    /// Time of day
    TIME,

    /// Date and time
    TIMESTAMP,
}

impl ColumnType {
    /// SQL type name for the given dialect
    pub fn to_sql_type(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (ColumnType::VARCHAR { length }, _) => format!("VARCHAR({})", length),

            (ColumnType::TEXT, _) => "TEXT".to_string(),

            (ColumnType::INTEGER, Dialect::PostgreSQL) => "BIGINT".to_string(),
            (ColumnType::INTEGER, Dialect::MySQL) => "BIGINT".to_string(),
            (ColumnType::INTEGER, Dialect::SQLite) => "INTEGER".to_string(),

            (ColumnType::DECIMAL { precision, scale }, Dialect::PostgreSQL) => {
                format!("NUMERIC({}, {})", precision, scale)
            }
            (ColumnType::DECIMAL { precision, scale }, Dialect::MySQL) => {
                format!("DECIMAL({}, {})", precision, scale)
            }
            (ColumnType::DECIMAL { .. }, Dialect::SQLite) => "NUMERIC".to_string(),

            (ColumnType::DOUBLE, Dialect::PostgreSQL) => "DOUBLE PRECISION".to_string(),
            (ColumnType::DOUBLE, Dialect::MySQL) => "DOUBLE".to_string(),
            (ColumnType::DOUBLE, Dialect::SQLite) => "REAL".to_string(),

            (ColumnType::BOOLEAN, Dialect::PostgreSQL) => "BOOLEAN".to_string(),
            (ColumnType::BOOLEAN, Dialect::MySQL) => "TINYINT(1)".to_string(),
            (ColumnType::BOOLEAN, Dialect::SQLite) => "INTEGER".to_string(),

            (ColumnType::DATE, Dialect::SQLite) => "TEXT".to_string(),
            (ColumnType::DATE, _) => "DATE".to_string(),

            (ColumnType::TIME, Dialect::SQLite) => "TEXT".to_string(),
            (ColumnType::TIME, _) => "TIME".to_string(),

            (ColumnType::TIMESTAMP, Dialect::PostgreSQL) => "TIMESTAMP".to_string(),
            (ColumnType::TIMESTAMP, Dialect::MySQL) => "DATETIME".to_string(),
            (ColumnType::TIMESTAMP, Dialect::SQLite) => "TEXT".to_string(),
        }
    }

    /// Whether every value of `self` survives a conversion to `new` unchanged
    ///
    /// The matrix is deliberately conservative: a change classified as lossy
    /// forces a backup snapshot before the migration runs.
    pub fn is_lossless_change_to(&self, new: &ColumnType) -> bool {
        match (self, new) {
            // Anything renders to unbounded text.
            (_, ColumnType::TEXT) => true,

            // Bounded text must not shrink; non-text values render within
            // 32 characters for every supported type.
            (ColumnType::VARCHAR { length: old }, ColumnType::VARCHAR { length: new }) => {
                new >= old
            }
            (ColumnType::TEXT, ColumnType::VARCHAR { .. }) => false,
            (_, ColumnType::VARCHAR { length }) => *length >= 32,

            (ColumnType::INTEGER, ColumnType::INTEGER) => true,
            (ColumnType::BOOLEAN, ColumnType::INTEGER) => true,
            (_, ColumnType::INTEGER) => false,

            // i64 needs up to 19 integral digits.
            (ColumnType::INTEGER, ColumnType::DECIMAL { precision, scale }) => {
                precision.saturating_sub(*scale) >= 19
            }
            (
                ColumnType::DECIMAL {
                    precision: old_p,
                    scale: old_s,
                },
                ColumnType::DECIMAL {
                    precision: new_p,
                    scale: new_s,
                },
            ) => new_s >= old_s && new_p.saturating_sub(*new_s) >= old_p.saturating_sub(*old_s),
            (_, ColumnType::DECIMAL { .. }) => false,

            (ColumnType::DOUBLE, ColumnType::DOUBLE) => true,
            (_, ColumnType::DOUBLE) => false,

            (ColumnType::BOOLEAN, ColumnType::BOOLEAN) => true,
            (_, ColumnType::BOOLEAN) => false,

            (ColumnType::DATE, ColumnType::DATE) => true,
            (_, ColumnType::DATE) => false,

            (ColumnType::TIME, ColumnType::TIME) => true,
            (_, ColumnType::TIME) => false,

            (ColumnType::TIMESTAMP, ColumnType::TIMESTAMP) => true,
            (ColumnType::DATE, ColumnType::TIMESTAMP) => true,
            (_, ColumnType::TIMESTAMP) => false,
        }
    }
}

/// Column specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,

    /// Concrete type
    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// NULL permitted; field columns are always nullable because
    /// "required" is an application-level concern
    pub nullable: bool,

    /// Default value expression
    pub default_value: Option<String>,
}

impl ColumnSpec {
    /// Create a nullable column with no default
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default_value: None,
        }
    }

    /// Create a non-nullable column
    pub fn not_null(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            default_value: None,
        }
    }
}

/// Parent link on a sub-form table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentLink {
    /// Linking column on the child table
    pub column: String,

    /// Parent materialized table
    pub parent_table: String,
}

/// Full specification of a materialized table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name
    pub name: String,

    /// Field-derived data columns, in display order
    pub data_columns: Vec<ColumnSpec>,

    /// Parent link, present only on sub-form tables
    pub parent_link: Option<ParentLink>,
}

impl TableSpec {
    /// Create a main-form table spec
    pub fn new(name: impl Into<String>, data_columns: Vec<ColumnSpec>) -> Self {
        Self {
            name: name.into(),
            data_columns,
            parent_link: None,
        }
    }

    /// Create a sub-form table spec linked to its parent table
    pub fn with_parent(
        name: impl Into<String>,
        data_columns: Vec<ColumnSpec>,
        parent_table: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_columns,
            parent_link: Some(ParentLink {
                column: PARENT_LINK_COLUMN.to_string(),
                parent_table: parent_table.into(),
            }),
        }
    }

    /// Identity column spec (uuid stored as text, primary key)
    pub fn identity_column() -> ColumnSpec {
        ColumnSpec::not_null(IDENTITY_COLUMN, ColumnType::VARCHAR { length: 36 })
    }

    /// Fixed bookkeeping columns appended after the data columns
    pub fn bookkeeping_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new(SUBMITTED_BY_COLUMN, ColumnType::VARCHAR { length: 255 }),
            ColumnSpec::new(SUBMITTED_AT_COLUMN, ColumnType::TIMESTAMP),
            ColumnSpec::new(STATUS_COLUMN, ColumnType::VARCHAR { length: 16 }),
        ]
    }

    /// Every column in table order: identity, parent link (sub-forms),
    /// data columns, bookkeeping
    pub fn all_columns(&self) -> Vec<ColumnSpec> {
        let mut columns = vec![Self::identity_column()];
        if let Some(link) = &self.parent_link {
            columns.push(ColumnSpec::new(
                link.column.clone(),
                ColumnType::VARCHAR { length: 36 },
            ));
        }
        columns.extend(self.data_columns.iter().cloned());
        columns.extend(Self::bookkeeping_columns());
        columns
    }

    /// Total column count
    pub fn column_count(&self) -> usize {
        self.all_columns().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_sql_rendering() {
        let varchar = ColumnType::VARCHAR { length: 255 };
        assert_eq!(varchar.to_sql_type(Dialect::PostgreSQL), "VARCHAR(255)");
        assert_eq!(varchar.to_sql_type(Dialect::MySQL), "VARCHAR(255)");
        assert_eq!(varchar.to_sql_type(Dialect::SQLite), "VARCHAR(255)");

        let decimal = ColumnType::DECIMAL {
            precision: 18,
            scale: 4,
        };
        assert_eq!(decimal.to_sql_type(Dialect::PostgreSQL), "NUMERIC(18, 4)");
        assert_eq!(decimal.to_sql_type(Dialect::MySQL), "DECIMAL(18, 4)");
        assert_eq!(decimal.to_sql_type(Dialect::SQLite), "NUMERIC");

        assert_eq!(
            ColumnType::TIMESTAMP.to_sql_type(Dialect::MySQL),
            "DATETIME"
        );
        assert_eq!(ColumnType::TIMESTAMP.to_sql_type(Dialect::SQLite), "TEXT");
    }

    #[test]
    fn test_lossless_matrix_text_directions() {
        let numeric = ColumnType::DECIMAL {
            precision: 18,
            scale: 4,
        };

        // Numeric to text is safe; text to numeric is not.
        assert!(numeric.is_lossless_change_to(&ColumnType::TEXT));
        assert!(!ColumnType::TEXT.is_lossless_change_to(&numeric));
        assert!(!ColumnType::TEXT.is_lossless_change_to(&ColumnType::INTEGER));
    }

    #[test]
    fn test_lossless_matrix_varchar_widths() {
        let narrow = ColumnType::VARCHAR { length: 32 };
        let wide = ColumnType::VARCHAR { length: 255 };

        assert!(narrow.is_lossless_change_to(&wide));
        assert!(!wide.is_lossless_change_to(&narrow));
        assert!(ColumnType::INTEGER.is_lossless_change_to(&wide));
        assert!(!ColumnType::INTEGER.is_lossless_change_to(&ColumnType::VARCHAR { length: 8 }));
    }

    #[test]
    fn test_lossless_matrix_dates() {
        assert!(ColumnType::DATE.is_lossless_change_to(&ColumnType::TIMESTAMP));
        assert!(!ColumnType::TIMESTAMP.is_lossless_change_to(&ColumnType::DATE));
    }

    #[test]
    fn test_lossless_matrix_decimal_widening() {
        let narrow = ColumnType::DECIMAL {
            precision: 10,
            scale: 2,
        };
        let wide = ColumnType::DECIMAL {
            precision: 20,
            scale: 4,
        };

        assert!(narrow.is_lossless_change_to(&wide));
        assert!(!wide.is_lossless_change_to(&narrow));
        assert!(ColumnType::INTEGER.is_lossless_change_to(&ColumnType::DECIMAL {
            precision: 24,
            scale: 4,
        }));
        assert!(!ColumnType::INTEGER.is_lossless_change_to(&ColumnType::DECIMAL {
            precision: 18,
            scale: 4,
        }));
    }

    #[test]
    fn test_table_spec_column_layout() {
        let spec = TableSpec::new(
            "form_customer_intake",
            vec![
                ColumnSpec::new("name", ColumnType::VARCHAR { length: 255 }),
                ColumnSpec::new("email", ColumnType::VARCHAR { length: 255 }),
            ],
        );

        let columns = spec.all_columns();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["id", "name", "email", "submitted_by", "submitted_at", "status"]
        );
        // N data columns + identity + 3 bookkeeping columns
        assert_eq!(spec.column_count(), 2 + 1 + 3);
    }

    #[test]
    fn test_sub_form_spec_has_parent_link_after_identity() {
        let spec = TableSpec::with_parent(
            "form_line_items",
            vec![ColumnSpec::new("item", ColumnType::VARCHAR { length: 255 })],
            "form_purchase_order",
        );

        let columns = spec.all_columns();
        assert_eq!(columns[0].name, "id");
        assert_eq!(columns[1].name, "parent_id");
        assert_eq!(spec.column_count(), 1 + 1 + 1 + 3);
    }
}
