// SQL identifier quoting
//
// Identifier quoting per dialect, plus the strict shape check that backs
// the engine's identifier whitelist: generated names are validated here
// before they are ever interpolated into DDL, and data values are always
// bound as parameters, never interpolated.

use regex::Regex;
use std::sync::OnceLock;

use crate::core::config::Dialect;

static IDENTIFIER_SHAPE: OnceLock<Regex> = OnceLock::new();

/// Whether a name matches the shape the identifier generator emits:
/// lowercase ASCII, starts with a letter or underscore, at most 63 bytes
pub fn is_safe_identifier(name: &str) -> bool {
    let shape = IDENTIFIER_SHAPE
        .get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("identifier regex"));
    shape.is_match(name)
}

/// Quote an identifier for the given dialect, escaping embedded quotes
pub fn quote_identifier(dialect: Dialect, name: &str) -> String {
    match dialect {
        Dialect::PostgreSQL | Dialect::SQLite => {
            format!("\"{}\"", name.replace('"', "\"\""))
        }
        Dialect::MySQL => format!("`{}`", name.replace('`', "``")),
    }
}

/// Quote a list of column names and join with commas
pub fn quote_columns(dialect: Dialect, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(dialect, c))
        .collect::<Vec<_>>()
        .join(", ")
}
