// Table materialization
//
// Turns a form definition into a live SQL table: derives the table name
// and per-field column names, maps field types to concrete columns, and
// creates the table together with its metadata writes in one transaction
// so a failed CREATE TABLE never leaves a form claiming a table that does
// not exist.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::adapters::database::DatabaseHandle;
use crate::adapters::sql_generator::generator_for;
use crate::core::error::{ConflictError, EngineResult, ExecutionError, ValidationError};
use crate::core::field::Field;
use crate::core::form::{Form, SubForm};
use crate::core::table_spec::{ColumnSpec, TableSpec, RESERVED_COLUMNS};
use crate::services::form_store::{begin, commit, FormStore};
use crate::services::identifier::IdentifierGenerator;
use crate::services::type_mapping::TypeMapper;

/// Prefix shared by every materialized table
pub const TABLE_PREFIX: &str = "form_";

/// Materializes form definitions as live tables
#[derive(Debug, Clone)]
pub struct TableMaterializer {
    identifier: IdentifierGenerator,
    mapper: TypeMapper,
    store: FormStore,
}

impl TableMaterializer {
    pub fn new(identifier: IdentifierGenerator) -> Self {
        Self {
            identifier,
            mapper: TypeMapper::new(),
            store: FormStore::new(),
        }
    }

    /// Create the materialized table for a form
    ///
    /// Assigns the table name and any missing column names on the form,
    /// persists the form and field metadata, and returns the table name.
    pub async fn create_table(
        &self,
        db: &DatabaseHandle,
        form: &mut Form,
    ) -> EngineResult<String> {
        let table_name = self.assign_table_name(db, &form.title, form.id).await?;
        self.assign_column_names(&mut form.fields)?;

        let columns = self.data_columns(&form.fields)?;
        let spec = TableSpec::new(table_name.clone(), columns);

        self.store.insert_form(db, form).await?;
        self.create_with_metadata(db, form.id, &form.fields, &spec)
            .await?;
        form.set_table_name(table_name.clone())?;

        info!(table = %table_name, form = %form.title, "materialized form table");
        Ok(table_name)
    }

    /// Create the materialized table for a sub-form, linked to its parent
    /// table with cascade delete
    pub async fn create_sub_form_table(
        &self,
        db: &DatabaseHandle,
        parent_table: &str,
        sub_form: &mut SubForm,
    ) -> EngineResult<String> {
        if !table_exists(db, parent_table).await? {
            return Err(ValidationError::FormNotMaterialized {
                form: parent_table.to_string(),
            }
            .into());
        }

        let table_name = self
            .assign_table_name(db, &sub_form.title, sub_form.id)
            .await?;
        self.assign_column_names(&mut sub_form.fields)?;

        let columns = self.data_columns(&sub_form.fields)?;
        let spec = TableSpec::with_parent(table_name.clone(), columns, parent_table);

        self.store.insert_sub_form(db, sub_form).await?;
        self.create_with_metadata(db, sub_form.id, &sub_form.fields, &spec)
            .await?;
        sub_form.set_table_name(table_name.clone())?;

        info!(table = %table_name, parent = %parent_table, "materialized sub-form table");
        Ok(table_name)
    }

    /// Physical tables with the materialized prefix that no form claims
    ///
    /// Reported only; orphans are never dropped automatically.
    pub async fn find_orphan_tables(
        &self,
        db: &DatabaseHandle,
    ) -> EngineResult<Vec<String>> {
        let claimed: HashSet<String> = self
            .store
            .list_claimed_tables(db)
            .await?
            .into_iter()
            .collect();

        let physical = list_tables_with_prefix(db, TABLE_PREFIX).await?;
        let mut orphans: Vec<String> = physical
            .into_iter()
            .filter(|t| !claimed.contains(t))
            .collect();
        orphans.sort();
        Ok(orphans)
    }

    /// Derive a free table name, suffixing deterministically when another
    /// form claims it
    ///
    /// A physical table nothing claims is never adopted or quietly skipped
    /// over; it belongs to someone else and the caller gets a conflict.
    async fn assign_table_name(
        &self,
        db: &DatabaseHandle,
        title: &str,
        owner: uuid::Uuid,
    ) -> EngineResult<String> {
        let slug = self.identifier.slugify(title, "form");
        let base = truncated_with_prefix(&self.identifier, &slug);

        if !self.store.table_name_taken(db, &base).await? {
            if table_exists(db, &base).await? {
                return Err(ConflictError::TableExists { table: base }.into());
            }
            return Ok(base);
        }

        let suffixed = self.identifier.with_collision_suffix(&base, &owner);
        if self.store.table_name_taken(db, &suffixed).await? {
            return Err(ConflictError::IdentifierCollision {
                identifier: suffixed,
                namespace: "tables".to_string(),
            }
            .into());
        }
        if table_exists(db, &suffixed).await? {
            return Err(ConflictError::TableExists { table: suffixed }.into());
        }

        debug!(base = %base, resolved = %suffixed, "table name collision resolved");
        Ok(suffixed)
    }

    /// Assign column names to fields that do not have one yet
    ///
    /// Names are assigned once and kept forever; fields that already carry
    /// a column name are left untouched even if their title changed.
    fn assign_column_names(&self, fields: &mut [Field]) -> EngineResult<()> {
        let mut used: HashSet<String> = fields
            .iter()
            .filter_map(|f| f.column_name.clone())
            .collect();
        for reserved in RESERVED_COLUMNS {
            used.insert(reserved.to_string());
        }

        for field in fields.iter_mut() {
            if !field.materializes() || field.column_name.is_some() {
                continue;
            }

            let base = self.identifier.slugify(&field.title, "field");
            let name = if used.contains(&base) {
                let suffixed = self.identifier.with_collision_suffix(&base, &field.id);
                if used.contains(&suffixed) {
                    return Err(ConflictError::IdentifierCollision {
                        identifier: suffixed,
                        namespace: "columns".to_string(),
                    }
                    .into());
                }
                suffixed
            } else {
                base
            };

            used.insert(name.clone());
            field.column_name = Some(name);
        }
        Ok(())
    }

    /// Map materializable fields to column specs, in display order
    fn data_columns(&self, fields: &[Field]) -> EngineResult<Vec<ColumnSpec>> {
        let mut ordered: Vec<&Field> = fields.iter().filter(|f| f.materializes()).collect();
        ordered.sort_by_key(|f| f.display_order);

        let mut columns = Vec::with_capacity(ordered.len());
        for field in ordered {
            if let Some(column_type) = self.mapper.column_type(field)? {
                if let Some(name) = field.column_name() {
                    columns.push(ColumnSpec::new(name, column_type));
                }
            }
        }
        Ok(columns)
    }

    /// Run CREATE TABLE, the table-name write and the field inserts in a
    /// single transaction
    async fn create_with_metadata(
        &self,
        db: &DatabaseHandle,
        owner_id: uuid::Uuid,
        fields: &[Field],
        spec: &TableSpec,
    ) -> EngineResult<()> {
        let generator = generator_for(db.dialect());
        let ddl = generator.create_table(spec);

        let mut tx = begin(db).await?;

        sqlx::query(&ddl)
            .execute(&mut *tx)
            .await
            .map_err(|e| ExecutionError::Ddl {
                table: spec.name.clone(),
                sql: ddl.clone(),
                cause: e.to_string(),
            })?;

        self.store
            .set_table_name_tx(db, &mut tx, owner_id, &spec.name)
            .await?;

        for field in fields {
            let materialized = field.materializes() && field.column_name.is_some();
            self.store
                .insert_field_tx(db, &mut tx, owner_id, field, materialized)
                .await?;
        }

        commit(tx).await?;
        Ok(())
    }
}

/// Whether a physical table with this name exists
pub async fn table_exists(db: &DatabaseHandle, table: &str) -> Result<bool, ExecutionError> {
    let generator = generator_for(db.dialect());
    let sql = generator.table_exists_query();
    let rows = sqlx::query(&sql)
        .bind(table)
        .fetch_all(db.pool())
        .await
        .map_err(|e| ExecutionError::Query {
            message: format!("Failed to check table existence: {}", e),
            sql: Some(sql.clone()),
        })?;
    Ok(!rows.is_empty())
}

/// Physical table names starting with the given prefix
pub async fn list_tables_with_prefix(
    db: &DatabaseHandle,
    prefix: &str,
) -> Result<Vec<String>, ExecutionError> {
    use sqlx::Row;

    let generator = generator_for(db.dialect());
    let sql = generator.list_tables_query();
    let pattern = format!("{}%", prefix);
    let rows = sqlx::query(&sql)
        .bind(pattern)
        .fetch_all(db.pool())
        .await
        .map_err(|e| ExecutionError::Query {
            message: format!("Failed to list tables: {}", e),
            sql: Some(sql.clone()),
        })?;

    let mut tables = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get(0).map_err(|e| ExecutionError::Query {
            message: format!("Failed to decode table name: {}", e),
            sql: Some(sql.clone()),
        })?;
        tables.push(name);
    }
    Ok(tables)
}

/// Prefix a slug with the shared table prefix, re-truncating to the limit
fn truncated_with_prefix(identifier: &IdentifierGenerator, slug: &str) -> String {
    let budget = identifier.max_length().saturating_sub(TABLE_PREFIX.len());
    let mut name = String::from(TABLE_PREFIX);
    name.push_str(&slug.chars().take(budget).collect::<String>());
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::FieldType;

    fn materializer() -> TableMaterializer {
        TableMaterializer::new(IdentifierGenerator::new(63))
    }

    #[test]
    fn test_column_assignment_skips_reserved_names() {
        let m = materializer();
        let mut fields = vec![
            Field::new("Id", FieldType::ShortText, 0),
            Field::new("Status", FieldType::SingleChoice, 1),
        ];

        m.assign_column_names(&mut fields).expect("assignment");

        // Reserved names get the deterministic suffix instead.
        let id_column = fields[0].column_name().expect("assigned");
        assert_ne!(id_column, "id");
        assert!(id_column.starts_with("id_"));

        let status_column = fields[1].column_name().expect("assigned");
        assert_ne!(status_column, "status");
    }

    #[test]
    fn test_column_assignment_is_stable_for_existing_names() {
        let m = materializer();
        let mut field = Field::new("Old Title", FieldType::ShortText, 0);
        field.column_name = Some("old_title".to_string());
        field.title = "New Title".to_string();

        let mut fields = vec![field];
        m.assign_column_names(&mut fields).expect("assignment");
        assert_eq!(fields[0].column_name(), Some("old_title"));
    }

    #[test]
    fn test_duplicate_titles_get_distinct_columns() {
        let m = materializer();
        let mut fields = vec![
            Field::new("ชื่อ", FieldType::ShortText, 0),
            Field::new("ชื่อ", FieldType::ShortText, 1),
        ];

        m.assign_column_names(&mut fields).expect("assignment");
        let a = fields[0].column_name().expect("assigned").to_string();
        let b = fields[1].column_name().expect("assigned").to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn test_data_columns_follow_display_order() {
        let m = materializer();
        let mut fields = vec![
            Field::new("Second", FieldType::ShortText, 1),
            Field::new("First", FieldType::ShortText, 0),
            Field::new("Heading", FieldType::Section, 2),
        ];
        m.assign_column_names(&mut fields).expect("assignment");

        let columns = m.data_columns(&fields).expect("mapping");
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "first");
        assert_eq!(columns[1].name, "second");
    }

    #[test]
    fn test_table_prefix_respects_length_limit() {
        let identifier = IdentifierGenerator::new(16);
        let slug = identifier.slugify("a very long form title", "form");
        let name = truncated_with_prefix(&identifier, &slug);
        assert!(name.starts_with(TABLE_PREFIX));
        assert!(name.len() <= 16);
    }
}
