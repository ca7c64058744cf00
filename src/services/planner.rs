// Migration planning
//
// Diffs two versions of a form's field list into an ordered list of
// structural steps. Fields are matched by their stable identifier, never
// by title, so retitling a field is a rename and not a drop-and-add.
// Steps are ordered additive first, destructive last.

use std::collections::HashMap;

use uuid::Uuid;

use crate::core::error::{EngineResult, ValidationError};
use crate::core::field::Field;
use crate::core::migration::MigrationStep;
use crate::core::table_spec::ColumnSpec;
use crate::services::type_mapping::TypeMapper;

/// Plans structural changes from field-list diffs
#[derive(Debug, Clone, Default)]
pub struct MigrationPlanner {
    mapper: TypeMapper,
}

impl MigrationPlanner {
    pub fn new() -> Self {
        Self {
            mapper: TypeMapper::new(),
        }
    }

    /// Plan the steps that evolve `table` from the old field list to the
    /// new one
    pub fn plan(
        &self,
        table: &str,
        old_fields: &[Field],
        new_fields: &[Field],
    ) -> EngineResult<Vec<MigrationStep>> {
        let old_by_id: HashMap<Uuid, &Field> = old_fields.iter().map(|f| (f.id, f)).collect();
        let new_by_id: HashMap<Uuid, &Field> = new_fields.iter().map(|f| (f.id, f)).collect();

        let mut adds = Vec::new();
        let mut modifies = Vec::new();
        let mut renames = Vec::new();
        let mut drops = Vec::new();

        for field in new_fields {
            let Some(new_spec) = self.column_spec(field)? else {
                continue;
            };

            match old_by_id.get(&field.id).and_then(|f| self.column_spec(f).transpose()) {
                None => adds.push(MigrationStep::add_column(table, new_spec)),
                Some(old_spec) => {
                    let old_spec = old_spec?;
                    if old_spec.column_type != new_spec.column_type {
                        // Type changes run against the current column name.
                        let mut retyped = old_spec.clone();
                        retyped.column_type = new_spec.column_type.clone();
                        modifies.push(MigrationStep::modify_column(
                            table,
                            old_spec.clone(),
                            retyped,
                        ));
                    }
                    if old_spec.name != new_spec.name {
                        let mut renamed_from = old_spec.clone();
                        renamed_from.column_type = new_spec.column_type.clone();
                        renames.push(MigrationStep::rename_column(
                            table,
                            renamed_from,
                            new_spec.name.clone(),
                        ));
                    }
                }
            }
        }

        for field in old_fields {
            if new_by_id.contains_key(&field.id) {
                continue;
            }
            if let Some(old_spec) = self.column_spec(field)? {
                drops.push(MigrationStep::drop_column(table, old_spec));
            }
        }

        let mut steps = adds;
        steps.append(&mut modifies);
        steps.append(&mut renames);
        steps.append(&mut drops);
        Ok(steps)
    }

    /// Column spec for a field, None for layout-only fields
    fn column_spec(&self, field: &Field) -> EngineResult<Option<ColumnSpec>> {
        let Some(column_type) = self.mapper.column_type(field)? else {
            return Ok(None);
        };
        let Some(name) = field.column_name() else {
            return Err(ValidationError::InvalidFieldConfig {
                field: field.title.clone(),
                reason: "field has no assigned column name".to_string(),
            }
            .into());
        };
        Ok(Some(ColumnSpec::new(name, column_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::FieldType;
    use crate::core::migration::MigrationKind;

    fn named_field(title: &str, field_type: FieldType, column: &str, order: i32) -> Field {
        let mut field = Field::new(title, field_type, order);
        field.column_name = Some(column.to_string());
        field
    }

    #[test]
    fn test_unchanged_fields_plan_nothing() {
        let planner = MigrationPlanner::new();
        let fields = vec![named_field("Name", FieldType::ShortText, "name", 0)];

        let steps = planner.plan("form_t", &fields, &fields).expect("plan");
        assert!(steps.is_empty());
    }

    #[test]
    fn test_added_field_plans_add_column() {
        let planner = MigrationPlanner::new();
        let old = vec![named_field("Name", FieldType::ShortText, "name", 0)];
        let mut new = old.clone();
        new.push(named_field("Phone", FieldType::Phone, "phone", 1));

        let steps = planner.plan("form_t", &old, &new).expect("plan");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind, MigrationKind::AddColumn);
        assert_eq!(steps[0].column, "phone");
        assert!(!steps[0].destructive);
    }

    #[test]
    fn test_removed_field_plans_destructive_drop() {
        let planner = MigrationPlanner::new();
        let old = vec![
            named_field("Name", FieldType::ShortText, "name", 0),
            named_field("Email", FieldType::Email, "email", 1),
        ];
        let new = vec![old[0].clone()];

        let steps = planner.plan("form_t", &old, &new).expect("plan");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind, MigrationKind::DropColumn);
        assert_eq!(steps[0].column, "email");
        assert!(steps[0].destructive);
    }

    #[test]
    fn test_type_change_plans_modify() {
        let planner = MigrationPlanner::new();
        let old = vec![named_field("Score", FieldType::ShortText, "score", 0)];
        let mut changed = old[0].clone();
        changed.field_type = FieldType::Number;
        let new = vec![changed];

        let steps = planner.plan("form_t", &old, &new).expect("plan");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind, MigrationKind::ModifyColumn);
        // Text to numeric can lose values.
        assert!(steps[0].destructive);
    }

    #[test]
    fn test_column_rename_matched_by_field_id() {
        let planner = MigrationPlanner::new();
        let old = vec![named_field("Email", FieldType::Email, "email", 0)];
        let mut renamed = old[0].clone();
        renamed.title = "Contact Email".to_string();
        renamed.column_name = Some("contact_email".to_string());
        let new = vec![renamed];

        let steps = planner.plan("form_t", &old, &new).expect("plan");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind, MigrationKind::RenameColumn);
        assert_eq!(steps[0].column, "email");
        assert_eq!(steps[0].new_name.as_deref(), Some("contact_email"));
    }

    #[test]
    fn test_step_ordering_additive_before_destructive() {
        let planner = MigrationPlanner::new();
        let old = vec![
            named_field("Keep", FieldType::ShortText, "keep", 0),
            named_field("Gone", FieldType::ShortText, "gone", 1),
            named_field("Retype", FieldType::ShortText, "retype", 2),
        ];
        let mut retyped = old[2].clone();
        retyped.field_type = FieldType::LongText;
        let new = vec![
            old[0].clone(),
            retyped,
            named_field("Fresh", FieldType::ShortText, "fresh", 3),
        ];

        let steps = planner.plan("form_t", &old, &new).expect("plan");
        let kinds: Vec<MigrationKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MigrationKind::AddColumn,
                MigrationKind::ModifyColumn,
                MigrationKind::DropColumn,
            ]
        );
    }

    #[test]
    fn test_new_field_without_column_name_is_rejected() {
        let planner = MigrationPlanner::new();
        let new = vec![Field::new("Phone", FieldType::Phone, 0)];

        let result = planner.plan("form_t", &[], &new);
        assert!(result.is_err());
    }
}
