// Form domain model
//
// Forms, sub-forms and the submission ledger record. A form owns exactly
// one materialized table name once created; the name is immutable even if
// the title later changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::ValidationError;
use crate::core::field::Field;

/// Form definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    /// Stable form identifier
    pub id: Uuid,

    /// Display title, any script
    pub title: String,

    /// Materialized table name, set once on first successful creation
    pub table_name: Option<String>,

    /// Ordered field definitions
    pub fields: Vec<Field>,

    /// Nested sub-form definitions
    pub sub_forms: Vec<SubForm>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Form {
    /// Create a new form with a fresh identifier
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            table_name: None,
            fields: Vec::new(),
            sub_forms: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a field
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Add a sub-form
    pub fn add_sub_form(&mut self, sub_form: SubForm) {
        self.sub_forms.push(sub_form);
    }

    /// Fields that materialize real columns, in display order
    pub fn materializable_fields(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = self.fields.iter().filter(|f| f.materializes()).collect();
        fields.sort_by_key(|f| f.display_order);
        fields
    }

    /// Record the materialized table name; rejected once set
    pub fn set_table_name(&mut self, table_name: String) -> Result<(), ValidationError> {
        if let Some(existing) = &self.table_name {
            return Err(ValidationError::TableNameAlreadySet {
                form: self.title.clone(),
                table: existing.clone(),
            });
        }
        self.table_name = Some(table_name);
        Ok(())
    }
}

/// Sub-form definition
///
/// A nested, repeatable field group with its own materialized table.
/// Every row carries a parent-link column referencing the owning
/// main-form row, with cascade delete from parent to child only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubForm {
    /// Stable sub-form identifier
    pub id: Uuid,

    /// Owning form identifier
    pub form_id: Uuid,

    /// Display title, any script
    pub title: String,

    /// Materialized table name, set once
    pub table_name: Option<String>,

    /// Ordered field definitions
    pub fields: Vec<Field>,
}

impl SubForm {
    /// Create a new sub-form under the given form
    pub fn new(form_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            form_id,
            title: title.into(),
            table_name: None,
            fields: Vec::new(),
        }
    }

    /// Add a field
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Fields that materialize real columns, in display order
    pub fn materializable_fields(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = self.fields.iter().filter(|f| f.materializes()).collect();
        fields.sort_by_key(|f| f.display_order);
        fields
    }

    /// Record the materialized table name; rejected once set
    pub fn set_table_name(&mut self, table_name: String) -> Result<(), ValidationError> {
        if let Some(existing) = &self.table_name {
            return Err(ValidationError::TableNameAlreadySet {
                form: self.title.clone(),
                table: existing.clone(),
            });
        }
        self.table_name = Some(table_name);
        Ok(())
    }
}

/// Submission lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Archived,
}

impl SubmissionStatus {
    /// Canonical name, matching the stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft => "draft",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::Archived => "archived",
        }
    }

    /// Parse a stored status value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(SubmissionStatus::Draft),
            "submitted" => Some(SubmissionStatus::Submitted),
            "approved" => Some(SubmissionStatus::Approved),
            "rejected" => Some(SubmissionStatus::Rejected),
            "archived" => Some(SubmissionStatus::Archived),
            _ => None,
        }
    }
}

/// Submission ledger record
///
/// One act of form-filling. The submission identifier and the primary key
/// of the corresponding row in the materialized table are the same value;
/// the identifier is generated once and threaded through both writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Shared row identity
    pub id: Uuid,

    /// Form or sub-form this submission belongs to
    pub form_id: Uuid,

    /// Owning main-form row identifier, for sub-form submissions
    pub parent_row_id: Option<String>,

    /// Submitter reference
    pub submitted_by: String,

    /// Submission time
    pub submitted_at: DateTime<Utc>,

    /// Lifecycle status
    pub status: SubmissionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::FieldType;

    #[test]
    fn test_table_name_is_immutable() {
        let mut form = Form::new("Customer Intake");
        form.set_table_name("form_customer_intake".to_string())
            .expect("first assignment should succeed");

        let result = form.set_table_name("form_renamed".to_string());
        assert!(matches!(
            result,
            Err(ValidationError::TableNameAlreadySet { .. })
        ));
        assert_eq!(form.table_name.as_deref(), Some("form_customer_intake"));
    }

    #[test]
    fn test_materializable_fields_skip_layout_and_sort() {
        let mut form = Form::new("Survey");
        form.add_field(Field::new("Comments", FieldType::LongText, 2));
        form.add_field(Field::new("Header", FieldType::Section, 0));
        form.add_field(Field::new("Name", FieldType::ShortText, 1));

        let fields = form.materializable_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].title, "Name");
        assert_eq!(fields[1].title, "Comments");
    }

    #[test]
    fn test_submission_status_round_trip() {
        for status in [
            SubmissionStatus::Draft,
            SubmissionStatus::Submitted,
            SubmissionStatus::Approved,
            SubmissionStatus::Rejected,
            SubmissionStatus::Archived,
        ] {
            assert_eq!(SubmissionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SubmissionStatus::parse("pending"), None);
    }
}
