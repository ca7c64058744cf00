// Field domain model
//
// A field is one typed, ordered input definition belonging to a form or
// sub-form. The abstract type set is closed; parsing an unknown type name
// fails instead of defaulting to text, so a missing mapping is never masked.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::core::error::ValidationError;

/// Abstract field type
///
/// The closed enumeration of input types the form designer offers.
/// `Section` and `Note` are layout-only and never materialize a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    ShortText,
    LongText,
    Email,
    Phone,
    Url,
    Number,
    Rating,
    Slider,
    Date,
    Time,
    DateTime,
    SingleChoice,
    MultiChoice,
    GeoPoint,
    FileRef,
    ImageRef,
    Province,
    District,
    Section,
    Note,
}

impl FieldType {
    /// Whether fields of this type materialize a real column
    pub fn materializes(&self) -> bool {
        !matches!(self, FieldType::Section | FieldType::Note)
    }

    /// Canonical name, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::ShortText => "short_text",
            FieldType::LongText => "long_text",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::Number => "number",
            FieldType::Rating => "rating",
            FieldType::Slider => "slider",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::DateTime => "date_time",
            FieldType::SingleChoice => "single_choice",
            FieldType::MultiChoice => "multi_choice",
            FieldType::GeoPoint => "geo_point",
            FieldType::FileRef => "file_ref",
            FieldType::ImageRef => "image_ref",
            FieldType::Province => "province",
            FieldType::District => "district",
            FieldType::Section => "section",
            FieldType::Note => "note",
        }
    }
}

impl FromStr for FieldType {
    type Err = ValidationError;

    /// Parse a type name, failing closed on anything unknown
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "short_text" => Ok(FieldType::ShortText),
            "long_text" => Ok(FieldType::LongText),
            "email" => Ok(FieldType::Email),
            "phone" => Ok(FieldType::Phone),
            "url" => Ok(FieldType::Url),
            "number" => Ok(FieldType::Number),
            "rating" => Ok(FieldType::Rating),
            "slider" => Ok(FieldType::Slider),
            "date" => Ok(FieldType::Date),
            "time" => Ok(FieldType::Time),
            "date_time" => Ok(FieldType::DateTime),
            "single_choice" => Ok(FieldType::SingleChoice),
            "multi_choice" => Ok(FieldType::MultiChoice),
            "geo_point" => Ok(FieldType::GeoPoint),
            "file_ref" => Ok(FieldType::FileRef),
            "image_ref" => Ok(FieldType::ImageRef),
            "province" => Ok(FieldType::Province),
            "district" => Ok(FieldType::District),
            "section" => Ok(FieldType::Section),
            "note" => Ok(FieldType::Note),
            other => Err(ValidationError::UnknownFieldType {
                name: other.to_string(),
            }),
        }
    }
}

/// Per-type field options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Allowed values for choice fields
    #[serde(default)]
    pub choices: Vec<String>,

    /// Total digits for numeric fields
    pub precision: Option<u32>,

    /// Digits after the decimal point for numeric fields
    pub scale: Option<u32>,

    /// Lower bound for rating/slider fields
    pub min: Option<i64>,

    /// Upper bound for rating/slider fields
    pub max: Option<i64>,
}

/// Field definition
///
/// Belongs to exactly one form or one sub-form. The materialized column
/// name is derived once by the identifier generator and stored; it is
/// never regenerated when the title changes, so data never silently moves
/// to a new column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Stable field identifier
    pub id: Uuid,

    /// Display title, any script
    pub title: String,

    /// Abstract type
    pub field_type: FieldType,

    /// Per-type options
    #[serde(default)]
    pub options: FieldOptions,

    /// Position within the form
    pub display_order: i32,

    /// Application-level required flag; never a NOT NULL constraint,
    /// because partially-filled drafts must be storable
    pub required: bool,

    /// Whether list views render this field
    pub show_in_list: bool,

    /// Materialized column name, assigned once
    pub column_name: Option<String>,
}

impl Field {
    /// Create a new field with a fresh identifier and no column name yet
    pub fn new(title: impl Into<String>, field_type: FieldType, display_order: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            field_type,
            options: FieldOptions::default(),
            display_order,
            required: false,
            show_in_list: false,
            column_name: None,
        }
    }

    /// Whether this field materializes a real column
    pub fn materializes(&self) -> bool {
        self.field_type.materializes()
    }

    /// The stored column name, if one has been assigned
    pub fn column_name(&self) -> Option<&str> {
        self.column_name.as_deref()
    }
}
