// Field type mapping
//
// Maps every abstract field type to a concrete column type. The mapping is
// total over the closed enumeration: layout-only types map to no column,
// everything else maps to exactly one type. Unknown names never reach this
// point because parsing fails closed.

use crate::core::error::ValidationError;
use crate::core::field::{Field, FieldType};
use crate::core::table_spec::ColumnType;

/// Default total digits for numeric fields
const DEFAULT_PRECISION: u32 = 18;

/// Default digits after the decimal point for numeric fields
const DEFAULT_SCALE: u32 = 4;

/// Maps abstract field types to concrete column types
#[derive(Debug, Clone, Default)]
pub struct TypeMapper;

impl TypeMapper {
    pub fn new() -> Self {
        Self
    }

    /// Concrete column type for a field; None for layout-only types
    pub fn column_type(&self, field: &Field) -> Result<Option<ColumnType>, ValidationError> {
        let column_type = match field.field_type {
            FieldType::ShortText | FieldType::Email | FieldType::SingleChoice => {
                ColumnType::VARCHAR { length: 255 }
            }

            FieldType::Phone => ColumnType::VARCHAR { length: 32 },

            // Multi-choice stores a JSON array, geo-point a lat/long pair
            FieldType::LongText
            | FieldType::Url
            | FieldType::MultiChoice
            | FieldType::GeoPoint => ColumnType::TEXT,

            FieldType::Number => self.numeric_type(field)?,

            FieldType::Rating | FieldType::Slider => ColumnType::INTEGER,

            FieldType::Date => ColumnType::DATE,
            FieldType::Time => ColumnType::TIME,
            FieldType::DateTime => ColumnType::TIMESTAMP,

            // Stored as opaque object keys, not blobs
            FieldType::FileRef | FieldType::ImageRef => ColumnType::VARCHAR { length: 64 },

            FieldType::Province | FieldType::District => ColumnType::VARCHAR { length: 128 },

            FieldType::Section | FieldType::Note => return Ok(None),
        };

        Ok(Some(column_type))
    }

    fn numeric_type(&self, field: &Field) -> Result<ColumnType, ValidationError> {
        let precision = field.options.precision.unwrap_or(DEFAULT_PRECISION);
        let scale = field.options.scale.unwrap_or(DEFAULT_SCALE);

        if scale > precision {
            return Err(ValidationError::InvalidFieldConfig {
                field: field.title.clone(),
                reason: format!("scale {} exceeds precision {}", scale, precision),
            });
        }

        Ok(ColumnType::DECIMAL { precision, scale })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::FieldOptions;

    fn field_of(field_type: FieldType) -> Field {
        Field::new("Sample", field_type, 0)
    }

    #[test]
    fn test_text_family_mappings() {
        let mapper = TypeMapper::new();

        assert_eq!(
            mapper.column_type(&field_of(FieldType::ShortText)).unwrap(),
            Some(ColumnType::VARCHAR { length: 255 })
        );
        assert_eq!(
            mapper.column_type(&field_of(FieldType::Phone)).unwrap(),
            Some(ColumnType::VARCHAR { length: 32 })
        );
        assert_eq!(
            mapper.column_type(&field_of(FieldType::LongText)).unwrap(),
            Some(ColumnType::TEXT)
        );
        assert_eq!(
            mapper.column_type(&field_of(FieldType::MultiChoice)).unwrap(),
            Some(ColumnType::TEXT)
        );
    }

    #[test]
    fn test_numeric_defaults_and_options() {
        let mapper = TypeMapper::new();

        assert_eq!(
            mapper.column_type(&field_of(FieldType::Number)).unwrap(),
            Some(ColumnType::DECIMAL {
                precision: 18,
                scale: 4,
            })
        );

        let mut custom = field_of(FieldType::Number);
        custom.options = FieldOptions {
            precision: Some(10),
            scale: Some(2),
            ..Default::default()
        };
        assert_eq!(
            mapper.column_type(&custom).unwrap(),
            Some(ColumnType::DECIMAL {
                precision: 10,
                scale: 2,
            })
        );
    }

    #[test]
    fn test_numeric_scale_must_fit_precision() {
        let mapper = TypeMapper::new();

        let mut bad = field_of(FieldType::Number);
        bad.options.precision = Some(4);
        bad.options.scale = Some(6);

        assert!(matches!(
            mapper.column_type(&bad),
            Err(ValidationError::InvalidFieldConfig { .. })
        ));
    }

    #[test]
    fn test_temporal_and_reference_mappings() {
        let mapper = TypeMapper::new();

        assert_eq!(
            mapper.column_type(&field_of(FieldType::Date)).unwrap(),
            Some(ColumnType::DATE)
        );
        assert_eq!(
            mapper.column_type(&field_of(FieldType::DateTime)).unwrap(),
            Some(ColumnType::TIMESTAMP)
        );
        assert_eq!(
            mapper.column_type(&field_of(FieldType::FileRef)).unwrap(),
            Some(ColumnType::VARCHAR { length: 64 })
        );
        assert_eq!(
            mapper.column_type(&field_of(FieldType::Province)).unwrap(),
            Some(ColumnType::VARCHAR { length: 128 })
        );
    }

    #[test]
    fn test_layout_types_map_to_no_column() {
        let mapper = TypeMapper::new();
        assert_eq!(mapper.column_type(&field_of(FieldType::Section)).unwrap(), None);
        assert_eq!(mapper.column_type(&field_of(FieldType::Note)).unwrap(), None);
    }
}
