//! Native column type to canonical type mapping
//!
//! The table is fixed. Codes it does not know map to [`TypeTag::Any`] so an exotic
//! column never aborts an extraction, it only loses its type annotation.

use crate::types::{SqlTypeCode, TypeTag};

/// Map a native type code to its canonical type
pub fn map_type(code: SqlTypeCode) -> TypeTag {
    match code {
        SqlTypeCode::BOOLEAN | SqlTypeCode::BIT => TypeTag::Boolean,
        SqlTypeCode::TINYINT | SqlTypeCode::CHAR => TypeTag::Byte,
        SqlTypeCode::SMALLINT => TypeTag::Short,
        SqlTypeCode::INTEGER => TypeTag::Integer,
        SqlTypeCode::BIGINT => TypeTag::Long,
        SqlTypeCode::FLOAT | SqlTypeCode::REAL => TypeTag::Float,
        SqlTypeCode::DOUBLE => TypeTag::Double,
        SqlTypeCode::DECIMAL | SqlTypeCode::NUMERIC => TypeTag::Decimal,
        SqlTypeCode::DATE => TypeTag::Date,
        SqlTypeCode::TIMESTAMP | SqlTypeCode::TIMESTAMP_WITH_TIMEZONE => TypeTag::Datetime,
        SqlTypeCode::VARCHAR
        | SqlTypeCode::LONGVARCHAR
        | SqlTypeCode::NVARCHAR
        | SqlTypeCode::LONGNVARCHAR
        | SqlTypeCode::CLOB
        | SqlTypeCode::NCLOB => TypeTag::String,
        SqlTypeCode::BINARY
        | SqlTypeCode::VARBINARY
        | SqlTypeCode::LONGVARBINARY
        | SqlTypeCode::BLOB => TypeTag::Binary,
        _ => TypeTag::Any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_family() {
        assert_eq!(map_type(SqlTypeCode::TINYINT), TypeTag::Byte);
        assert_eq!(map_type(SqlTypeCode::SMALLINT), TypeTag::Short);
        assert_eq!(map_type(SqlTypeCode::INTEGER), TypeTag::Integer);
        assert_eq!(map_type(SqlTypeCode::BIGINT), TypeTag::Long);
    }

    #[test]
    fn test_single_char_maps_to_byte() {
        assert_eq!(map_type(SqlTypeCode::CHAR), TypeTag::Byte);
        assert_eq!(map_type(SqlTypeCode::NCHAR), TypeTag::Any);
    }

    #[test]
    fn test_unknown_codes_fall_back_to_any() {
        assert_eq!(map_type(SqlTypeCode::OTHER), TypeTag::Any);
        assert_eq!(map_type(SqlTypeCode::ARRAY), TypeTag::Any);
        assert_eq!(map_type(SqlTypeCode(424_242)), TypeTag::Any);
    }
}
