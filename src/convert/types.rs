//! Type mapping and value-coercion affinities (C3, first half).

use crate::error::{ConvertError, ConvertResult};

/// Source type tokens this engine accepts, already lowercased. Anything
/// outside this set is rejected before mapping (spec.md §4.2).
const ACCEPTED_SOURCE_TYPES: &[&str] = &[
    "timestamp", "binary", "varbinary", "image", "sql_variant",
    "datetime", "smalldatetime", "date", "datetime2", "time",
    "decimal", "money", "smallmoney",
    "tinyint", "bigint", "int", "smallint",
    "xml", "uniqueidentifier",
    "ntext", "nchar", "nvarchar", "varchar", "text", "char",
    "bit", "float", "real", "integer", "blob", "numeric", "guid", "varchar",
];

/// Maps a lowercased source type token to the stored, SQLite-friendly
/// token. Rejects anything outside the accepted set.
pub fn map_source_type(source_type: &str) -> ConvertResult<String> {
    let lowered = source_type.to_lowercase();
    if !ACCEPTED_SOURCE_TYPES.contains(&lowered.as_str()) {
        return Err(ConvertError::UnsupportedType {
            type_token: source_type.to_string(),
        });
    }

    let mapped = match lowered.as_str() {
        "timestamp" | "binary" | "varbinary" | "image" | "sql_variant" => "blob",
        "datetime" | "smalldatetime" | "date" | "datetime2" | "time" => "datetime",
        "decimal" | "money" | "smallmoney" => "numeric",
        "tinyint" => "smallint",
        "bigint" => "integer",
        "xml" => "varchar",
        "uniqueidentifier" => "guid",
        "ntext" => "text",
        "nchar" => "char",
        "nvarchar" => "varchar",
        other => other,
    };
    Ok(mapped.to_string())
}

/// Applied at DDL-emission time only: a column whose *stored* type is
/// exactly `int` is rewritten to `integer`. Identity columns are already
/// forced to `integer` earlier, so this only ever fires for non-identity
/// columns (spec.md §9's documented asymmetry).
pub fn emission_type(stored_type: &str) -> &str {
    if stored_type == "int" {
        "integer"
    } else {
        stored_type
    }
}

const INTEGRAL_TYPES: &[&str] = &["tinyint", "int", "smallint", "bigint", "integer"];

/// True iff `source_type` (pre-mapping token) is one of the integral
/// types the identity->autoincrement rule accepts.
pub fn is_integral_type(source_type: &str) -> bool {
    INTEGRAL_TYPES.contains(&source_type)
}

/// The destination SQLite affinity used to drive value coercion
/// (spec.md §4.4). A closed, tagged enum dispatched via `match` -
/// never runtime reflection (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Byte,
    Int16,
    Int32,
    Int64,
    Boolean,
    String,
    Double,
    Single,
    Binary,
    DateTime,
    Guid,
    Object,
}

/// Derives the affinity from an already-normalized (stored) column type.
pub fn affinity_for(stored_type: &str) -> ConvertResult<Affinity> {
    Ok(match stored_type {
        "tinyint" => Affinity::Byte,
        "int" => Affinity::Int32,
        "smallint" => Affinity::Int16,
        "bigint" => Affinity::Int64,
        "bit" => Affinity::Boolean,
        "nvarchar" | "varchar" | "text" | "ntext" | "nchar" | "char" | "xml" => Affinity::String,
        "float" | "numeric" => Affinity::Double,
        "real" => Affinity::Single,
        "blob" => Affinity::Binary,
        "timestamp" | "datetime" | "datetime2" | "date" | "time" => Affinity::DateTime,
        "uniqueidentifier" | "guid" => Affinity::Guid,
        "sql_variant" => Affinity::Object,
        "integer" => Affinity::Int64,
        other => {
            return Err(ConvertError::IllegalAffinity {
                affinity: other.to_string(),
            })
        }
    })
}
