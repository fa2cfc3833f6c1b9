//! Row Copier (C5): streams rows per table with transactional batching,
//! per-column value coercion, and progress.

use crate::convert::types::{affinity_for, Affinity};
use crate::coordinator::ConversionCoordinator;
use crate::error::{ConvertError, ConvertResult};
use crate::handlers::ProgressHandler;
use crate::schema::Table;
use crate::source::connection::SourceClient;
use rusqlite::{Connection, ToSql};
use std::collections::HashSet;
use tiberius::Row;

/// Rows are committed and progress is reported every `BATCH_SIZE` rows
/// (spec.md §4.4 step 4), and cancellation is checked at the same
/// cadence.
pub const BATCH_SIZE: usize = 1000;

/// A column value as read off the source connection, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Guid(uuid::Uuid),
    DateTime(String),
}

/// A value ready to bind into a `rusqlite` prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum DestValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ToSql for DestValue {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value};
        Ok(match self {
            DestValue::Null => ToSqlOutput::Owned(Value::Null),
            DestValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            DestValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            DestValue::Text(s) => ToSqlOutput::Owned(Value::Text(s.clone())),
            DestValue::Blob(b) => ToSqlOutput::Owned(Value::Blob(b.clone())),
        })
    }
}

/// Interprets a byte blob as a 16-byte GUID (spec.md §4.4 "Blob-as-Guid"):
/// exact length is used directly, longer blobs are truncated to the
/// first 16 bytes, shorter blobs are zero-padded at the end to 16 bytes.
pub fn guid_from_blob(bytes: &[u8]) -> uuid::Uuid {
    let mut buf = [0u8; 16];
    let take = bytes.len().min(16);
    buf[..take].copy_from_slice(&bytes[..take]);
    uuid::Uuid::from_bytes(buf)
}

fn numeric_to_i64(value: &SourceValue) -> Option<i64> {
    match value {
        SourceValue::I8(v) => Some(*v as i64),
        SourceValue::I16(v) => Some(*v as i64),
        SourceValue::I32(v) => Some(*v as i64),
        SourceValue::I64(v) => Some(*v),
        SourceValue::F64(v) => Some(*v as i64),
        _ => None,
    }
}

fn numeric_to_f64(value: &SourceValue) -> Option<f64> {
    match value {
        SourceValue::F32(v) => Some(*v as f64),
        SourceValue::F64(v) => Some(*v),
        _ => None,
    }
}

fn pass_through(value: SourceValue) -> ConvertResult<DestValue> {
    Ok(match value {
        SourceValue::Null => DestValue::Null,
        SourceValue::Bool(b) => DestValue::Integer(b as i64),
        SourceValue::I8(v) => DestValue::Integer(v as i64),
        SourceValue::I16(v) => DestValue::Integer(v as i64),
        SourceValue::I32(v) => DestValue::Integer(v as i64),
        SourceValue::I64(v) => DestValue::Integer(v),
        SourceValue::F32(v) => DestValue::Real(v as f64),
        SourceValue::F64(v) => DestValue::Real(v),
        SourceValue::String(s) => DestValue::Text(s),
        SourceValue::Bytes(b) => DestValue::Blob(b),
        SourceValue::Guid(g) => DestValue::Text(g.to_string()),
        SourceValue::DateTime(s) => DestValue::Text(s),
    })
}

/// Coerces `value` into the representation `affinity` expects
/// (spec.md §4.4). A source NULL always becomes a destination NULL; any
/// (source, affinity) pairing not named in the table passes through
/// unchanged.
pub fn coerce(value: SourceValue, affinity: Affinity) -> ConvertResult<DestValue> {
    if matches!(value, SourceValue::Null) {
        return Ok(DestValue::Null);
    }

    match affinity {
        Affinity::Int32 | Affinity::Int16 | Affinity::Int64 => {
            if let Some(i) = numeric_to_i64(&value) {
                return Ok(DestValue::Integer(i));
            }
        }
        Affinity::Single | Affinity::Double => {
            if let Some(f) = numeric_to_f64(&value) {
                return Ok(DestValue::Real(f));
            }
        }
        Affinity::String => {
            if let SourceValue::Guid(g) = &value {
                return Ok(DestValue::Text(g.to_string()));
            }
        }
        Affinity::Guid => match &value {
            SourceValue::String(s) => {
                let guid = uuid::Uuid::parse_str(s).map_err(|e| ConvertError::RowCopy {
                    table: String::new(),
                    message: format!("invalid guid string '{s}': {e}"),
                })?;
                return Ok(DestValue::Text(guid.to_string()));
            }
            SourceValue::Bytes(bytes) => {
                return Ok(DestValue::Text(guid_from_blob(bytes).to_string()));
            }
            _ => {}
        },
        Affinity::Binary | Affinity::Boolean | Affinity::DateTime | Affinity::Byte
        | Affinity::Object => {}
    }

    pass_through(value)
}

/// Sanitizes column names into unique `@`-prefixed SQL parameter names
/// (spec.md §4.4): every non-alphanumeric, non-underscore character
/// becomes `_`, and collisions within a statement are broken by
/// appending `_` until the candidate is unique. Deterministic: the same
/// input always yields the same output sequence.
pub fn parameter_names(columns: &[String]) -> Vec<String> {
    let mut used = HashSet::new();
    let mut result = Vec::with_capacity(columns.len());
    for column in columns {
        let mut candidate: String = column
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        while used.contains(&candidate) {
            candidate.push('_');
        }
        used.insert(candidate.clone());
        result.push(format!("@{candidate}"));
    }
    result
}

/// Builds the `INSERT INTO [table] ([c1], [c2]) VALUES (@c1, @c2)`
/// statement text for `table`.
pub fn insert_statement_sql(table: &Table) -> String {
    let columns = table
        .columns
        .iter()
        .map(|c| c.name.clone())
        .collect::<Vec<_>>();
    let params = parameter_names(&columns);
    let column_list = columns
        .iter()
        .map(|c| format!("[{c}]"))
        .collect::<Vec<_>>()
        .join(", ");
    let param_list = params.join(", ");
    format!(
        "INSERT INTO [{}] ({column_list}) VALUES ({param_list})",
        table.name
    )
}

/// Inserts one row's already-coerced values into `table` using the
/// statement built by [`insert_statement_sql`].
pub fn insert_row(conn: &Connection, table: &Table, values: &[DestValue]) -> ConvertResult<()> {
    let sql = insert_statement_sql(table);
    let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
    conn.execute(&sql, params.as_slice())
        .map_err(|e| ConvertError::RowCopy {
            table: table.name.clone(),
            message: e.to_string(),
        })?;
    Ok(())
}

fn extract_value(row: &Row, idx: usize, affinity: Affinity) -> SourceValue {
    match affinity {
        Affinity::Byte => row
            .get::<u8, _>(idx)
            .map(|v| SourceValue::I16(v as i16))
            .unwrap_or(SourceValue::Null),
        Affinity::Int16 => row.get::<i16, _>(idx).map(SourceValue::I16).unwrap_or(SourceValue::Null),
        Affinity::Int32 => row.get::<i32, _>(idx).map(SourceValue::I32).unwrap_or(SourceValue::Null),
        Affinity::Int64 => row.get::<i64, _>(idx).map(SourceValue::I64).unwrap_or(SourceValue::Null),
        Affinity::Boolean => row.get::<bool, _>(idx).map(SourceValue::Bool).unwrap_or(SourceValue::Null),
        Affinity::String | Affinity::Object => row
            .get::<&str, _>(idx)
            .map(|s| SourceValue::String(s.to_string()))
            .unwrap_or(SourceValue::Null),
        Affinity::Double => row.get::<f64, _>(idx).map(SourceValue::F64).unwrap_or(SourceValue::Null),
        Affinity::Single => row.get::<f32, _>(idx).map(SourceValue::F32).unwrap_or(SourceValue::Null),
        Affinity::Binary => row
            .get::<&[u8], _>(idx)
            .map(|b| SourceValue::Bytes(b.to_vec()))
            .unwrap_or(SourceValue::Null),
        Affinity::DateTime => row
            .get::<chrono::NaiveDateTime, _>(idx)
            .map(|d| SourceValue::DateTime(d.to_string()))
            .unwrap_or(SourceValue::Null),
        Affinity::Guid => row.get::<uuid::Uuid, _>(idx).map(SourceValue::Guid).unwrap_or(SourceValue::Null),
    }
}

fn report_progress(
    progress: &dyn ProgressHandler,
    percent_range: (u8, u8),
    copied: usize,
    total: usize,
    table_name: &str,
) {
    let (start, end) = percent_range;
    let span = end.saturating_sub(start) as f64;
    let fraction = if total == 0 { 1.0 } else { copied as f64 / total as f64 };
    let percent = (start as f64 + span * fraction).round() as u8;
    progress.on_progress(
        false,
        true,
        percent,
        &format!("copying {table_name}: {copied}/{total} rows"),
    );
}

/// Copies every row of `table` from `source` into `dest` (spec.md §4.4):
/// rows are streamed, coerced per-column via [`coerce`], and committed
/// in [`BATCH_SIZE`]-row transactions. Cancellation is checked between
/// rows; an error mid-batch leaves the in-flight transaction
/// uncommitted, so it rolls back on drop.
pub async fn copy_table(
    source: &mut SourceClient,
    dest: &Connection,
    table: &Table,
    coordinator: &ConversionCoordinator,
    progress: &dyn ProgressHandler,
    percent_range: (u8, u8),
) -> ConvertResult<()> {
    let affinities = table
        .columns
        .iter()
        .map(|c| affinity_for(&c.source_type))
        .collect::<ConvertResult<Vec<_>>>()?;

    let column_list = table
        .columns
        .iter()
        .map(|c| format!("[{}]", c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let select_sql = format!(
        "SELECT {column_list} FROM {}.[{}]",
        table.schema_name, table.name
    );

    let rows = source
        .simple_query(&select_sql)
        .await?
        .into_first_result()
        .await?;
    let total = rows.len();

    let mut tx = dest.unchecked_transaction()?;
    let mut copied = 0usize;
    let mut since_commit = 0usize;

    for row in &rows {
        coordinator.check_cancelled()?;

        let values = affinities
            .iter()
            .enumerate()
            .map(|(idx, affinity)| coerce(extract_value(row, idx, *affinity), *affinity))
            .collect::<ConvertResult<Vec<_>>>()?;
        insert_row(&tx, table, &values)?;

        copied += 1;
        since_commit += 1;
        if since_commit >= BATCH_SIZE {
            tx.commit()?;
            tx = dest.unchecked_transaction()?;
            since_commit = 0;
            report_progress(progress, percent_range, copied, total, &table.name);
        }
    }

    tx.commit()?;
    report_progress(progress, percent_range, copied, total, &table.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_always_becomes_null() {
        assert_eq!(
            coerce(SourceValue::Null, Affinity::Int32).unwrap(),
            DestValue::Null
        );
    }

    #[test]
    fn int32_accepts_short_byte_long_decimal() {
        assert_eq!(
            coerce(SourceValue::I16(7), Affinity::Int32).unwrap(),
            DestValue::Integer(7)
        );
        assert_eq!(
            coerce(SourceValue::I8(7), Affinity::Int32).unwrap(),
            DestValue::Integer(7)
        );
        assert_eq!(
            coerce(SourceValue::I64(7), Affinity::Int32).unwrap(),
            DestValue::Integer(7)
        );
        assert_eq!(
            coerce(SourceValue::F64(7.9), Affinity::Int32).unwrap(),
            DestValue::Integer(7)
        );
    }

    #[test]
    fn string_affinity_renders_guid_canonically() {
        let guid = uuid::Uuid::nil();
        let result = coerce(SourceValue::Guid(guid), Affinity::String).unwrap();
        assert_eq!(result, DestValue::Text(guid.to_string()));
    }

    #[test]
    fn guid_affinity_parses_string() {
        let guid = uuid::Uuid::new_v4();
        let result = coerce(SourceValue::String(guid.to_string()), Affinity::Guid).unwrap();
        assert_eq!(result, DestValue::Text(guid.to_string()));
    }

    #[test]
    fn blob_as_guid_exact_16_bytes_round_trips() {
        let guid = uuid::Uuid::new_v4();
        let bytes = guid.into_bytes();
        let parsed = guid_from_blob(&bytes);
        assert_eq!(parsed.into_bytes(), bytes);
    }

    #[test]
    fn blob_as_guid_longer_is_truncated() {
        let mut bytes = vec![0xAB; 20];
        bytes[0] = 1;
        let parsed = guid_from_blob(&bytes);
        let mut expected = [0u8; 16];
        expected.copy_from_slice(&bytes[0..16]);
        assert_eq!(parsed.into_bytes(), expected);
    }

    #[test]
    fn blob_as_guid_shorter_is_zero_padded() {
        let bytes = vec![1, 2, 3];
        let parsed = guid_from_blob(&bytes);
        let mut expected = [0u8; 16];
        expected[0..3].copy_from_slice(&bytes);
        assert_eq!(parsed.into_bytes(), expected);
    }

    #[test]
    fn binary_boolean_datetime_pass_through() {
        assert_eq!(
            coerce(SourceValue::Bytes(vec![1, 2, 3]), Affinity::Binary).unwrap(),
            DestValue::Blob(vec![1, 2, 3])
        );
        assert_eq!(
            coerce(SourceValue::Bool(true), Affinity::Boolean).unwrap(),
            DestValue::Integer(1)
        );
        assert_eq!(
            coerce(SourceValue::DateTime("2024-01-01".into()), Affinity::DateTime).unwrap(),
            DestValue::Text("2024-01-01".into())
        );
    }

    #[test]
    fn parameter_names_sanitize_and_dedupe_deterministically() {
        let columns = vec!["user name".to_string(), "user-name".to_string(), "id".to_string()];
        let names = parameter_names(&columns);
        assert_eq!(names, vec!["@user_name", "@user_name_", "@id"]);

        // Same input always yields the same output sequence.
        assert_eq!(names, parameter_names(&columns));
    }

    #[test]
    fn insert_statement_uses_bracketed_columns_and_sanitized_params() {
        let table = Table {
            name: "Orders".into(),
            schema_name: "dbo".into(),
            columns: vec![
                crate::schema::Column {
                    name: "order id".into(),
                    source_type: "int".into(),
                    length: 0,
                    nullable: false,
                    default_expr: String::new(),
                    is_identity: false,
                    case_sensitive: crate::schema::CaseSensitivity::Unknown,
                },
            ],
            primary_key: vec![],
            foreign_keys: vec![],
            indexes: vec![],
        };
        let sql = insert_statement_sql(&table);
        assert_eq!(
            sql,
            "INSERT INTO [Orders] ([order id]) VALUES (@order_id)"
        );
    }
}
