//! Source Introspector (C2): reads SQL Server's catalog into a
//! dialect-neutral [`Database`].

use crate::convert::types::map_source_type;
use crate::coordinator::ConversionCoordinator;
use crate::error::{ConvertError, ConvertResult};
use crate::handlers::ProgressHandler;
use crate::schema::{CaseSensitivity, Column, ForeignKey, Index, IndexColumn, Table, View};
use crate::source::connection::SourceClient;
use once_cell::sync::Lazy;
use regex::Regex;

const TABLE_QUERY: &str =
    "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME";

const COLUMN_QUERY: &str = "\
    SELECT c.COLUMN_NAME, c.DATA_TYPE, \
           ISNULL(c.CHARACTER_MAXIMUM_LENGTH, 0), \
           CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END, \
           ISNULL(c.COLUMN_DEFAULT, ''), \
           COLUMNPROPERTY(OBJECT_ID(c.TABLE_SCHEMA + '.' + c.TABLE_NAME), c.COLUMN_NAME, 'IsIdentity'), \
           COL_NAME(OBJECT_ID(c.TABLE_SCHEMA + '.' + c.TABLE_NAME), c.ORDINAL_POSITION) \
    FROM INFORMATION_SCHEMA.COLUMNS c \
    WHERE c.TABLE_NAME = @P1 \
    ORDER BY c.ORDINAL_POSITION";

const PRIMARY_KEY_QUERY: &str = "\
    SELECT kcu.COLUMN_NAME \
    FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
    JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
      ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
    WHERE tc.TABLE_NAME = @P1 AND tc.CONSTRAINT_TYPE = 'PRIMARY KEY' \
    ORDER BY kcu.ORDINAL_POSITION";

const FOREIGN_KEY_QUERY: &str = "\
    SELECT fk.name, tp.name, cp.name, tr.name, cr.name, fk.delete_referential_action, cp.is_nullable \
    FROM sys.foreign_keys fk \
    JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id \
    JOIN sys.tables tp ON tp.object_id = fk.parent_object_id \
    JOIN sys.columns cp ON cp.object_id = fkc.parent_object_id AND cp.column_id = fkc.parent_column_id \
    JOIN sys.tables tr ON tr.object_id = fk.referenced_object_id \
    JOIN sys.columns cr ON cr.object_id = fkc.referenced_object_id AND cr.column_id = fkc.referenced_column_id \
    WHERE tp.name = @P1";

const COLLATION_QUERY: &str = "\
    SELECT c.name, c.collation_name \
    FROM sys.columns c \
    WHERE c.object_id = OBJECT_ID(@P1) AND c.collation_name IS NOT NULL";

const VIEW_QUERY: &str =
    "SELECT TABLE_NAME, VIEW_DEFINITION FROM INFORMATION_SCHEMA.VIEWS ORDER BY TABLE_NAME";

static DBO_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\[dbo\]\.|\bdbo\.").unwrap());

/// Strips the `dbo.` / `[dbo].` schema qualifier SQL Server always
/// prepends (spec.md §4.1); SQLite has no schema namespace.
pub fn strip_dbo_prefix(sql: &str) -> String {
    DBO_PREFIX.replace_all(sql, "").to_string()
}

/// Case sensitivity from a `sys.columns.collation_name` value such as
/// `SQL_Latin1_General_CP1_CI_AS` (spec.md §4.1): the `_CI_`/`_CS_`
/// segment is SQL Server's own case-sensitivity marker. A name carrying
/// neither segment, or no collation at all, is reported `Unknown` rather
/// than assumed insensitive.
pub fn case_sensitivity_from_collation(collation_name: &str) -> CaseSensitivity {
    let upper = collation_name.to_uppercase();
    if upper.contains("_CI_") {
        CaseSensitivity::CaseInsensitive
    } else if upper.contains("_CS_") {
        CaseSensitivity::CaseSensitive
    } else {
        CaseSensitivity::Unknown
    }
}

async fn collation_for(
    client: &mut SourceClient,
    table: &str,
) -> ConvertResult<std::collections::HashMap<String, CaseSensitivity>> {
    let qualified = format!("dbo.{table}");
    let rows = client
        .query(COLLATION_QUERY, &[&qualified])
        .await?
        .into_first_result()
        .await?;

    let mut map = std::collections::HashMap::with_capacity(rows.len());
    for row in rows {
        let column_name: &str = row.get(0).unwrap_or_default();
        let collation_name: &str = row.get(1).unwrap_or_default();
        map.insert(column_name.to_string(), case_sensitivity_from_collation(collation_name));
    }
    Ok(map)
}

/// True iff an `sp_helpindex`-style description names the clustered
/// primary key row, which index enumeration must skip (spec.md §4.1) —
/// it is represented separately via the primary key query.
pub fn is_primary_key_description(description: &str) -> bool {
    description.to_lowercase().contains("primary key")
}

pub fn is_unique_description(description: &str) -> bool {
    description.to_lowercase().contains("unique")
}

/// Parses an `sp_helpindex`-style `index_keys` string
/// (`"col1, col2(-)"`) into ordered, directional index columns. A
/// `(-)` suffix marks a descending column (spec.md §4.1).
pub fn parse_index_keys(keys: &str) -> Vec<IndexColumn> {
    keys.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|part| {
            if let Some(name) = part.strip_suffix("(-)") {
                IndexColumn {
                    column_name: name.trim().to_string(),
                    ascending: false,
                }
            } else {
                IndexColumn {
                    column_name: part.to_string(),
                    ascending: true,
                }
            }
        })
        .collect()
}

async fn table_names(client: &mut SourceClient) -> ConvertResult<Vec<String>> {
    let rows = client
        .simple_query(TABLE_QUERY)
        .await?
        .into_first_result()
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.get::<&str, _>(0).map(String::from))
        .collect())
}

async fn columns_for(client: &mut SourceClient, table: &str) -> ConvertResult<Vec<Column>> {
    let rows = client
        .query(COLUMN_QUERY, &[&table])
        .await?
        .into_first_result()
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: &str = row.get(0).unwrap_or_default();
        let data_type: &str = row.get(1).unwrap_or_default();
        let length: i32 = row.get(2).unwrap_or_default();
        let is_nullable: i32 = row.get(3).unwrap_or_default();
        let default_expr: &str = row.get(4).unwrap_or_default();
        let is_identity: i32 = row.get(5).unwrap_or_default();

        columns.push(Column {
            name: name.to_string(),
            source_type: map_source_type(data_type)?,
            length: length as i64,
            nullable: is_nullable != 0,
            default_expr: default_expr.to_string(),
            is_identity: is_identity != 0,
            case_sensitive: CaseSensitivity::Unknown,
        });
    }
    Ok(columns)
}

async fn primary_key_for(client: &mut SourceClient, table: &str) -> ConvertResult<Vec<String>> {
    let rows = client
        .query(PRIMARY_KEY_QUERY, &[&table])
        .await?
        .into_first_result()
        .await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.get::<&str, _>(0).map(String::from))
        .collect())
}

async fn foreign_keys_for(client: &mut SourceClient, table: &str) -> ConvertResult<Vec<ForeignKey>> {
    let rows = client
        .query(FOREIGN_KEY_QUERY, &[&table])
        .await?
        .into_first_result()
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let parent_table: &str = row.get(1).unwrap_or_default();
            let parent_column: &str = row.get(2).unwrap_or_default();
            let referenced_table: &str = row.get(3).unwrap_or_default();
            let referenced_column: &str = row.get(4).unwrap_or_default();
            let delete_action: u8 = row.get(5).unwrap_or_default();
            let is_nullable: bool = row.get(6).unwrap_or_default();

            ForeignKey {
                table_name: parent_table.to_string(),
                column_name: parent_column.to_string(),
                foreign_table_name: referenced_table.to_string(),
                foreign_column_name: referenced_column.to_string(),
                cascade_on_delete: delete_action == 1,
                is_nullable,
            }
        })
        .collect())
}

/// Reads `sp_helpindex`'s three-column result shape for `table`: the
/// primary key row is skipped (it is already covered by the primary
/// key query), each remaining row becomes one [`Index`].
async fn indexes_for(client: &mut SourceClient, table: &str) -> ConvertResult<Vec<Index>> {
    let statement = format!("EXEC sp_helpindex '{table}'");
    let stream = client.simple_query(&statement).await?;
    let rows = stream.into_first_result().await.unwrap_or_default();

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let name: &str = row.get(0)?;
            let description: &str = row.get(1)?;
            let keys: &str = row.get(2)?;
            if is_primary_key_description(description) {
                return None;
            }
            Some(Index {
                name: name.to_string(),
                is_unique: is_unique_description(description),
                columns: parse_index_keys(keys),
            })
        })
        .collect())
}

/// Introspects every table: columns, primary key, foreign keys, and
/// non-PK indexes, checking `coordinator` for cancellation between
/// tables and reporting `progress` as it goes (spec.md §4.1).
pub async fn introspect_tables(
    client: &mut SourceClient,
    coordinator: &ConversionCoordinator,
    progress: &dyn ProgressHandler,
    percent_range: (u8, u8),
) -> ConvertResult<Vec<Table>> {
    let names = table_names(client).await?;
    let total = names.len().max(1);
    let mut tables = Vec::with_capacity(names.len());

    for (i, name) in names.into_iter().enumerate() {
        coordinator.check_cancelled()?;

        let mut columns = columns_for(client, &name).await?;
        let collations = collation_for(client, &name).await?;
        for column in &mut columns {
            if let Some(sensitivity) = collations.get(&column.name) {
                column.case_sensitive = *sensitivity;
            }
        }
        let primary_key = primary_key_for(client, &name).await?;
        let foreign_keys = foreign_keys_for(client, &name).await?;
        let indexes = indexes_for(client, &name).await?;

        report_introspection_progress(progress, percent_range, i + 1, total, "table", &name);

        tables.push(Table {
            name,
            schema_name: "dbo".to_string(),
            columns,
            primary_key,
            foreign_keys,
            indexes,
        });
    }

    Ok(tables)
}

/// Reports progress once per table/view introspected, scaled into
/// `percent_range` (spec.md §4.1: 0-50% for tables, 50-100% for views).
fn report_introspection_progress(
    progress: &dyn ProgressHandler,
    percent_range: (u8, u8),
    done: usize,
    total: usize,
    kind: &str,
    name: &str,
) {
    let (start, end) = percent_range;
    let span = end.saturating_sub(start) as f64;
    let fraction = done as f64 / total as f64;
    let percent = (start as f64 + span * fraction).round() as u8;
    progress.on_progress(false, true, percent, &format!("introspected {kind} {name}"));
}

/// Introspects every view, stripping the `dbo.` qualifier from its
/// body (spec.md §4.1).
pub async fn introspect_views(
    client: &mut SourceClient,
    coordinator: &ConversionCoordinator,
    progress: &dyn ProgressHandler,
    percent_range: (u8, u8),
) -> ConvertResult<Vec<View>> {
    let rows = client
        .simple_query(VIEW_QUERY)
        .await?
        .into_first_result()
        .await?;

    let total = rows.len().max(1);
    let mut views = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        coordinator.check_cancelled()?;
        let name: &str = row.get(0).ok_or_else(|| ConvertError::Introspection {
            message: "view row missing TABLE_NAME".to_string(),
        })?;
        let definition: &str = row.get(1).unwrap_or_default();
        let view_name = strip_dbo_prefix(name);
        report_introspection_progress(progress, percent_range, i + 1, total, "view", &view_name);
        views.push(View {
            name: view_name,
            sql: strip_dbo_prefix(definition),
        });
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbo_prefix_is_stripped_from_bracketed_and_bare_forms() {
        assert_eq!(strip_dbo_prefix("SELECT * FROM [dbo].[Orders]"), "SELECT * FROM [Orders]");
        assert_eq!(strip_dbo_prefix("SELECT * FROM dbo.Orders"), "SELECT * FROM Orders");
    }

    #[test]
    fn collation_name_marks_case_sensitivity() {
        assert_eq!(
            case_sensitivity_from_collation("SQL_Latin1_General_CP1_CI_AS"),
            CaseSensitivity::CaseInsensitive
        );
        assert_eq!(
            case_sensitivity_from_collation("SQL_Latin1_General_CP1_CS_AS"),
            CaseSensitivity::CaseSensitive
        );
        assert_eq!(case_sensitivity_from_collation("BINARY"), CaseSensitivity::Unknown);
    }

    #[test]
    fn primary_key_rows_are_recognized_case_insensitively() {
        assert!(is_primary_key_description("PRIMARY KEY located on PRIMARY"));
        assert!(!is_primary_key_description("nonclustered, unique located on PRIMARY"));
    }

    #[test]
    fn unique_rows_are_recognized() {
        assert!(is_unique_description("nonclustered, unique located on PRIMARY"));
        assert!(!is_unique_description("nonclustered located on PRIMARY"));
    }

    #[test]
    fn index_keys_parses_descending_marker() {
        let columns = parse_index_keys("LastName, FirstName(-)");
        assert_eq!(
            columns,
            vec![
                IndexColumn { column_name: "LastName".into(), ascending: true },
                IndexColumn { column_name: "FirstName".into(), ascending: false },
            ]
        );
    }
}
