//! Conversion Orchestrator (C7): the public entry point that sequences
//! introspection, DDL emission, view/trigger synthesis, and row copy
//! against one fresh SQLite file.

use crate::convert::{copier, ddl, triggers};
use crate::coordinator::ConversionCoordinator;
use crate::error::ConvertResult;
use crate::handlers::{ProgressHandler, TableSelectionHandler, ViewFailureHandler};
use crate::schema::{Database, Table};
use crate::source::{connection, introspect};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Everything the caller controls about one run (spec.md §6).
pub struct ConvertOptions {
    pub source_connection_string: String,
    pub destination_path: String,
    /// Encrypts the destination with SQLCipher when set.
    pub destination_password: Option<String>,
    pub create_triggers: bool,
    pub create_views: bool,
}

/// Opens the destination for DDL (spec.md §6): deletes any existing
/// file, then sets the fixed connection parameters that only take
/// effect on an empty database - page size, UTF-16 encoding, and the
/// optional SQLCipher key. No other pragmas; spec.md §1 rules out any
/// page-layout tuning beyond these fixed parameters.
fn open_schema_connection(options: &ConvertOptions) -> ConvertResult<Connection> {
    let path = Path::new(&options.destination_path);
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    let conn = Connection::open(path)?;

    if let Some(password) = &options.destination_password {
        conn.execute_batch(&format!("PRAGMA key = '{password}';"))?;
    }

    conn.execute_batch(
        "PRAGMA page_size = 4096; \
         PRAGMA encoding = 'UTF-16';",
    )?;

    Ok(conn)
}

/// Reopens the destination for row copy and trigger creation (spec.md
/// §5): the schema connection must already be closed, since SQLite
/// only applies `page_size`/`encoding` to an empty file. The SQLCipher
/// key has to be reissued on every new connection to an encrypted file.
fn open_copy_connection(options: &ConvertOptions) -> ConvertResult<Connection> {
    let conn = Connection::open(&options.destination_path)?;

    if let Some(password) = &options.destination_password {
        conn.execute_batch(&format!("PRAGMA key = '{password}';"))?;
    }

    Ok(conn)
}

fn select_tables(
    tables: Vec<Table>,
    handler: Option<&dyn TableSelectionHandler>,
) -> Vec<Table> {
    match handler.and_then(|h| h.select_tables(&tables)) {
        Some(replacement) => replacement,
        None => tables,
    }
}

/// Runs one full migration (spec.md §6): deletes any existing
/// destination file, introspects the source, lets `table_selection`
/// narrow the table list, emits DDL, optionally creates views and FK
/// triggers, copies every row, and reports progress throughout via
/// `progress`. Cancellation (`coordinator.cancel()`) is observed between
/// tables, between views, and between row batches.
pub async fn convert(
    options: ConvertOptions,
    coordinator: Arc<ConversionCoordinator>,
    progress: &dyn ProgressHandler,
    table_selection: Option<&dyn TableSelectionHandler>,
    view_failure: Option<&dyn ViewFailureHandler>,
) -> ConvertResult<()> {
    coordinator.begin();
    let result = run(options, &coordinator, progress, table_selection, view_failure).await;
    coordinator.end();

    match &result {
        Ok(()) => progress.on_progress(true, true, 100, "conversion complete"),
        Err(e) if e.is_cancelled() => progress.on_progress(true, false, 100, "conversion cancelled"),
        Err(e) => progress.on_progress(true, false, 100, &e.to_string()),
    }

    result
}

async fn run(
    options: ConvertOptions,
    coordinator: &ConversionCoordinator,
    progress: &dyn ProgressHandler,
    table_selection: Option<&dyn TableSelectionHandler>,
    view_failure: Option<&dyn ViewFailureHandler>,
) -> ConvertResult<()> {
    progress.on_progress(false, true, 0, "connecting to source");
    let mut source = connection::connect(&options.source_connection_string).await?;

    coordinator.check_cancelled()?;
    // Introspection reports 0-50% for tables and 50-100% for views when
    // views are requested, 0-100% for tables alone otherwise (spec.md §4.1).
    let table_range = if options.create_views { (0, 50) } else { (0, 100) };
    let tables = introspect::introspect_tables(&mut source, coordinator, progress, table_range).await?;
    let views = if options.create_views {
        introspect::introspect_views(&mut source, coordinator, progress, (50, 100)).await?
    } else {
        Vec::new()
    };

    let tables = select_tables(tables, table_selection);
    let database = Database { tables, views };

    coordinator.check_cancelled()?;
    progress.on_progress(false, true, 10, "preparing destination");
    let schema_conn = open_schema_connection(&options)?;

    progress.on_progress(false, true, 15, "creating tables");
    let table_count = database.tables.len().max(1);
    for (i, table) in database.tables.iter().enumerate() {
        coordinator.check_cancelled()?;
        ddl::create_table(&schema_conn, table)?;
        let percent = 15 + (35 * (i + 1) / table_count) as u8;
        progress.on_progress(false, true, percent, &format!("created table {}", table.name));
    }

    if options.create_views {
        progress.on_progress(false, true, 50, "creating views");
        for view in &database.views {
            coordinator.check_cancelled()?;
            ddl::create_view(&schema_conn, view, view_failure)?;
        }
    }

    // The schema connection must be fully closed before the copy
    // connection opens (spec.md §5): `page_size`/`encoding` only take
    // effect on an empty file, so the two must never overlap.
    drop(schema_conn);
    let dest = open_copy_connection(&options)?;

    progress.on_progress(false, true, 55, "copying rows");
    for (i, table) in database.tables.iter().enumerate() {
        coordinator.check_cancelled()?;
        let start = 55 + (30 * i / table_count) as u8;
        let end = 55 + (30 * (i + 1) / table_count) as u8;
        copier::copy_table(&mut source, &dest, table, coordinator, progress, (start, end)).await?;
    }

    if options.create_triggers {
        progress.on_progress(false, true, 90, "synthesizing foreign key triggers");
        for table in &database.tables {
            coordinator.check_cancelled()?;
            for fk in &table.foreign_keys {
                for trigger in triggers::synthesize(fk) {
                    ddl::create_trigger(&dest, &trigger)?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_tables_keeps_original_when_handler_returns_none() {
        struct KeepAll;
        impl TableSelectionHandler for KeepAll {
            fn select_tables(&self, _tables: &[Table]) -> Option<Vec<Table>> {
                None
            }
        }
        let tables = vec![Table {
            name: "T".into(),
            schema_name: "dbo".into(),
            columns: vec![],
            primary_key: vec![],
            foreign_keys: vec![],
            indexes: vec![],
        }];
        let result = select_tables(tables.clone(), Some(&KeepAll));
        assert_eq!(result, tables);
    }

    #[test]
    fn select_tables_narrows_when_handler_replaces() {
        struct DropAll;
        impl TableSelectionHandler for DropAll {
            fn select_tables(&self, _tables: &[Table]) -> Option<Vec<Table>> {
                Some(vec![])
            }
        }
        let tables = vec![Table {
            name: "T".into(),
            schema_name: "dbo".into(),
            columns: vec![],
            primary_key: vec![],
            foreign_keys: vec![],
            indexes: vec![],
        }];
        let result = select_tables(tables, Some(&DropAll));
        assert!(result.is_empty());
    }

    #[test]
    fn no_handler_keeps_original() {
        let tables = vec![Table {
            name: "T".into(),
            schema_name: "dbo".into(),
            columns: vec![],
            primary_key: vec![],
            foreign_keys: vec![],
            indexes: vec![],
        }];
        let result = select_tables(tables.clone(), None);
        assert_eq!(result, tables);
    }
}
