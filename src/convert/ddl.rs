//! DDL Emitter (C4): renders the schema model into SQLite statements and
//! executes them against the destination connection.

use crate::convert::defaults;
use crate::convert::types::{emission_type, is_integral_type};
use crate::error::{ConvertError, ConvertResult};
use crate::handlers::ViewFailureHandler;
use crate::schema::{CaseSensitivity, Column, Index, Table, Trigger, TriggerEvent, TriggerTiming,
    View};
use rusqlite::Connection;

/// True iff `column` qualifies for `integer PRIMARY KEY AUTOINCREMENT`
/// (spec.md §4.2): single-column PK, identity, integral source type.
fn is_autoincrement_column(table: &Table, column: &Column) -> bool {
    column.is_identity
        && table.primary_key.len() == 1
        && table.primary_key[0] == column.name
        && is_integral_type(&column.source_type)
}

fn column_type_token(column: &Column) -> String {
    if column.is_identity {
        // Any identity column is stored as `integer`, whether or not it
        // ends up autoincrementing (spec.md §9's documented asymmetry).
        "integer".to_string()
    } else {
        emission_type(&column.source_type).to_string()
    }
}

fn column_definition(column: &Column, autoincrement: bool) -> ConvertResult<String> {
    let type_token = column_type_token(column);
    let mut def = format!("\t[{}] {}", column.name, type_token);
    if column.length > 0 {
        def.push_str(&format!("({})", column.length));
    }
    if autoincrement {
        def.push_str(" PRIMARY KEY AUTOINCREMENT");
    }
    if !column.nullable {
        def.push_str(" NOT NULL");
    }
    if column.case_sensitive == CaseSensitivity::CaseInsensitive {
        def.push_str(" COLLATE NOCASE");
    }
    let normalized = defaults::normalize(&column.source_type, &column.default_expr);
    if let Some(clause) = defaults::default_clause(&normalized) {
        def.push_str(&format!(" DEFAULT {clause}"));
    }
    Ok(def)
}

/// Renders the `CREATE TABLE` statement for `table` (spec.md §4.3).
pub fn create_table_sql(table: &Table) -> ConvertResult<String> {
    let any_autoincrement = table
        .columns
        .iter()
        .any(|c| is_autoincrement_column(table, c));

    let mut lines = Vec::new();
    for column in &table.columns {
        lines.push(column_definition(column, is_autoincrement_column(table, column))?);
    }

    if !table.primary_key.is_empty() && !any_autoincrement {
        let cols = table
            .primary_key
            .iter()
            .map(|c| format!("[{c}]"))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("\tPRIMARY KEY ({cols})"));
    }

    for fk in &table.foreign_keys {
        lines.push(format!(
            "\tFOREIGN KEY ([{}]) REFERENCES [{}]([{}])",
            fk.column_name, fk.foreign_table_name, fk.foreign_column_name
        ));
    }

    Ok(format!(
        "CREATE TABLE [{}] (\n{}\n);",
        table.name,
        lines.join(",\n")
    ))
}

/// Renders the `CREATE INDEX` statement for one of `table`'s non-PK
/// indexes (spec.md §4.3).
pub fn create_index_sql(table: &Table, index: &Index) -> String {
    let unique = if index.is_unique { "UNIQUE " } else { "" };
    let cols = index
        .columns
        .iter()
        .map(|c| {
            if c.ascending {
                format!("[{}]", c.column_name)
            } else {
                format!("[{}] DESC", c.column_name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE {unique}INDEX [{}_{}] ON [{}] ({cols});",
        table.name, index.name, table.name
    )
}

/// Wraps `trigger` as `CREATE TRIGGER ... BEGIN ... END;` (spec.md §4.6).
pub fn create_trigger_sql(trigger: &Trigger) -> String {
    let timing = match trigger.timing {
        TriggerTiming::Before => "BEFORE",
        TriggerTiming::After => "AFTER",
    };
    let event = match trigger.event {
        TriggerEvent::Insert => "INSERT",
        TriggerEvent::Update => "UPDATE",
        TriggerEvent::Delete => "DELETE",
    };
    format!(
        "CREATE TRIGGER [{}] {timing} {event} ON [{}] BEGIN {} END;",
        trigger.name, trigger.table, trigger.body
    )
}

/// Executes the `CREATE TABLE` plus all of its non-PK `CREATE INDEX`
/// statements against `conn`.
pub fn create_table(conn: &Connection, table: &Table) -> ConvertResult<()> {
    let sql = create_table_sql(table)?;
    conn.execute(&sql, []).map_err(|e| ConvertError::Ddl {
        object: format!("table {}", table.name),
        message: e.to_string(),
    })?;

    for index in &table.indexes {
        let sql = create_index_sql(table, index);
        conn.execute(&sql, []).map_err(|e| ConvertError::Ddl {
            object: format!("index {} on {}", index.name, table.name),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

/// Executes `trigger` against `conn` (spec.md §4.6).
pub fn create_trigger(conn: &Connection, trigger: &Trigger) -> ConvertResult<()> {
    let sql = create_trigger_sql(trigger);
    conn.execute(&sql, []).map_err(|e| ConvertError::Ddl {
        object: format!("trigger {}", trigger.name),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Executes `view`'s DDL verbatim. On failure, consults `handler`: a
/// replacement DDL string is retried recursively, `None` discards the
/// view. No handler installed makes the failure fatal (spec.md §4.3).
pub fn create_view(
    conn: &Connection,
    view: &View,
    handler: Option<&dyn ViewFailureHandler>,
) -> ConvertResult<bool> {
    match conn.execute_batch(&view.sql) {
        Ok(()) => Ok(true),
        Err(e) => match handler {
            Some(handler) => match handler.on_view_failed(view, &e.to_string()) {
                Some(replacement) => {
                    let retried = View {
                        name: view.name.clone(),
                        sql: replacement,
                    };
                    create_view(conn, &retried, Some(handler))
                }
                None => Ok(false),
            },
            None => Err(ConvertError::Ddl {
                object: format!("view {}", view.name),
                message: e.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ForeignKey, IndexColumn};

    fn int_column(name: &str, identity: bool) -> Column {
        Column {
            name: name.to_string(),
            source_type: "int".to_string(),
            length: 0,
            nullable: false,
            default_expr: String::new(),
            is_identity: identity,
            case_sensitive: CaseSensitivity::Unknown,
        }
    }

    #[test]
    fn integer_identity_pk_emits_autoincrement_with_no_trailing_pk_clause() {
        let table = Table {
            name: "T".into(),
            schema_name: "dbo".into(),
            columns: vec![
                int_column("id", true),
                Column {
                    name: "name".into(),
                    // Already mapped through map_source_type (nvarchar -> varchar);
                    // Column.source_type always holds the post-mapping stored type.
                    source_type: "varchar".into(),
                    length: 50,
                    nullable: false,
                    default_expr: String::new(),
                    is_identity: false,
                    case_sensitive: CaseSensitivity::Unknown,
                },
            ],
            primary_key: vec!["id".into()],
            foreign_keys: vec![],
            indexes: vec![],
        };
        let sql = create_table_sql(&table).unwrap();
        assert!(sql.contains("[id] integer PRIMARY KEY AUTOINCREMENT"));
        assert!(!sql.contains("PRIMARY KEY ([id])"));
        assert!(sql.contains("[name] varchar(50) NOT NULL"));
    }

    #[test]
    fn composite_pk_with_identity_keeps_standalone_pk_clause() {
        let table = Table {
            name: "T".into(),
            schema_name: "dbo".into(),
            columns: vec![int_column("a", true), int_column("b", false)],
            primary_key: vec!["a".into(), "b".into()],
            foreign_keys: vec![],
            indexes: vec![],
        };
        let sql = create_table_sql(&table).unwrap();
        assert!(sql.contains("[a] integer NOT NULL"));
        assert!(!sql.contains("AUTOINCREMENT"));
        assert!(sql.contains("PRIMARY KEY ([a], [b])"));
    }

    #[test]
    fn foreign_key_clause_has_no_cascade() {
        let table = Table {
            name: "T".into(),
            schema_name: "dbo".into(),
            columns: vec![int_column("parent_id", false)],
            primary_key: vec![],
            foreign_keys: vec![ForeignKey {
                table_name: "T".into(),
                column_name: "parent_id".into(),
                foreign_table_name: "P".into(),
                foreign_column_name: "id".into(),
                cascade_on_delete: true,
                is_nullable: false,
            }],
            indexes: vec![],
        };
        let sql = create_table_sql(&table).unwrap();
        assert!(sql.contains("FOREIGN KEY ([parent_id]) REFERENCES [P]([id])"));
        assert!(!sql.to_uppercase().contains("CASCADE"));
    }

    #[test]
    fn index_sql_names_and_orders_correctly() {
        let table = Table {
            name: "T".into(),
            schema_name: "dbo".into(),
            columns: vec![],
            primary_key: vec![],
            foreign_keys: vec![],
            indexes: vec![],
        };
        let index = Index {
            name: "ix_name".into(),
            is_unique: true,
            columns: vec![
                IndexColumn {
                    column_name: "a".into(),
                    ascending: true,
                },
                IndexColumn {
                    column_name: "b".into(),
                    ascending: false,
                },
            ],
        };
        let sql = create_index_sql(&table, &index);
        assert_eq!(
            sql,
            "CREATE UNIQUE INDEX [T_ix_name] ON [T] ([a], [b] DESC);"
        );
    }

    #[test]
    fn view_failure_handler_replacement_is_retried() {
        let conn = Connection::open_in_memory().unwrap();
        let view = View {
            name: "v".into(),
            sql: "CREATE VIEW v AS SELEKT 1;".into(),
        };

        struct Replace;
        impl ViewFailureHandler for Replace {
            fn on_view_failed(&self, _view: &View, _err: &str) -> Option<String> {
                Some("CREATE VIEW v AS SELECT 1;".into())
            }
        }

        let created = create_view(&conn, &view, Some(&Replace)).unwrap();
        assert!(created);
    }

    #[test]
    fn view_failure_handler_discard_returns_false() {
        let conn = Connection::open_in_memory().unwrap();
        let view = View {
            name: "v".into(),
            sql: "CREATE VIEW v AS SELEKT 1;".into(),
        };

        struct Discard;
        impl ViewFailureHandler for Discard {
            fn on_view_failed(&self, _view: &View, _err: &str) -> Option<String> {
                None
            }
        }

        let created = create_view(&conn, &view, Some(&Discard)).unwrap();
        assert!(!created);
    }

    #[test]
    fn view_failure_with_no_handler_is_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        let view = View {
            name: "v".into(),
            sql: "CREATE VIEW v AS SELEKT 1;".into(),
        };
        let err = create_view(&conn, &view, None).unwrap_err();
        assert!(matches!(err, ConvertError::Ddl { .. }));
    }
}
