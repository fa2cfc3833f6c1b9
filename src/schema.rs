//! Dialect-neutral schema model (C1).
//!
//! Every type here is plain data: introspection (C2) builds it, the
//! mapper (C3) normalizes string fields in place as it builds it, and
//! the emitter/copier/trigger synthesizer (C4-C6) only ever read it.

use serde::{Deserialize, Serialize};

/// Tri-state case sensitivity. Absent collation information must never
/// be silently treated as case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseSensitivity {
    CaseSensitive,
    CaseInsensitive,
    Unknown,
}

impl CaseSensitivity {
    pub fn is_case_insensitive(&self) -> bool {
        matches!(self, CaseSensitivity::CaseInsensitive)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Lowercased source type token, already mapped through C3's type table.
    pub source_type: String,
    /// 0 means unspecified.
    pub length: i64,
    pub nullable: bool,
    /// Empty string means "no default".
    pub default_expr: String,
    pub is_identity: bool,
    pub case_sensitive: CaseSensitivity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table_name: String,
    pub column_name: String,
    pub foreign_table_name: String,
    pub foreign_column_name: String,
    pub cascade_on_delete: bool,
    /// Mirrors the owning column's nullability; used by the trigger synthesizer.
    pub is_nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub column_name: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub is_unique: bool,
    pub columns: Vec<IndexColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Source-side namespace (e.g. "dbo").
    pub schema_name: String,
    /// Ordinal order, preserved from the source's ORDINAL_POSITION.
    pub columns: Vec<Column>,
    /// Ordered primary-key column names.
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<Index>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerTiming {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    pub table: String,
    /// Raw SQL fragment executed inside BEGIN ... END.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    /// Source DDL body, after dialect-neutralizing rewrites.
    pub sql: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub tables: Vec<Table>,
    pub views: Vec<View>,
}

impl Database {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}
