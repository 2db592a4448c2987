//! Resolved entity model: config validated and flattened for runtime use.
//! Built once at startup and shared read-only by every request.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::UpdatePolicy;

/// Storage kind of a column; drives request type checks and SQL casts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Numeric,
    Text,
    Boolean,
    Timestamp,
    Date,
    Json,
}

impl ColumnKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "an integer",
            ColumnKind::Float | ColumnKind::Numeric => "a number",
            ColumnKind::Text => "a string",
            ColumnKind::Boolean => "a boolean",
            ColumnKind::Timestamp => "a timestamp",
            ColumnKind::Date => "a date",
            ColumnKind::Json => "JSON",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    /// PostgreSQL type name for casts and DDL (e.g. "varchar(120)", "numeric(10,2)").
    pub pg_type: String,
    pub nullable: bool,
    pub default: Option<Value>,
    /// Length bound implied by a `varchar(n)` type.
    pub max_length: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct ForeignKey {
    pub column: String,
    /// Table name (not config id) of the referenced table.
    pub references_table: String,
    pub references_column: String,
}

/// Storage shape of one table.
#[derive(Clone, Debug)]
pub struct TableSchema {
    pub id: String,
    pub name: String,
    pub primary_key: String,
    pub columns: Vec<ColumnInfo>,
    pub unique: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Field constraints checked before a request reaches the store.
#[derive(Clone, Debug, Default)]
pub struct FieldRule {
    pub format: Option<String>,
    pub max_length: Option<u32>,
    pub min_length: Option<u32>,
    pub pattern: Option<Regex>,
    pub allowed: Option<Vec<Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub required: bool,
    pub rule: FieldRule,
}

/// One representation of an entity: the fields it accepts (create/update/patch) or exposes (read).
#[derive(Clone, Debug, Default)]
pub struct SchemaRole {
    pub fields: Vec<FieldSpec>,
}

impl SchemaRole {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// One-to-many relation exposed as `/{parent}/{id}/{path_segment}`.
#[derive(Clone, Debug)]
pub struct ChildRef {
    pub relationship_name: String,
    /// Column on the child table holding the parent id.
    pub foreign_key_field: String,
    pub path_segment: String,
    pub child: Arc<EntityDescriptor>,
}

#[derive(Clone, Debug)]
pub struct EntityDescriptor {
    /// Type name used in messages, e.g. "MediaType".
    pub name: String,
    /// Plural URL path segment, e.g. "media_types".
    pub path_segment: String,
    pub id_field: String,
    pub table: Arc<TableSchema>,
    pub create: SchemaRole,
    pub read: SchemaRole,
    pub update: SchemaRole,
    pub patch: SchemaRole,
    pub update_policy: UpdatePolicy,
    pub children: Vec<ChildRef>,
}

impl EntityDescriptor {
    pub fn singular(&self) -> String {
        crate::naming::singular(&self.path_segment)
    }

    pub fn tag(&self) -> String {
        crate::naming::tag(&self.path_segment)
    }
}

/// Every resolved entity and table, keyed for startup-time lookups.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    pub entities: Vec<Arc<EntityDescriptor>>,
    pub entity_by_path: HashMap<String, Arc<EntityDescriptor>>,
    pub tables: Vec<Arc<TableSchema>>,
}

impl Registry {
    pub fn entity_by_path(&self, path: &str) -> Option<&Arc<EntityDescriptor>> {
        self.entity_by_path.get(path)
    }

    pub fn table(&self, name: &str) -> Option<&Arc<TableSchema>> {
        self.tables.iter().find(|t| t.name == name)
    }
}
