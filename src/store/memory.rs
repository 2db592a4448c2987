//! In-memory store for tests and database-free runs.

use super::{Filter, Record, Store};
use crate::config::{ColumnInfo, ColumnKind, TableSchema};
use crate::error::StoreError;
use crate::pagination::PageWindow;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct TableData {
    next_id: i64,
    rows: BTreeMap<i64, Record>,
}

/// Tables keyed by name, rows ordered by id. Enforces not-null, unique and
/// foreign-key constraints the way a database would, so constraint errors
/// surface identically to [`super::PgStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, TableData>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(format!("store lock poisoned: {}", e))
}

/// Numeric values are kept as text at the column's scale, matching what
/// PostgreSQL returns for `numeric(p,s)`.
fn stored_value(col: &ColumnInfo, v: Value) -> Value {
    if col.kind != ColumnKind::Numeric {
        return v;
    }
    let parsed = match &v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match (parsed, numeric_scale(&col.pg_type)) {
        (Some(f), Some(scale)) => Value::String(format!("{:.*}", scale, f)),
        (_, None) => match v {
            Value::Number(n) => Value::String(n.to_string()),
            other => other,
        },
        (None, Some(_)) => v,
    }
}

/// Scale of a `numeric(p,s)` type name.
fn numeric_scale(pg_type: &str) -> Option<usize> {
    let (_, params) = pg_type.split_once('(')?;
    params.trim_end_matches(')').split(',').nth(1)?.trim().parse().ok()
}

fn check_constraints(
    tables: &HashMap<String, TableData>,
    table: &TableSchema,
    id: i64,
    row: &Record,
) -> Result<(), StoreError> {
    for col in &table.columns {
        if !col.nullable && col.name != table.primary_key && row.get(&col.name).map_or(true, Value::is_null) {
            return Err(StoreError::Constraint(format!(
                "null value in column \"{}\" of relation \"{}\"",
                col.name, table.name
            )));
        }
    }

    if let Some(data) = tables.get(&table.name) {
        for group in &table.unique {
            let values: Vec<&Value> = group.iter().map(|c| row.get(c).unwrap_or(&Value::Null)).collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            let clash = data.rows.iter().any(|(other_id, other)| {
                *other_id != id
                    && group
                        .iter()
                        .zip(&values)
                        .all(|(c, v)| other.get(c).unwrap_or(&Value::Null) == *v)
            });
            if clash {
                return Err(StoreError::Constraint(format!(
                    "duplicate key value violates unique constraint on {}({})",
                    table.name,
                    group.join(", ")
                )));
            }
        }
    }

    for fk in &table.foreign_keys {
        let Some(value) = row.get(&fk.column).filter(|v| !v.is_null()) else {
            continue;
        };
        let found = tables
            .get(&fk.references_table)
            .is_some_and(|data| data.rows.values().any(|r| r.get(&fk.references_column) == Some(value)));
        if !found {
            return Err(StoreError::Constraint(format!(
                "insert or update on table \"{}\" violates foreign key constraint on \"{}\"",
                table.name, fk.column
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch(&self, table: &TableSchema, id: i64) -> Result<Option<Record>, StoreError> {
        let tables = self.tables.read().map_err(lock_err)?;
        Ok(tables.get(&table.name).and_then(|t| t.rows.get(&id)).cloned())
    }

    async fn list(
        &self,
        table: &TableSchema,
        filter: Option<&Filter>,
        window: PageWindow,
    ) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().map_err(lock_err)?;
        let Some(data) = tables.get(&table.name) else {
            return Ok(Vec::new());
        };
        let skip = usize::try_from(window.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(window.limit()).unwrap_or(usize::MAX);
        Ok(data
            .rows
            .values()
            .filter(|row| filter.map_or(true, |f| f.matches(row)))
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn count(&self, table: &TableSchema, filter: Option<&Filter>) -> Result<u64, StoreError> {
        let tables = self.tables.read().map_err(lock_err)?;
        let n = tables.get(&table.name).map_or(0, |data| {
            data.rows
                .values()
                .filter(|row| filter.map_or(true, |f| f.matches(row)))
                .count()
        });
        Ok(n as u64)
    }

    async fn insert(&self, table: &TableSchema, record: &Record) -> Result<Record, StoreError> {
        let mut tables = self.tables.write().map_err(lock_err)?;
        let next_id = tables.get(&table.name).map_or(1, |t| t.next_id.max(1));
        let id = match record.get(&table.primary_key) {
            Some(v) if !v.is_null() => v.as_i64().ok_or_else(|| {
                StoreError::Constraint(format!("{}.{} must be an integer", table.name, table.primary_key))
            })?,
            _ => next_id,
        };
        if tables.get(&table.name).is_some_and(|t| t.rows.contains_key(&id)) {
            return Err(StoreError::Constraint(format!(
                "duplicate key value violates primary key of {} ({} = {})",
                table.name, table.primary_key, id
            )));
        }

        let mut row = Record::new();
        for col in &table.columns {
            let value = record
                .get(&col.name)
                .cloned()
                .or_else(|| col.default.clone())
                .unwrap_or(Value::Null);
            row.insert(col.name.clone(), stored_value(col, value));
        }
        row.insert(table.primary_key.clone(), Value::from(id));
        check_constraints(&tables, table, id, &row)?;

        let data = tables.entry(table.name.clone()).or_default();
        data.next_id = data.next_id.max(id + 1);
        data.rows.insert(id, row.clone());
        tracing::debug!(table = %table.name, id, "inserted row");
        Ok(row)
    }

    async fn update(&self, table: &TableSchema, id: i64, changes: &Record) -> Result<Option<Record>, StoreError> {
        let mut tables = self.tables.write().map_err(lock_err)?;
        let Some(mut row) = tables.get(&table.name).and_then(|t| t.rows.get(&id)).cloned() else {
            return Ok(None);
        };
        for (k, v) in changes {
            if *k == table.primary_key {
                continue;
            }
            if let Some(col) = table.column(k) {
                row.insert(k.clone(), stored_value(col, v.clone()));
            }
        }
        check_constraints(&tables, table, id, &row)?;
        if let Some(data) = tables.get_mut(&table.name) {
            data.rows.insert(id, row.clone());
        }
        tracing::debug!(table = %table.name, id, "updated row");
        Ok(Some(row))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.tables.read().map(|_| ()).map_err(lock_err)
    }
}
