//! Builds parameterized INSERT, SELECT, UPDATE and COUNT from a resolved table.

use crate::config::{ColumnInfo, ColumnKind, TableSchema};
use crate::pagination::PageWindow;
use crate::store::{Filter, Record};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Placeholder with a cast to the column's type so untyped binds land correctly.
    fn placeholder(&mut self, col: Option<&ColumnInfo>, v: Value) -> String {
        let n = self.push_param(v);
        match col {
            Some(c) => format!("${}::{}", n, c.pg_type),
            None => format!("${}", n),
        }
    }
}

/// SELECT list: numeric as col::text so decimals survive the trip as strings.
fn select_column_list(table: &TableSchema) -> String {
    table
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            if c.kind == ColumnKind::Numeric {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(q: &mut QueryBuf, table: &TableSchema, filter: Option<&Filter>) -> String {
    match filter {
        Some(f) => {
            let ph = q.placeholder(table.column(&f.column), f.value.clone());
            format!(" WHERE {} = {}", quoted(&f.column), ph)
        }
        None => String::new(),
    }
}

/// SELECT by primary key.
pub fn select_by_id(table: &TableSchema, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Value::from(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}",
        select_column_list(table),
        quoted(&table.name),
        quoted(&table.primary_key),
        n
    );
    q
}

/// SELECT with optional equality filter, ORDER BY pk, LIMIT/OFFSET from the window.
pub fn select_list(table: &TableSchema, filter: Option<&Filter>, window: PageWindow) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_ = where_clause(&mut q, table, filter);
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
        select_column_list(table),
        quoted(&table.name),
        where_,
        quoted(&table.primary_key),
        window.limit(),
        window.offset()
    );
    q
}

/// COUNT(*) with optional equality filter.
pub fn count(table: &TableSchema, filter: Option<&Filter>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_ = where_clause(&mut q, table, filter);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(&table.name), where_);
    q
}

/// INSERT the columns present in `record`; absent columns take their DB default.
pub fn insert(table: &TableSchema, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &table.columns {
        let Some(val) = record.get(&c.name) else { continue };
        placeholders.push(q.placeholder(Some(c), val.clone()));
        cols.push(quoted(&c.name));
    }
    let returning = select_column_list(table);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", quoted(&table.name), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            quoted(&table.name),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only columns present in `changes` (never the pk).
/// With nothing to set this degrades to a SELECT by id.
pub fn update(table: &TableSchema, id: i64, changes: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &table.columns {
        if c.name == table.primary_key {
            continue;
        }
        let Some(val) = changes.get(&c.name) else { continue };
        let rhs = q.placeholder(Some(c), val.clone());
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
    }
    if sets.is_empty() {
        return select_by_id(table, id);
    }
    let id_param = q.push_param(Value::from(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        quoted(&table.name),
        sets.join(", "),
        quoted(&table.primary_key),
        id_param,
        select_column_list(table)
    );
    q
}
