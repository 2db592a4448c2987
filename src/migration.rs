//! Create the configured tables: columns, identity primary key, NOT NULL, DEFAULT,
//! UNIQUE and FOREIGN KEY constraints. Tables are created in foreign-key dependency
//! order so every inline reference points at an existing table.

use crate::config::{Registry, TableSchema};
use crate::error::{AppError, ConfigError, StoreError};
use crate::sql::quoted;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashSet;

/// `CREATE TABLE IF NOT EXISTS` for every table in the registry. Idempotent.
pub async fn apply_migrations(pool: &PgPool, registry: &Registry) -> Result<(), AppError> {
    for table in migration_order(registry)? {
        let sql = create_table_sql(table);
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await.map_err(StoreError::from)?;
        tracing::info!(table = %table.name, "table ready");
    }
    Ok(())
}

/// Referenced tables before referencing ones; self-references are allowed.
pub fn migration_order(registry: &Registry) -> Result<Vec<&TableSchema>, ConfigError> {
    let mut ordered: Vec<&TableSchema> = Vec::with_capacity(registry.tables.len());
    let mut placed: HashSet<&str> = HashSet::new();
    let mut pending: Vec<&TableSchema> = registry.tables.iter().map(|t| t.as_ref()).collect();

    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|t| {
            let t: &TableSchema = *t;
            let ready = t
                .foreign_keys
                .iter()
                .all(|fk| fk.references_table == t.name || placed.contains(fk.references_table.as_str()));
            if ready {
                placed.insert(t.name.as_str());
                ordered.push(t);
            }
            !ready
        });
        if pending.len() == before {
            let names: Vec<&str> = pending.iter().map(|t| t.name.as_str()).collect();
            return Err(ConfigError::Validation(format!(
                "foreign keys form a cycle between tables: {}",
                names.join(", ")
            )));
        }
    }
    Ok(ordered)
}

fn literal(v: &Value) -> String {
    match v {
        Value::Null => "NULL".into(),
        Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Array(_) | Value::Object(_) => format!("'{}'::jsonb", v.to_string().replace('\'', "''")),
    }
}

pub fn create_table_sql(t: &TableSchema) -> String {
    let mut defs: Vec<String> = Vec::with_capacity(t.columns.len() + t.unique.len() + t.foreign_keys.len() + 1);
    for c in &t.columns {
        let mut def = format!("{} {}", quoted(&c.name), c.pg_type);
        if c.name == t.primary_key {
            def.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        } else {
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(d) = &c.default {
                def.push_str(" DEFAULT ");
                def.push_str(&literal(d));
            }
        }
        defs.push(def);
    }
    defs.push(format!("PRIMARY KEY ({})", quoted(&t.primary_key)));
    for u in &t.unique {
        let cols: Vec<String> = u.iter().map(|s| quoted(s)).collect();
        defs.push(format!("UNIQUE ({})", cols.join(", ")));
    }
    for fk in &t.foreign_keys {
        defs.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            quoted(&fk.column),
            quoted(&fk.references_table),
            quoted(&fk.references_column)
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quoted(&t.name),
        defs.join(",\n  ")
    )
}
