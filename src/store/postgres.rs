//! PostgreSQL store: builds SQL from the table schema, binds JSON values, decodes rows by column kind.

use super::{Filter, Record, Store};
use crate::config::{ColumnKind, TableSchema};
use crate::error::StoreError;
use crate::pagination::PageWindow;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{ConnectOptions, PgPool, Row};
use std::str::FromStr;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    /// Connection is checked out per call and returned to the pool on drop.
    async fn fetch_optional(&self, table: &TableSchema, q: &QueryBuf) -> Result<Option<Record>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut conn = self.pool.acquire().await?;
        let row = bind_all(&q.sql, &q.params).fetch_optional(&mut *conn).await?;
        row.map(|r| row_to_record(table, &r)).transpose()
    }

    async fn fetch_all(&self, table: &TableSchema, q: &QueryBuf) -> Result<Vec<Record>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut conn = self.pool.acquire().await?;
        let rows = bind_all(&q.sql, &q.params).fetch_all(&mut *conn).await?;
        rows.iter().map(|r| row_to_record(table, r)).collect()
    }
}

fn bind_all<'q>(
    sql: &'q str,
    params: &[Value],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    let mut query = sqlx::query(sql);
    for p in params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

#[async_trait]
impl Store for PgStore {
    async fn fetch(&self, table: &TableSchema, id: i64) -> Result<Option<Record>, StoreError> {
        self.fetch_optional(table, &sql::select_by_id(table, id)).await
    }

    async fn list(
        &self,
        table: &TableSchema,
        filter: Option<&Filter>,
        window: PageWindow,
    ) -> Result<Vec<Record>, StoreError> {
        self.fetch_all(table, &sql::select_list(table, filter, window)).await
    }

    async fn count(&self, table: &TableSchema, filter: Option<&Filter>) -> Result<u64, StoreError> {
        let q = sql::count(table, filter);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut conn = self.pool.acquire().await?;
        let n: i64 = bind_all(&q.sql, &q.params).fetch_one(&mut *conn).await?.try_get(0)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn insert(&self, table: &TableSchema, record: &Record) -> Result<Record, StoreError> {
        self.fetch_optional(table, &sql::insert(table, record))
            .await?
            .ok_or_else(|| StoreError::Backend(format!("insert into {} returned no row", table.name)))
    }

    async fn update(&self, table: &TableSchema, id: i64, changes: &Record) -> Result<Option<Record>, StoreError> {
        self.fetch_optional(table, &sql::update(table, id, changes)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }
}

fn row_to_record(table: &TableSchema, row: &PgRow) -> Result<Record, StoreError> {
    let mut map = Record::new();
    for col in &table.columns {
        let v = cell_to_value(row, &col.name, col.kind)?;
        map.insert(col.name.clone(), v);
    }
    Ok(map)
}

fn number(f: f64) -> Value {
    serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
}

fn cell_to_value(row: &PgRow, name: &str, kind: ColumnKind) -> Result<Value, StoreError> {
    let v = match kind {
        ColumnKind::Integer => {
            if let Ok(v) = row.try_get::<Option<i64>, _>(name) {
                v.map(Value::from)
            } else if let Ok(v) = row.try_get::<Option<i32>, _>(name) {
                v.map(Value::from)
            } else {
                row.try_get::<Option<i16>, _>(name)?.map(Value::from)
            }
        }
        ColumnKind::Float => {
            if let Ok(v) = row.try_get::<Option<f64>, _>(name) {
                v.map(number)
            } else {
                row.try_get::<Option<f32>, _>(name)?.map(|f| number(f as f64))
            }
        }
        // selected as ::text
        ColumnKind::Numeric | ColumnKind::Text => row.try_get::<Option<String>, _>(name)?.map(Value::String),
        ColumnKind::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        ColumnKind::Timestamp => {
            if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
                v.map(|d| Value::String(d.to_rfc3339()))
            } else {
                row.try_get::<Option<chrono::NaiveDateTime>, _>(name)?
                    .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            }
        }
        ColumnKind::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        ColumnKind::Json => row.try_get::<Option<Value>, _>(name)?,
    };
    Ok(v.unwrap_or(Value::Null))
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), StoreError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| StoreError::Backend(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), StoreError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| StoreError::Backend("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_database_name_from_url() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/chinook?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(db, "chinook");
    }
}
