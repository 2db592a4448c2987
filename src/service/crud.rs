//! Generic CRUD execution over any store, parametrized by entity descriptor.

use crate::config::{ChildRef, EntityDescriptor};
use crate::error::{AppError, StoreError};
use crate::pagination::PageWindow;
use crate::service::RequestValidator;
use crate::store::{Filter, Record, Store};
use serde_json::Value;

pub struct CrudExecutor;

/// Constraint violations are the caller's fault; everything else stays a store error.
fn conflict(entity: &EntityDescriptor, e: StoreError, what: &str) -> AppError {
    match e {
        StoreError::Constraint(detail) => {
            tracing::debug!(entity = %entity.name, %detail, "constraint violation");
            AppError::Conflict(format!("{} {}", entity.name, what))
        }
        other => AppError::Store(other),
    }
}

fn not_found(entity: &EntityDescriptor) -> AppError {
    AppError::NotFound(format!("{} not found", entity.name))
}

impl CrudExecutor {
    /// Insert one row from a decoded create payload. Returns the new id and the read representation.
    pub async fn create(
        store: &dyn Store,
        entity: &EntityDescriptor,
        input: &Record,
    ) -> Result<(i64, Value), AppError> {
        let row = store
            .insert(&entity.table, input)
            .await
            .map_err(|e| conflict(entity, e, "already exists"))?;
        let id = row.get(&entity.id_field).and_then(Value::as_i64).ok_or_else(|| {
            AppError::Store(StoreError::Backend(format!(
                "{} row returned without an integer {}",
                entity.table.name, entity.id_field
            )))
        })?;
        tracing::debug!(entity = %entity.name, id, "created");
        Ok((id, RequestValidator::project_read(&entity.read, &row)))
    }

    pub async fn get(store: &dyn Store, entity: &EntityDescriptor, id: i64) -> Result<Value, AppError> {
        let row = store.fetch(&entity.table, id).await?.ok_or_else(|| not_found(entity))?;
        Ok(RequestValidator::project_read(&entity.read, &row))
    }

    /// One page plus the total row count of the whole table.
    pub async fn list(
        store: &dyn Store,
        entity: &EntityDescriptor,
        window: PageWindow,
    ) -> Result<(Vec<Value>, u64), AppError> {
        let rows = store.list(&entity.table, None, window).await?;
        let total = store.count(&entity.table, None).await?;
        Ok((project_all(entity, &rows), total))
    }

    /// Full replace; `input` already carries every update-role field.
    pub async fn update(
        store: &dyn Store,
        entity: &EntityDescriptor,
        id: i64,
        input: &Record,
    ) -> Result<Value, AppError> {
        Self::apply(store, entity, id, input).await
    }

    /// Partial update; `input` holds only the fields to overwrite.
    pub async fn patch(
        store: &dyn Store,
        entity: &EntityDescriptor,
        id: i64,
        input: &Record,
    ) -> Result<Value, AppError> {
        if input.is_empty() {
            return Self::get(store, entity, id).await;
        }
        Self::apply(store, entity, id, input).await
    }

    async fn apply(store: &dyn Store, entity: &EntityDescriptor, id: i64, changes: &Record) -> Result<Value, AppError> {
        let row = store
            .update(&entity.table, id, changes)
            .await
            .map_err(|e| conflict(entity, e, "conflicts with an existing record"))?
            .ok_or_else(|| not_found(entity))?;
        tracing::debug!(entity = %entity.name, id, fields = changes.len(), "updated");
        Ok(RequestValidator::project_read(&entity.read, &row))
    }

    /// Children whose foreign key equals `parent_id`; the count is filtered the same way.
    /// An unknown parent is NotFound rather than an empty page.
    pub async fn list_children(
        store: &dyn Store,
        parent: &EntityDescriptor,
        child: &ChildRef,
        parent_id: i64,
        window: PageWindow,
    ) -> Result<(Vec<Value>, u64), AppError> {
        if store.fetch(&parent.table, parent_id).await?.is_none() {
            return Err(not_found(parent));
        }
        let filter = Filter::eq(child.foreign_key_field.clone(), parent_id);
        let rows = store.list(&child.child.table, Some(&filter), window).await?;
        let total = store.count(&child.child.table, Some(&filter)).await?;
        Ok((project_all(&child.child, &rows), total))
    }
}

fn project_all(entity: &EntityDescriptor, rows: &[Record]) -> Vec<Value> {
    rows.iter()
        .map(|r| RequestValidator::project_read(&entity.read, r))
        .collect()
}
