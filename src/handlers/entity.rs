//! Entity handlers: create, read, list, update, patch, child listing.
//! Each takes the descriptor it was registered for; nothing is looked up by name at request time.

use crate::config::{ChildRef, EntityDescriptor};
use crate::error::AppError;
use crate::pagination::PageWindow;
use crate::response;
use crate::service::{CrudExecutor, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn parse_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(v)| v)
        .map_err(|e| AppError::Validation(e.body_text()))
}

fn parse_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    id.map(|Path(id)| id)
        .map_err(|_| AppError::Validation("id must be an integer".into()))
}

pub async fn create(
    state: &AppState,
    entity: &EntityDescriptor,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let body = parse_body(body)?;
    let input = RequestValidator::decode_create(entity, &body)?;
    let (id, row) = CrudExecutor::create(state.store.as_ref(), entity, &input).await?;
    Ok(response::created(id, row))
}

pub async fn list(
    state: &AppState,
    entity: &EntityDescriptor,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let window = PageWindow::from_query(&params)?;
    let (rows, total) = CrudExecutor::list(state.store.as_ref(), entity, window).await?;
    Ok(response::many(rows, total).into_response())
}

pub async fn read(
    state: &AppState,
    entity: &EntityDescriptor,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let id = parse_id(id)?;
    let row = CrudExecutor::get(state.store.as_ref(), entity, id).await?;
    Ok(response::one(row).into_response())
}

pub async fn update(
    state: &AppState,
    entity: &EntityDescriptor,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = parse_id(id)?;
    let input = RequestValidator::decode_update(entity, &parse_body(body)?)?;
    let row = CrudExecutor::update(state.store.as_ref(), entity, id, &input).await?;
    Ok(response::one(row).into_response())
}

pub async fn patch(
    state: &AppState,
    entity: &EntityDescriptor,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = parse_id(id)?;
    let input = RequestValidator::decode_patch(entity, &parse_body(body)?)?;
    let row = CrudExecutor::patch(state.store.as_ref(), entity, id, &input).await?;
    Ok(response::one(row).into_response())
}

pub async fn list_children(
    state: &AppState,
    parent: &EntityDescriptor,
    child: &ChildRef,
    id: Result<Path<i64>, PathRejection>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let id = parse_id(id)?;
    let window = PageWindow::from_query(&params)?;
    let (rows, total) = CrudExecutor::list_children(state.store.as_ref(), parent, child, id, window).await?;
    Ok(response::many(rows, total).into_response())
}
