//! Pre-envelope response bodies. The envelope stage folds these into `{meta_data, response}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct One<T> {
    pub response: T,
}

#[derive(Serialize)]
pub struct Many<T> {
    pub response: Vec<T>,
    pub total_count: u64,
}

/// Id of a freshly created row, carried in response extensions for the `location` link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreatedId(pub i64);

pub fn created<T: Serialize>(id: i64, response: T) -> Response {
    let mut res = (StatusCode::CREATED, Json(One { response })).into_response();
    res.extensions_mut().insert(CreatedId(id));
    res
}

pub fn one<T: Serialize>(response: T) -> (StatusCode, Json<One<T>>) {
    (StatusCode::OK, Json(One { response }))
}

pub fn many<T: Serialize>(response: Vec<T>, total_count: u64) -> (StatusCode, Json<Many<T>>) {
    (StatusCode::OK, Json(Many { response, total_count }))
}
