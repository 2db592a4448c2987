//! HTTP handler logic for generated entity endpoints.

pub mod entity;
pub use entity::*;
