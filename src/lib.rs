//! Entity REST: configuration-driven CRUD endpoints with a uniform response envelope.

pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod naming;
pub mod openapi;
pub mod pagination;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_path, resolve, EntityDescriptor, FullConfig, Registry};
pub use error::{AppError, ConfigError, StoreError};
pub use migration::apply_migrations;
pub use pagination::PageWindow;
pub use routes::build_app;
pub use service::CrudExecutor;
pub use settings::Settings;
pub use state::AppState;
pub use store::{ensure_database_exists, MemoryStore, PgStore, Store};
