//! CrudExecutor: generic CRUD over the store; RequestValidator: payload decoding per schema role.

mod crud;
mod validation;
pub use crud::CrudExecutor;
pub use validation::RequestValidator;
