pub mod service;
pub mod validate;

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::filter::FilterError;

#[derive(Debug, Error)]
pub enum CrudError {
    #[error("Validation failed")]
    Validation { field_errors: HashMap<String, String> },

    #[error("No {schema} record with id {id}")]
    NotFound { schema: String, id: Uuid },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub use service::{CrudService, ListResult};
pub use validate::{validate_create, validate_update};
