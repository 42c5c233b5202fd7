use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("User '{name}' or email '{email}' already exists")]
    Conflict { name: String, email: String },
    #[error("Storage error: {0}")]
    Storage(String),
}
