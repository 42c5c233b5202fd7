use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A to-do item owned by a user. Only persisted, no service operates on it yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub description: String,
    pub completed: bool,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub description: String,
    pub completed: bool,
    pub user_id: Option<i64>,
}

impl NewTask {
    pub fn for_user(description: impl Into<String>, user_id: i64) -> Self {
        Self {
            description: description.into(),
            completed: false,
            user_id: Some(user_id),
        }
    }

    /// Checked by every repository before the task reaches storage.
    pub fn ensure_valid(&self) -> Result<(), DomainError> {
        if self.description.is_empty() {
            return Err(DomainError::Validation(
                "description: must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
