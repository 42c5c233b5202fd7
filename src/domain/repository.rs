use crate::domain::task::{NewTask, Task};
use crate::domain::user::{NewUser, User};
use anyhow::Result;
use async_trait::async_trait;

/// Persistence for user records.
///
/// Every call is self-contained: implementations acquire their own storage
/// session and release it before returning, whatever the outcome. Inserting a
/// duplicate name or email fails with [`DomainError::Conflict`] and writes nothing.
///
/// [`DomainError::Conflict`]: crate::domain::error::DomainError::Conflict
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User>;
    /// All users ordered by id.
    async fn find_all_users(&self) -> Result<Vec<User>>;
    /// First user (lowest id) whose name matches under the configured rule.
    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>>;
    /// Deletes the user found by [`find_user_by_name`](Self::find_user_by_name)
    /// and detaches their tasks. Returns whether a row was removed.
    async fn delete_user_by_name(&self, name: &str) -> Result<bool>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert_task(&self, task: NewTask) -> Result<Task>;
    async fn find_task_by_id(&self, id: i64) -> Result<Option<Task>>;
    async fn find_tasks_by_user(&self, user_id: i64) -> Result<Vec<Task>>;
}
