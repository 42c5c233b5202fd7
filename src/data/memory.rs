use crate::domain::error::DomainError;
use crate::domain::repository::{TaskRepository, UserRepository};
use crate::domain::task::{NewTask, Task};
use crate::domain::user::{NameMatch, NewUser, User};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace, warn};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    tasks: BTreeMap<i64, Task>,
    last_user_id: i64,
    last_task_id: i64,
}

/// Both tables behind a single lock, so every operation is atomic with
/// respect to every other one.
#[derive(Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    name_match: NameMatch,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_name_match(NameMatch::default())
    }

    pub fn with_name_match(name_match: NameMatch) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            name_match,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Tables {
    fn find_by_name(&self, name_match: NameMatch, name: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| name_match.matches(&u.name, name))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    #[instrument(skip(self, user), fields(name = %user.name, email = %user.email))]
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        trace!("Acquiring write lock for user storage");
        let mut tables = self.tables.write().await;

        // Uniqueness is always byte-wise, like the UNIQUE constraints on the table.
        let duplicate = tables
            .users
            .values()
            .any(|u| u.name == user.name || u.email == user.email);
        if duplicate {
            warn!(name = %user.name, email = %user.email, "Duplicate user rejected");
            return Err(DomainError::Conflict {
                name: user.name,
                email: user.email,
            }
            .into());
        }

        tables.last_user_id += 1;
        let stored = User {
            id: tables.last_user_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
        };
        tables.users.insert(stored.id, stored.clone());
        debug!(user_id = stored.id, "User saved to memory storage");
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn find_all_users(&self) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let users: Vec<User> = tables.users.values().cloned().collect();
        trace!(count = users.len(), "Listed users from memory storage");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        let user = tables.find_by_name(self.name_match, name).cloned();
        match &user {
            Some(u) => debug!(user_id = u.id, "User found in storage"),
            None => trace!(name = name, "User not found in storage"),
        }
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn delete_user_by_name(&self, name: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(id) = tables.find_by_name(self.name_match, name).map(|u| u.id) else {
            trace!(name = name, "Nothing to delete");
            return Ok(false);
        };

        for task in tables.tasks.values_mut() {
            if task.user_id == Some(id) {
                task.user_id = None;
            }
        }
        tables.users.remove(&id);
        debug!(user_id = id, "User deleted from memory storage");
        Ok(true)
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    #[instrument(skip(self, task), fields(user_id = ?task.user_id))]
    async fn insert_task(&self, task: NewTask) -> Result<Task> {
        task.ensure_valid()?;

        let mut tables = self.tables.write().await;
        if let Some(user_id) = task.user_id {
            if !tables.users.contains_key(&user_id) {
                return Err(DomainError::Storage("FOREIGN KEY constraint failed".into()).into());
            }
        }

        tables.last_task_id += 1;
        let stored = Task {
            id: tables.last_task_id,
            description: task.description,
            completed: task.completed,
            user_id: task.user_id,
        };
        tables.tasks.insert(stored.id, stored.clone());
        debug!(task_id = stored.id, "Task saved to memory storage");
        Ok(stored)
    }

    async fn find_task_by_id(&self, id: i64) -> Result<Option<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.get(&id).cloned())
    }

    async fn find_tasks_by_user(&self, user_id: i64) -> Result<Vec<Task>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .values()
            .filter(|t| t.user_id == Some(user_id))
            .cloned()
            .collect())
    }
}
