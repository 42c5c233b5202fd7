use crate::domain::error::DomainError;
use crate::domain::repository::{TaskRepository, UserRepository};
use crate::domain::task::{NewTask, Task};
use crate::domain::user::{NameMatch, NewUser, User};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument, trace, warn};

const USER_COLUMNS: &str = "id, name, email, password_hash, is_admin";

/// SQLite-backed repository.
///
/// Reads check a connection out of the pool for the duration of the query.
/// Writes run inside a transaction that is committed on success and rolled
/// back when dropped on any other path.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    name_match: NameMatch,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, name_match: NameMatch) -> Self {
        Self { pool, name_match }
    }

    fn name_predicate(&self) -> &'static str {
        match self.name_match {
            NameMatch::Exact => "name = ?",
            NameMatch::CaseInsensitive => "name = ? COLLATE NOCASE",
        }
    }
}

fn storage_error(err: sqlx::Error) -> anyhow::Error {
    DomainError::Storage(err.to_string()).into()
}

#[async_trait]
impl UserRepository for SqliteStore {
    #[instrument(skip(self, user), fields(name = %user.name, email = %user.email))]
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let inserted = sqlx::query(
            "INSERT INTO users (name, email, password_hash, is_admin) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .execute(&mut *tx)
        .await;

        let done = match inserted {
            Ok(done) => done,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                warn!(error = %db_err, "Duplicate user rejected");
                return Err(DomainError::Conflict {
                    name: user.name,
                    email: user.email,
                }
                .into());
            }
            Err(err) => return Err(storage_error(err)),
        };

        tx.commit().await.map_err(storage_error)?;

        let stored = User {
            id: done.last_insert_rowid(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
        };
        debug!(user_id = stored.id, "User inserted");
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn find_all_users(&self) -> Result<Vec<User>> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(storage_error)?;
        trace!(count = users.len(), "Listed users");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {} ORDER BY id LIMIT 1",
            self.name_predicate()
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage_error)?;
        match &user {
            Some(u) => debug!(user_id = u.id, "User found"),
            None => trace!(name = name, "User not found"),
        }
        Ok(user)
    }

    /// Both statements are writes, so the transaction takes the write lock on
    /// its first statement and waits on the busy timeout like any other writer.
    #[instrument(skip(self))]
    async fn delete_user_by_name(&self, name: &str) -> Result<bool> {
        let target = format!(
            "SELECT id FROM users WHERE {} ORDER BY id LIMIT 1",
            self.name_predicate()
        );
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let detached = sqlx::query(&format!(
            "UPDATE tasks SET user_id = NULL WHERE user_id = ({target})"
        ))
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;
        let deleted = sqlx::query_scalar::<_, i64>(&format!(
            "DELETE FROM users WHERE id = ({target}) RETURNING id"
        ))
        .bind(name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?;

        let Some(id) = deleted else {
            trace!(name = name, "Nothing to delete");
            return Ok(false);
        };

        tx.commit().await.map_err(storage_error)?;
        debug!(
            user_id = id,
            detached_tasks = detached.rows_affected(),
            "User deleted"
        );
        Ok(true)
    }
}

#[async_trait]
impl TaskRepository for SqliteStore {
    #[instrument(skip(self, task), fields(user_id = ?task.user_id))]
    async fn insert_task(&self, task: NewTask) -> Result<Task> {
        task.ensure_valid()?;
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        let done = sqlx::query("INSERT INTO tasks (description, completed, user_id) VALUES (?, ?, ?)")
            .bind(&task.description)
            .bind(task.completed)
            .bind(task.user_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;
        tx.commit().await.map_err(storage_error)?;

        Ok(Task {
            id: done.last_insert_rowid(),
            description: task.description,
            completed: task.completed,
            user_id: task.user_id,
        })
    }

    async fn find_task_by_id(&self, id: i64) -> Result<Option<Task>> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        sqlx::query_as::<_, Task>(
            "SELECT id, description, completed, user_id FROM tasks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)
    }

    async fn find_tasks_by_user(&self, user_id: i64) -> Result<Vec<Task>> {
        let mut conn = self.pool.acquire().await.map_err(storage_error)?;
        sqlx::query_as::<_, Task>(
            "SELECT id, description, completed, user_id FROM tasks WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::Config;
    use crate::infrastructure::database::{connect, connect_in_memory};
    use tempfile::TempDir;

    async fn store(name_match: NameMatch) -> SqliteStore {
        SqliteStore::new(connect_in_memory().await.unwrap(), name_match)
    }

    async fn file_store(dir: &TempDir) -> SqliteStore {
        let path = dir.path().join("usuarios.db").to_string_lossy().into_owned();
        let config = Config::from_lookup(|name| (name == "DATABASE_PATH").then(|| path.clone())).unwrap();
        SqliteStore::new(connect(&config).await.unwrap(), NameMatch::Exact)
    }

    fn new_user(name: &str, email: &str, is_admin: bool) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash123".to_string(),
            is_admin,
        }
    }

    #[tokio::test]
    async fn test_user_round_trips_through_table() {
        let repo = store(NameMatch::Exact).await;

        let inserted = repo
            .insert_user(new_user("Maria", "maria@correo.com", false))
            .await
            .unwrap();
        let loaded = repo.find_user_by_name("Maria").await.unwrap().unwrap();

        assert_eq!(loaded, inserted);
        assert_eq!(loaded.password_hash, "hash123");
        assert!(!loaded.is_admin);
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_conflict() {
        let repo = store(NameMatch::Exact).await;
        repo.insert_user(new_user("Ana", "ana@correo.com", false))
            .await
            .unwrap();

        let err = repo
            .insert_user(new_user("Ana", "ana@correo.com", false))
            .await
            .unwrap_err();

        match err.downcast_ref::<DomainError>() {
            Some(DomainError::Conflict { name, email }) => {
                assert_eq!(name, "Ana");
                assert_eq!(email, "ana@correo.com");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(repo.find_all_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_all_users_orders_by_id() {
        let repo = store(NameMatch::Exact).await;
        for name in ["Zoe", "Ana", "Luis"] {
            repo.insert_user(new_user(name, &format!("{name}@correo.com"), false))
                .await
                .unwrap();
        }

        let names: Vec<String> = repo
            .find_all_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Zoe", "Ana", "Luis"]);
    }

    #[tokio::test]
    async fn test_case_insensitive_lookup_uses_nocase() {
        let repo = store(NameMatch::CaseInsensitive).await;
        repo.insert_user(new_user("Juan", "juan@ejemplo.com", true))
            .await
            .unwrap();

        let found = repo.find_user_by_name("juan").await.unwrap().unwrap();
        assert_eq!(found.name, "Juan");
        assert!(found.is_admin);

        assert!(repo.delete_user_by_name("JUAN").await.unwrap());
        assert!(repo.find_all_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exact_lookup_is_case_sensitive() {
        let repo = store(NameMatch::Exact).await;
        repo.insert_user(new_user("Juan", "juan@ejemplo.com", false))
            .await
            .unwrap();

        assert!(repo.find_user_by_name("juan").await.unwrap().is_none());
        assert!(!repo.delete_user_by_name("juan").await.unwrap());
    }

    #[tokio::test]
    async fn test_task_persists_with_owner() {
        let repo = store(NameMatch::Exact).await;
        let user = repo
            .insert_user(new_user("Maria", "maria@correo.com", false))
            .await
            .unwrap();

        let task = repo
            .insert_task(NewTask::for_user("Probar la app", user.id))
            .await
            .unwrap();
        let loaded = repo.find_task_by_id(task.id).await.unwrap().unwrap();

        assert_eq!(loaded.description, "Probar la app");
        assert_eq!(loaded.user_id, Some(user.id));
        assert!(!loaded.completed);
    }

    #[tokio::test]
    async fn test_delete_user_detaches_tasks() {
        let repo = store(NameMatch::Exact).await;
        let user = repo
            .insert_user(new_user("Maria", "maria@correo.com", false))
            .await
            .unwrap();
        let task = repo
            .insert_task(NewTask::for_user("Probar la app", user.id))
            .await
            .unwrap();

        assert!(repo.delete_user_by_name("Maria").await.unwrap());

        assert!(repo.find_tasks_by_user(user.id).await.unwrap().is_empty());
        let orphan = repo.find_task_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(orphan.user_id, None);
    }

    #[tokio::test]
    async fn test_task_for_unknown_user_violates_foreign_key() {
        let repo = store(NameMatch::Exact).await;

        let err = repo
            .insert_task(NewTask::for_user("Sin dueño", 99))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_task_description_is_rejected() {
        let repo = store(NameMatch::Exact).await;
        let user = repo
            .insert_user(new_user("Maria", "maria@correo.com", false))
            .await
            .unwrap();

        let err = repo
            .insert_task(NewTask::for_user("", user.id))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Validation(_))
        ));

        let raw = sqlx::query("INSERT INTO tasks (description, user_id) VALUES ('', ?)")
            .bind(user.id)
            .execute(&repo.pool)
            .await;
        assert!(raw.is_err());
        assert!(repo.find_tasks_by_user(user.id).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_deletes_survive_concurrent_writers() {
        let dir = TempDir::new().unwrap();
        let repo = file_store(&dir).await;

        for round in 0..10 {
            for i in 0..5 {
                repo.insert_user(new_user(
                    &format!("borrar-{round}-{i}"),
                    &format!("borrar-{round}-{i}@correo.com"),
                    false,
                ))
                .await
                .unwrap();
            }

            let mut handles = Vec::new();
            for i in 0..5 {
                let deleter = repo.clone();
                handles.push(tokio::spawn(async move {
                    deleter
                        .delete_user_by_name(&format!("borrar-{round}-{i}"))
                        .await
                        .map(|deleted| assert!(deleted))
                }));
                let writer = repo.clone();
                handles.push(tokio::spawn(async move {
                    writer
                        .insert_user(new_user(
                            &format!("nuevo-{round}-{i}"),
                            &format!("nuevo-{round}-{i}@correo.com"),
                            false,
                        ))
                        .await
                        .map(|_| ())
                }));
            }
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        }

        let names: Vec<String> = repo
            .find_all_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names.len(), 50);
        assert!(names.iter().all(|name| name.starts_with("nuevo-")));
    }
}
