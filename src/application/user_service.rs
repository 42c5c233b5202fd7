use crate::application::messages;
use crate::application::validation::validate_registration;
use crate::domain::error::DomainError;
use crate::domain::repository::UserRepository;
use crate::domain::user::{NewUser, RegisterUser, UserSummary};
use crate::infrastructure::security::hash_password;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace, warn};

/// Orchestrates validation, hashing and persistence of users.
///
/// Nothing here returns an error: every outcome, including storage failures,
/// is turned into a status message for the caller to display.
pub struct UserService<R: UserRepository + ?Sized> {
    repository: Arc<R>,
}

impl<R: UserRepository + ?Sized> UserService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self, form), fields(name = %form.name, email = %form.email, is_admin = form.is_admin))]
    pub async fn register(&self, form: RegisterUser) -> String {
        trace!("Starting user registration");

        if let Err(details) = validate_registration(&form) {
            warn!(details = %details, "Registration rejected by validation");
            return messages::validation_failed(details);
        }

        let user = NewUser {
            password_hash: hash_password(&form.password),
            name: form.name,
            email: form.email,
            is_admin: form.is_admin,
        };

        match self.repository.insert_user(user).await {
            Ok(stored) => {
                info!(
                    user_id = stored.id,
                    name = %stored.name,
                    "User registered successfully"
                );
                messages::user_created(&stored.name)
            }
            Err(err) => match err.downcast_ref::<DomainError>() {
                Some(DomainError::Conflict { name, email }) => {
                    warn!(name = %name, email = %email, "User already exists");
                    messages::user_conflict(name, email)
                }
                _ => {
                    error!(error = %err, "Failed to register user");
                    messages::create_failed(storage_detail(&err))
                }
            },
        }
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> (Vec<UserSummary>, String) {
        match self.repository.find_all_users().await {
            Ok(users) if users.is_empty() => {
                debug!("No users registered");
                (Vec::new(), messages::NO_USERS.to_string())
            }
            Ok(users) => {
                let count = users.len();
                debug!(count = count, "Users listed");
                let summaries = users.into_iter().map(UserSummary::from).collect();
                (summaries, messages::users_found(count))
            }
            Err(err) => {
                error!(error = %err, "Failed to list users");
                (Vec::new(), messages::query_failed(storage_detail(&err)))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn find_by_name(&self, name: &str) -> (Vec<UserSummary>, String) {
        match self.repository.find_user_by_name(name).await {
            Ok(Some(user)) => {
                debug!(user_id = user.id, "User found");
                let message = messages::user_found(&user.name);
                (vec![UserSummary::from(user)], message)
            }
            Ok(None) => {
                debug!("User not found");
                (Vec::new(), messages::USER_NOT_FOUND.to_string())
            }
            Err(err) => {
                error!(error = %err, "Failed to look up user");
                (Vec::new(), messages::query_failed(storage_detail(&err)))
            }
        }
    }

    /// Deletes the user with this name, if any. Callers re-list to observe the result.
    #[instrument(skip(self))]
    pub async fn delete_by_name(&self, name: &str) {
        match self.repository.delete_user_by_name(name).await {
            Ok(true) => info!("User deleted"),
            Ok(false) => debug!("No user with that name, nothing deleted"),
            Err(err) => error!(error = %err, "Failed to delete user"),
        }
    }
}

/// The underlying error text, without the `Storage error:` prefix of the wrapper.
fn storage_detail(err: &anyhow::Error) -> String {
    match err.downcast_ref::<DomainError>() {
        Some(DomainError::Storage(detail)) => detail.clone(),
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::MockUserRepository;
    use crate::domain::user::User;
    use anyhow::anyhow;

    fn service(repo: MockUserRepository) -> UserService<MockUserRepository> {
        UserService::new(Arc::new(repo))
    }

    fn stored(name: &str, email: &str) -> User {
        User {
            id: 1,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash_password("passwordseguro"),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_register_hashes_password_before_insert() {
        let mut repo = MockUserRepository::new();
        repo.expect_insert_user()
            .withf(|user| {
                user.password_hash == hash_password("passwordseguro")
                    && user.password_hash != "passwordseguro"
            })
            .times(1)
            .returning(|user| {
                Ok(User {
                    id: 1,
                    name: user.name,
                    email: user.email,
                    password_hash: user.password_hash,
                    is_admin: user.is_admin,
                })
            });

        let msg = service(repo)
            .register(RegisterUser::new("Juan", "juan@ejemplo.com", "passwordseguro", false))
            .await;

        assert_eq!(msg, "Usuario 'Juan' creado con éxito.");
    }

    #[tokio::test]
    async fn test_register_validation_failure_skips_storage() {
        let mut repo = MockUserRepository::new();
        repo.expect_insert_user().never();

        let msg = service(repo)
            .register(RegisterUser::new("Jo", "jo@ejemplo.com", "pass", false))
            .await;

        assert!(msg.starts_with("Error de validación:"));
        assert!(msg.contains("name"));
        assert!(msg.contains("password"));
    }

    #[tokio::test]
    async fn test_register_conflict_names_the_user() {
        let mut repo = MockUserRepository::new();
        repo.expect_insert_user().returning(|user| {
            Err(DomainError::Conflict {
                name: user.name,
                email: user.email,
            }
            .into())
        });

        let msg = service(repo)
            .register(RegisterUser::new("Ana", "ana@correo.com", "secreto1", false))
            .await;

        assert_eq!(msg, "El usuario 'Ana' o el email 'ana@correo.com' ya existen.");
    }

    #[tokio::test]
    async fn test_register_storage_failure_embeds_error_text() {
        let mut repo = MockUserRepository::new();
        repo.expect_insert_user()
            .returning(|_| Err(DomainError::Storage("disk I/O error".to_string()).into()));

        let msg = service(repo)
            .register(RegisterUser::new("Ana", "ana@correo.com", "secreto1", false))
            .await;

        assert_eq!(msg, "Error al crear usuario: disk I/O error");
    }

    #[tokio::test]
    async fn test_list_all_contains_storage_failure() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_all_users()
            .returning(|| Err(anyhow!("database is locked")));

        let (users, msg) = service(repo).list_all().await;

        assert!(users.is_empty());
        assert_eq!(msg, "Error al consultar usuarios: database is locked");
    }

    #[tokio::test]
    async fn test_list_all_projects_records() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_all_users()
            .returning(|| Ok(vec![stored("Luis", "luis@correo.com")]));

        let (users, msg) = service(repo).list_all().await;

        assert_eq!(
            users,
            vec![UserSummary {
                name: "Luis".to_string(),
                email: "luis@correo.com".to_string(),
                is_admin: false,
            }]
        );
        assert_eq!(msg, "1 usuario(s) encontrados.");
    }

    #[tokio::test]
    async fn test_find_by_name_contains_storage_failure() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_user_by_name()
            .returning(|_| Err(DomainError::Storage("no such table: users".to_string()).into()));

        let (users, msg) = service(repo).find_by_name("Luis").await;

        assert!(users.is_empty());
        assert_eq!(msg, "Error al consultar usuarios: no such table: users");
    }

    #[tokio::test]
    async fn test_find_by_name_passes_name_through() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_user_by_name()
            .withf(|name| name.to_string() == "Luis")
            .returning(|_| Ok(Some(stored("Luis", "luis@correo.com"))));

        let (users, msg) = service(repo).find_by_name("Luis").await;

        assert_eq!(users.len(), 1);
        assert_eq!(msg, "Usuario 'Luis' encontrado.");
    }

    #[tokio::test]
    async fn test_delete_by_name_swallows_storage_failure() {
        let mut repo = MockUserRepository::new();
        repo.expect_delete_user_by_name()
            .times(1)
            .returning(|_| Err(anyhow!("database is locked")));

        service(repo).delete_by_name("Luis").await;
    }
}
