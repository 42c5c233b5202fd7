use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::borrow::Cow;
use validator::{Validate, ValidateEmail, ValidationError};

/// A stored user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// A user ready to be persisted: validated and with the password already hashed.
/// The id is assigned by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Raw registration form, as submitted by a client. Missing fields arrive
/// empty and are reported by validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterUser {
    #[validate(length(min = 3, max = 50, message = "debe tener entre 3 y 50 caracteres"))]
    pub name: String,
    #[validate(custom(function = "validate_email_address"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "debe tener entre 6 y 128 caracteres"))]
    pub password: String,
    pub is_admin: bool,
}

impl RegisterUser {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        is_admin: bool,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            is_admin,
        }
    }
}

/// `local@domain`, where the domain is a dotted host name. Address literals
/// such as `[127.0.0.1]` and bare IPs are refused.
fn validate_email_address(email: &str) -> Result<(), ValidationError> {
    let valid = email.validate_email()
        && email
            .rsplit_once('@')
            .is_some_and(|(_, domain)| is_dotted_host(domain));
    if valid {
        return Ok(());
    }
    let mut err = ValidationError::new("email");
    err.message = Some(Cow::Borrowed("no es un email válido"));
    Err(err)
}

fn is_dotted_host(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() > 1
        && labels
            .iter()
            .all(|label| !label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || c == '-'))
        && labels
            .last()
            .is_some_and(|tld| !tld.chars().all(|c| c.is_ascii_digit()))
}

/// The fields of a user that are exposed to callers. Never carries the id or the hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            email: user.email,
            is_admin: user.is_admin,
        }
    }
}

/// Body of the search and delete forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

/// How names are compared by lookups and deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameMatch {
    /// Byte-wise comparison.
    #[default]
    Exact,
    /// ASCII case folding, the same rule as SQLite's `NOCASE` collation.
    CaseInsensitive,
}

impl NameMatch {
    pub fn matches(&self, stored: &str, wanted: &str) -> bool {
        match self {
            NameMatch::Exact => stored == wanted,
            NameMatch::CaseInsensitive => stored.eq_ignore_ascii_case(wanted),
        }
    }
}
