//! Status lines shown to the user after each operation.
//!
//! Pages colour a line red when it starts with `"Error"`, so every failure
//! message here keeps that prefix.

use std::fmt::Display;

pub const NO_USERS: &str = "No hay usuarios registrados.";
pub const USER_NOT_FOUND: &str = "No se encontró el usuario.";

pub fn user_created(name: &str) -> String {
    format!("Usuario '{}' creado con éxito.", name)
}

pub fn user_conflict(name: &str, email: &str) -> String {
    format!("El usuario '{}' o el email '{}' ya existen.", name, email)
}

pub fn validation_failed(details: impl Display) -> String {
    format!("Error de validación: {}", details)
}

pub fn create_failed(err: impl Display) -> String {
    format!("Error al crear usuario: {}", err)
}

pub fn users_found(count: usize) -> String {
    format!("{} usuario(s) encontrados.", count)
}

pub fn user_found(name: &str) -> String {
    format!("Usuario '{}' encontrado.", name)
}

pub fn query_failed(err: impl Display) -> String {
    format!("Error al consultar usuarios: {}", err)
}

pub fn is_error(message: &str) -> bool {
    message.starts_with("Error")
}
