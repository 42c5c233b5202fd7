use crate::application::user_service::UserService;
use crate::domain::repository::UserRepository;
use crate::domain::user::{NameQuery, RegisterUser};
use crate::presentation::session::{SessionRegistry, SharedPage};
use actix_web::{HttpResponse, ResponseError, web};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct AppState {
    pub service: UserService<dyn UserRepository>,
    pub sessions: SessionRegistry,
}

// Uniform error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: serde_json::Value,
}

/// Transport-level failures. Outcomes of the user operations themselves are
/// never errors, they travel as the page's status message.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            ApiError::BadRequest(_) => actix_web::http::StatusCode::BAD_REQUEST,
            ApiError::SessionNotFound(_) => actix_web::http::StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_msg = self.to_string();

        let message = match self {
            ApiError::BadRequest(msg) | ApiError::SessionNotFound(msg) => msg,
        };
        warn!(error = %error_msg, status = %status, "Request rejected");

        HttpResponse::build(status).json(ErrorResponse {
            error: error_msg,
            details: serde_json::json!({ "message": message }),
        })
    }
}

/// Routes of the API, mounted under `/api` by the binary and by the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::BadRequest(err.to_string()).into()
    }))
    .route("/health", web::get().to(health_check))
    .route("/sessions", web::post().to(open_session))
    .route("/sessions/{id}", web::get().to(get_session))
    .route("/sessions/{id}", web::delete().to(close_session))
    .route("/sessions/{id}/register", web::post().to(register_user))
    .route("/sessions/{id}/users", web::post().to(list_users))
    .route("/sessions/{id}/search", web::post().to(search_user))
    .route("/sessions/{id}/delete", web::post().to(delete_user));
}

async fn find_session(state: &AppState, raw_id: &str) -> Result<(Uuid, SharedPage), ApiError> {
    let id = Uuid::parse_str(raw_id).map_err(|_| ApiError::SessionNotFound(raw_id.to_string()))?;
    let page = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ApiError::SessionNotFound(raw_id.to_string()))?;
    Ok((id, page))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[instrument]
pub async fn health_check() -> HttpResponse {
    info!("Health check requested");
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };
    HttpResponse::Ok().json(response)
}

#[instrument(skip(state))]
pub async fn open_session(state: web::Data<AppState>) -> HttpResponse {
    let (id, page) = state.sessions.open().await;
    let snapshot = page.lock().await.snapshot(id);
    HttpResponse::Created().json(snapshot)
}

#[instrument(skip(state, path), fields(session_id = %*path))]
pub async fn get_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let (id, page) = find_session(&state, &path).await?;
    let snapshot = page.lock().await.snapshot(id);
    Ok(HttpResponse::Ok().json(snapshot))
}

#[instrument(skip(state, path), fields(session_id = %*path))]
pub async fn close_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let (id, _) = find_session(&state, &path).await?;
    state.sessions.close(id).await;
    Ok(HttpResponse::NoContent().finish())
}

#[instrument(skip(state, path, req), fields(session_id = %*path, name = %req.name))]
pub async fn register_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<RegisterUser>,
) -> Result<HttpResponse, ApiError> {
    let (id, page) = find_session(&state, &path).await?;
    let mut page = page.lock().await;
    page.submit_registration(&state.service, req.into_inner())
        .await;
    info!(message = ?page.message, "Registration form processed");
    Ok(HttpResponse::Ok().json(page.snapshot(id)))
}

#[instrument(skip(state, path), fields(session_id = %*path))]
pub async fn list_users(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let (id, page) = find_session(&state, &path).await?;
    let mut page = page.lock().await;
    page.load_users(&state.service).await;
    info!(count = page.users.len(), "Users loaded");
    Ok(HttpResponse::Ok().json(page.snapshot(id)))
}

#[instrument(skip(state, path, req), fields(session_id = %*path, name = %req.name))]
pub async fn search_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<NameQuery>,
) -> Result<HttpResponse, ApiError> {
    let (id, page) = find_session(&state, &path).await?;
    let mut page = page.lock().await;
    page.search_user(&state.service, &req.name).await;
    info!(found = page.filtered_users.len(), "Search processed");
    Ok(HttpResponse::Ok().json(page.snapshot(id)))
}

#[instrument(skip(state, path, req), fields(session_id = %*path, name = %req.name))]
pub async fn delete_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<NameQuery>,
) -> Result<HttpResponse, ApiError> {
    let (id, page) = find_session(&state, &path).await?;
    let mut page = page.lock().await;
    page.delete_user(&state.service, &req.name).await;
    info!(remaining = page.users.len(), "Delete processed");
    Ok(HttpResponse::Ok().json(page.snapshot(id)))
}
