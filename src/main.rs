use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use std::sync::Arc;
use tracing::info;
use nueva_app::application::user_service::UserService;
use nueva_app::data::memory::InMemoryStore;
use nueva_app::data::sqlite::SqliteStore;
use nueva_app::domain::repository::UserRepository;
use nueva_app::infrastructure::config::{Config, StorageBackend};
use nueva_app::infrastructure::database;
use nueva_app::infrastructure::logging::init_logging;
use nueva_app::presentation::handlers::{self, AppState};
use nueva_app::presentation::middleware::RequestTelemetry;
use nueva_app::presentation::session::SessionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_logging(config.log_format);
    info!(?config, "Configuration loaded");

    let repository: Arc<dyn UserRepository> = match config.storage_backend {
        StorageBackend::Sqlite => {
            info!(path = %config.database_path, "Opening SQLite storage");
            let pool = database::connect(&config).await?;
            Arc::new(SqliteStore::new(pool, config.name_match))
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage, data is lost on shutdown");
            Arc::new(InMemoryStore::with_name_match(config.name_match))
        }
    };

    let state = web::Data::new(AppState {
        service: UserService::new(repository),
        sessions: SessionRegistry::with_idle_ttl(config.session_idle_ttl),
    });

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweeper.sessions.idle_ttl());
        loop {
            ticker.tick().await;
            sweeper.sessions.evict_idle().await;
        }
    });

    info!(address = %config.server_address, "Starting HTTP server");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(RequestTelemetry)
            .wrap(Cors::permissive())
            .service(web::scope("/api").configure(handlers::configure))
    })
    .bind(config.server_address.as_str())?
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}
