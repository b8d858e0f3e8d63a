// Declare the modules
pub mod api;
pub mod assembler;
pub mod config;
pub mod editor;
pub mod errors;
pub mod export;
pub mod extraction;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod sse;
pub mod state;
pub mod storage;

use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;

use crate::api::{LLMApiProvider, OpenAICompatibleProvider};
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::state::AppState;
use crate::storage::StorageManager;

const JSON_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Registers every route. Shared by the server and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_BODY_LIMIT)
            .error_handler(|err, _req| AppError::Validation(format!("Invalid JSON payload: {err}")).into()),
    )
    .route("/health", web::get().to(handlers::health))
    .service(
        web::scope("/api")
            .route("/generate", web::post().to(handlers::generate_presentation))
            .route("/edit-slide", web::post().to(handlers::edit_slide))
            .route("/export", web::post().to(handlers::export_presentation))
            .route("/conversations", web::get().to(handlers::list_conversations))
            .route("/conversations", web::post().to(handlers::create_conversation))
            .route("/conversations/{id}", web::get().to(handlers::get_conversation))
            .route("/conversations/{id}", web::delete().to(handlers::delete_conversation))
            .route("/conversations/{id}/messages", web::post().to(handlers::upsert_message)),
    );
}

pub async fn run() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let config = AppConfig::from_env()?;
    let storage_manager = StorageManager::new(&config.db_path).await?;

    // Create the API provider instance
    let api_provider: Arc<dyn LLMApiProvider> = Arc::new(OpenAICompatibleProvider::new());
    let app_state = web::Data::new(AppState::new(storage_manager, api_provider, &config));

    log::info!(
        "Starting server at http://{} (model '{}' via {})",
        config.bind_addr,
        config.model.model,
        config.model.api_url
    );

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(app_state.clone())
            .configure(configure)
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("Failed to bind {}", config.bind_addr))?
    .run()
    .await
    .context("HTTP server terminated with an error")
}
