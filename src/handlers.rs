use std::convert::Infallible;

use actix_web::http::header::{self, ContentDisposition};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::export;
use crate::models::{ChatMessage, Presentation};
use crate::sse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

// Fields are loose so each missing/invalid one gets its own 400 message
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSlideRequest {
    #[serde(default)]
    pub presentation: Option<Value>,
    #[serde(default)]
    pub slide_index: Option<Value>,
    #[serde(default)]
    pub instruction: Option<String>,
}

/// POST /api/generate - stream a new deck for `prompt` as server-sent events
pub async fn generate_presentation(
    state: web::Data<AppState>,
    body: web::Json<GenerateRequest>,
) -> Result<HttpResponse, AppError> {
    let topic = body
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("Prompt is required".to_string()))?
        .to_string();
    log::info!("Generating presentation for '{}'", topic);

    let events = state.generator.generate(topic);
    // The body owns the receiver; a client disconnect drops it and stops the generator.
    let frames = futures::stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        Some((Ok::<_, Infallible>(sse::encode(&event)), events))
    });

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(frames))
}

/// POST /api/edit-slide - rewrite one slide from a natural-language instruction
pub async fn edit_slide(
    state: web::Data<AppState>,
    body: web::Json<EditSlideRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();

    let presentation = request
        .presentation
        .filter(|p| p.get("slides").is_some_and(Value::is_array))
        .and_then(|p| match serde_json::from_value::<Presentation>(p) {
            Ok(presentation) => Some(presentation),
            Err(e) => {
                log::warn!("Rejected edit request with malformed presentation: {}", e);
                None
            }
        })
        .ok_or_else(|| AppError::Validation("Valid presentation with slides is required".to_string()))?;

    // Anything that is not an integer fails index validation.
    let slide_index = request.slide_index.as_ref().and_then(Value::as_i64).unwrap_or(-1);
    let instruction = request.instruction.unwrap_or_default();

    let updated = state.editor.edit(&presentation, slide_index, &instruction).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "presentation": updated })))
}

/// POST /api/export - download the deck as a `.pptx` file
pub async fn export_presentation(body: web::Json<Presentation>) -> Result<HttpResponse, AppError> {
    let presentation = body.into_inner();
    let bytes = export::export_pptx(&presentation)?;
    Ok(HttpResponse::Ok()
        .content_type(export::PPTX_CONTENT_TYPE)
        .insert_header(ContentDisposition::attachment(export::file_name(&presentation)))
        .body(bytes))
}

/// GET /api/conversations
pub async fn list_conversations(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.storage.list_conversations().await)
}

/// POST /api/conversations
pub async fn create_conversation(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let conversation = state.storage.create_conversation().await.map_err(AppError::Storage)?;
    Ok(HttpResponse::Ok().json(conversation))
}

/// GET /api/conversations/{id}
pub async fn get_conversation(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let conversation = state
        .storage
        .get_conversation(&path)
        .await
        .ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(conversation))
}

/// DELETE /api/conversations/{id} - returns the remaining conversations
pub async fn delete_conversation(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    log::warn!("Deleting conversation {}", path);
    let remaining = state
        .storage
        .delete_conversation(&path)
        .await
        .map_err(AppError::Storage)?;
    Ok(HttpResponse::Ok().json(remaining))
}

/// POST /api/conversations/{id}/messages - append or replace a message by id
pub async fn upsert_message(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ChatMessage>,
) -> Result<HttpResponse, AppError> {
    let conversation = state
        .storage
        .upsert_message(&path, body.into_inner())
        .await
        .map_err(AppError::Storage)?
        .ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(conversation))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}
