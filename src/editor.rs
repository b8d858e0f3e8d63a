//! Natural-language edits of a single slide.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::api::LLMApiProvider;
use crate::assembler::normalize_content;
use crate::config::{self, ModelConfig};
use crate::extraction::{self, ExtractionError};
use crate::models::Presentation;
use crate::prompts;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("{0}")]
    Validation(String),
    #[error("model call failed: {0:#}")]
    Model(anyhow::Error),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("Model did not return valid bullet points")]
    EmptyContent,
}

/// Checks an edit request before any model call is made.
pub fn validate(presentation: &Presentation, slide_index: i64, instruction: &str) -> Result<usize, EditError> {
    let index = usize::try_from(slide_index)
        .ok()
        .filter(|i| *i < presentation.slides.len())
        .ok_or_else(|| EditError::Validation("slideIndex must reference an existing slide".to_string()))?;
    if instruction.trim().is_empty() {
        return Err(EditError::Validation("instruction is required".to_string()));
    }
    Ok(index)
}

/// Applies a model reply to a copy of the deck, replacing only the target slide.
pub fn merge_edit(presentation: &Presentation, slide_index: usize, reply: &Value) -> Result<Presentation, EditError> {
    let target = presentation
        .slides
        .get(slide_index)
        .ok_or_else(|| EditError::Validation("slideIndex must reference an existing slide".to_string()))?;

    let title = reply
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(&target.title)
        .to_string();

    let content = normalize_content(reply.get("content"));
    if content.is_empty() {
        return Err(EditError::EmptyContent);
    }

    let now = Utc::now();
    let mut updated = presentation.clone();
    updated.updated_at = Some(now);
    let slide = &mut updated.slides[slide_index];
    slide.title = title;
    slide.content = content;
    slide.updated_at = Some(now);
    Ok(updated)
}

pub struct SlideEditor {
    provider: Arc<dyn LLMApiProvider>,
    model: ModelConfig,
    // Edits to the same deck run one at a time
    deck_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SlideEditor {
    pub fn new(provider: Arc<dyn LLMApiProvider>, model: ModelConfig) -> Self {
        Self {
            provider,
            model,
            deck_locks: DashMap::new(),
        }
    }

    /// Rewrites slide `slide_index` of `presentation` according to `instruction`
    /// and returns the updated copy; the input is left untouched.
    pub async fn edit(
        &self,
        presentation: &Presentation,
        slide_index: i64,
        instruction: &str,
    ) -> Result<Presentation, EditError> {
        let index = validate(presentation, slide_index, instruction)?;

        let lock = self
            .deck_locks
            .entry(presentation.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        let result = self.request_edit(presentation, index, instruction).await;

        drop(guard);
        // Drop the lock entry once nobody else is waiting on it.
        self.deck_locks
            .remove_if(&presentation.id, |_, l| Arc::strong_count(l) <= 2);
        result
    }

    async fn request_edit(
        &self,
        presentation: &Presentation,
        index: usize,
        instruction: &str,
    ) -> Result<Presentation, EditError> {
        let api_key = config::get_api_key(&self.model).map_err(EditError::Model)?;
        let messages = prompts::edit_messages(presentation, index, instruction);

        log::info!("Editing slide {} of presentation {}", index + 1, presentation.id);
        let raw_text = self
            .provider
            .send_chat_request(&self.model, &api_key, &messages)
            .await
            .map_err(EditError::Model)?;

        let reply = extraction::extract(&raw_text, None)?;
        merge_edit(presentation, index, &reply)
    }
}
