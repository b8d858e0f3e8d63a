//! Shared test infrastructure for the HTTP-level tests.
//!
//! Provides a scripted model provider, a zero-pacing model config and an
//! `AppState` backed by a temporary SQLite file.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::web;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use slidesmith_lib::api::{DeltaStream, LLMApiProvider, PromptMessage};
use slidesmith_lib::config::{AppConfig, ModelConfig};
use slidesmith_lib::models::{Presentation, Slide, SlideLayout};
use slidesmith_lib::state::AppState;
use slidesmith_lib::storage::StorageManager;

// ============================================================================
// CANNED MODEL REPLIES
// ============================================================================

pub const DECK_REPLY: &str = r#"Sure! Here is your deck:
```json
{
  "title": "Solar Energy",
  "slides": [
    {"title": "Solar Energy", "content": ["Clean power from the sun"], "layout": "title"},
    {"title": "How It Works", "content": ["- Panels capture light", "- Inverters convert DC to AC"]},
    {"title": "Benefits", "content": "- Lower bills\n- **Zero** emissions", "layout": "bogus"}
  ]
}
```
Let me know if you want changes."#;

pub const SOLAR_DECK_REPLY: &str = r#"{
  "title": "Solar Energy: Powering the Future",
  "description": "An overview of solar power",
  "slides": [
    {"title": "Solar Energy: Powering the Future", "content": ["Harnessing the sun for clean power"], "layout": "title"},
    {"title": "How Solar Panels Work", "content": ["Photovoltaic cells convert light", "Inverters produce AC power"]},
    {"title": "Benefits", "content": ["Renewable", "Lower energy bills", "Reduced emissions"]},
    {"title": "Challenges", "content": ["Intermittent supply", "Storage costs"]},
    {"title": "The Road Ahead", "content": ["Falling panel prices", "Grid-scale batteries"]}
  ]
}"#;

pub const SHORTER_TITLE_REPLY: &str = r#"{"title": "Solar Energy", "content": ["Harnessing the sun for clean power"]}"#;

pub const EDIT_REPLY: &str = r#"{"title": "Why Solar Wins", "content": ["Cheaper every year", "No fuel costs"]}"#;

// ============================================================================
// SCRIPTED PROVIDER
// ============================================================================

/// Model provider that replays scripted replies in order (the last one
/// repeats) and records every call.
pub struct ScriptedProvider {
    replies: std::result::Result<Vec<String>, String>,
    chunk_chars: usize,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<PromptMessage>>,
}

impl ScriptedProvider {
    pub fn replying(reply: &str) -> Arc<Self> {
        Self::in_sequence(&[reply])
    }

    pub fn in_sequence(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Ok(replies.iter().map(|r| r.to_string()).collect()),
            chunk_chars: 7,
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: Err(message.to_string()),
            chunk_chars: 7,
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<PromptMessage> {
        self.last_messages.lock().unwrap().clone()
    }

    fn record(&self, messages: &[PromptMessage]) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        match &self.replies {
            Ok(replies) => Ok(replies[call.min(replies.len() - 1)].clone()),
            Err(e) => Err(anyhow!(e.clone())),
        }
    }
}

#[async_trait]
impl LLMApiProvider for ScriptedProvider {
    async fn send_chat_stream_request(
        &self,
        _config: &ModelConfig,
        _api_key: &str,
        messages: &[PromptMessage],
    ) -> Result<DeltaStream> {
        let text = self.record(messages)?;
        let chars: Vec<char> = text.chars().collect();
        let chunks: Vec<Result<String>> = chars
            .chunks(self.chunk_chars)
            .map(|c| Ok(c.iter().collect()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn send_chat_request(
        &self,
        _config: &ModelConfig,
        _api_key: &str,
        messages: &[PromptMessage],
    ) -> Result<String> {
        self.record(messages)
    }
}

// ============================================================================
// APP SETUP
// ============================================================================

pub fn test_model() -> ModelConfig {
    ModelConfig {
        name: "scripted".to_string(),
        api_url: "http://127.0.0.1:9".to_string(),
        model: "scripted-model".to_string(),
        api_key_ref: Some("none".to_string()),
        request_timeout: Duration::from_secs(5),
    }
}

/// Opens a StorageManager on a fresh temporary database.
///
/// The TempDir must be kept alive for as long as the storage is used.
pub async fn setup_storage() -> (TempDir, StorageManager) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let storage = StorageManager::new(&dir.path().join("test.sqlite"))
        .await
        .expect("Failed to open test storage");
    (dir, storage)
}

/// Application state wired to `provider`, with pacing disabled.
pub async fn setup_state(provider: Arc<dyn LLMApiProvider>) -> (TempDir, web::Data<AppState>) {
    let (dir, storage) = setup_storage().await;
    let config = AppConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        db_path: dir.path().join("test.sqlite"),
        model: test_model(),
        pacing: Duration::ZERO,
    };
    (dir, web::Data::new(AppState::new(storage, provider, &config)))
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn sample_deck() -> Presentation {
    let slide = |title: &str, bullets: &[&str], order: usize| Slide {
        id: format!("slide-{order}"),
        presentation_id: Some("deck-1".to_string()),
        title: title.to_string(),
        content: bullets.iter().map(|b| b.to_string()).collect(),
        layout: if order == 0 { SlideLayout::Title } else { SlideLayout::Content },
        order,
        created_at: None,
        updated_at: None,
    };
    Presentation {
        id: "deck-1".to_string(),
        title: "Solar energy".to_string(),
        description: Some("Why solar matters".to_string()),
        slides: vec![
            slide("Solar energy", &["Power from the **sun**"], 0),
            slide("Benefits", &["Lower bills", "**Zero** emissions"], 1),
            slide("Outlook", &["Costs keep falling"], 2),
        ],
        created_at: None,
        updated_at: None,
    }
}
