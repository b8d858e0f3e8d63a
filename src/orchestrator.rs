//! End-to-end "topic to deck" generation as an ordered event stream.
//!
//! Narration events are cosmetic; only their order and types are fixed. The
//! model output is accumulated in full and never forwarded, since partial JSON
//! cannot be rendered.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::api::LLMApiProvider;
use crate::assembler;
use crate::config::{self, ModelConfig};
use crate::extraction::{self, SLIDES_ANCHOR};
use crate::models::{Presentation, ReasoningKind, ReasoningStep};
use crate::prompts;

const EVENT_BUFFER: usize = 16;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GenerationEvent {
    Reasoning { step: ReasoningStep },
    Progress { message: String },
    Presentation { presentation: Presentation },
    Error { error: String },
    /// End of a successful stream; framed as the `[DONE]` sentinel.
    #[serde(skip)]
    Done,
}

impl GenerationEvent {
    fn reasoning(kind: ReasoningKind, content: String) -> Self {
        Self::Reasoning { step: ReasoningStep::new(kind, content) }
    }

    fn progress(message: impl Into<String>) -> Self {
        Self::Progress { message: message.into() }
    }
}

/// The receiving side went away; nothing more should be produced.
#[derive(Debug)]
struct Disconnected;

#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn LLMApiProvider>,
    model: ModelConfig,
    pacing: Duration,
}

impl Generator {
    pub fn new(provider: Arc<dyn LLMApiProvider>, model: ModelConfig, pacing: Duration) -> Self {
        Self { provider, model, pacing }
    }

    /// Starts generating a deck for `topic` on a background task.
    ///
    /// The returned channel yields events in order and closes after `Done` or
    /// `Error`. Dropping it cancels the generation.
    pub fn generate(&self, topic: String) -> mpsc::Receiver<GenerationEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let generator = self.clone();
        tokio::spawn(async move {
            match generator.run(&topic, &tx).await {
                Ok(()) => log::info!("Generation finished for topic '{}'", topic),
                Err(Disconnected) => log::warn!("Client disconnected, generation for '{}' stopped", topic),
            }
        });
        rx
    }

    async fn run(&self, topic: &str, tx: &mpsc::Sender<GenerationEvent>) -> Result<(), Disconnected> {
        emit(tx, GenerationEvent::reasoning(
            ReasoningKind::Thinking,
            format!(
                "I will start by researching {topic} to gather comprehensive information for your presentation. \
                 I'll analyze key concepts, features, applications, and importance. After gathering enough \
                 information, I will structure it into a professional presentation with 5-8 slides."
            ),
        ))
        .await?;
        self.pause(8).await;

        emit(tx, GenerationEvent::reasoning(
            ReasoningKind::Searching,
            format!(
                "I've completed the initial research for \"{topic}\". I've gathered a good amount of information \
                 about its key aspects, features, and applications.\n\nNow, I will delve deeper by analyzing the \
                 most relevant information to ensure a comprehensive understanding of {topic}."
            ),
        ))
        .await?;

        let full_text = match self.request_model_text(topic, tx).await? {
            Ok(text) => text,
            Err(e) => {
                log::error!("Model invocation failed for '{}': {:?}", topic, e);
                emit(tx, GenerationEvent::Error { error: format!("{e:#}") }).await?;
                return Ok(());
            }
        };
        log::debug!("Model returned {} chars for '{}'", full_text.len(), topic);

        emit(tx, GenerationEvent::progress("Processing AI response...")).await?;
        self.pause(2).await;

        let parsed = match extraction::extract(&full_text, Some(SLIDES_ANCHOR)) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Extraction failed for '{}': {}", topic, e);
                None
            }
        };

        let presentation = assembler::assemble(parsed.as_ref(), &full_text, topic);
        if parsed.is_some() {
            self.narrate_assembly(&presentation, tx).await?;
        }

        emit(tx, GenerationEvent::Presentation { presentation }).await?;
        emit(tx, GenerationEvent::Done).await
    }

    /// Opens the model stream and drains it. The outer result reports a
    /// disconnect, the inner one a model failure.
    async fn request_model_text(
        &self,
        topic: &str,
        tx: &mpsc::Sender<GenerationEvent>,
    ) -> Result<anyhow::Result<String>, Disconnected> {
        let api_key = match config::get_api_key(&self.model) {
            Ok(key) => key,
            Err(e) => return Ok(Err(e)),
        };

        let messages = prompts::generation_messages(topic);
        let mut delta_stream = match self
            .provider
            .send_chat_stream_request(&self.model, &api_key, &messages)
            .await
        {
            Ok(stream) => stream,
            Err(e) => return Ok(Err(e)),
        };

        emit(tx, GenerationEvent::reasoning(
            ReasoningKind::Generating,
            format!(
                "I have thoroughly researched {topic}, covering its key aspects, features, applications, and \
                 importance. I am now ready to generate a professional presentation for you.\n\n\
                 Here is your presentation on {topic}:"
            ),
        ))
        .await?;
        self.pause(3).await;
        emit(tx, GenerationEvent::progress("Generating presentation content...")).await?;

        let mut full_text = String::new();
        loop {
            let delta_result = tokio::select! {
                // Dropping the stream releases the upstream connection, even
                // while it is stalled between chunks.
                _ = tx.closed() => return Err(Disconnected),
                next = delta_stream.next() => match next {
                    Some(result) => result,
                    None => break,
                },
            };
            match delta_result {
                Ok(delta) => full_text.push_str(&delta),
                Err(e) => return Ok(Err(e.context("Model stream failed mid-response"))),
            }
        }
        Ok(Ok(full_text))
    }

    async fn narrate_assembly(
        &self,
        presentation: &Presentation,
        tx: &mpsc::Sender<GenerationEvent>,
    ) -> Result<(), Disconnected> {
        let total = presentation.slides.len();
        emit(tx, GenerationEvent::progress(format!("Creating {total} slides..."))).await?;
        self.pause(3).await;

        for index in (0..total).step_by(2) {
            emit(tx, GenerationEvent::progress(format!("Generating slide {}/{}...", index + 1, total))).await?;
        }

        emit(tx, GenerationEvent::progress("Generating layouts...")).await?;
        self.pause(3).await;
        emit(tx, GenerationEvent::progress("Finalizing presentation...")).await?;
        self.pause(2).await;
        Ok(())
    }

    async fn pause(&self, factor: u32) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing * factor).await;
        }
    }
}

async fn emit(tx: &mpsc::Sender<GenerationEvent>, event: GenerationEvent) -> Result<(), Disconnected> {
    tx.send(event).await.map_err(|_| Disconnected)
}
