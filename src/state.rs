use crate::api::LLMApiProvider;
use crate::config::AppConfig;
use crate::editor::SlideEditor;
use crate::orchestrator::Generator;
use crate::storage::StorageManager;
use std::sync::Arc;

// Core application state shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageManager>,
    pub generator: Generator,
    pub editor: Arc<SlideEditor>,
}

impl AppState {
    pub fn new(storage: StorageManager, api_provider: Arc<dyn LLMApiProvider>, config: &AppConfig) -> Self {
        Self {
            storage: Arc::new(storage),
            generator: Generator::new(api_provider.clone(), config.model.clone(), config.pacing),
            editor: Arc::new(SlideEditor::new(api_provider, config.model.clone())),
        }
    }
}
