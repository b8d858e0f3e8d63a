use anyhow::{Context, Result};
use keyring::Entry;
use std::path::PathBuf;
use std::time::Duration;

const KEYRING_SERVICE: &str = "slidesmith_api_key";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_DB_PATH: &str = "data/slidesmith.sqlite";
const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_KEY_REF: &str = "env:OPENAI_API_KEY";
const DEFAULT_PACING_MS: u64 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// Represents the configured model endpoint
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub name: String,
    pub api_url: String,
    pub model: String,
    // Reference to the key, not the key itself - 'keyring', 'env:MY_API_KEY' or 'none'
    pub api_key_ref: Option<String>,
    pub request_timeout: Duration,
}

// Server-wide settings, read once at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub model: ModelConfig,
    /// Base pause between narration events; zero disables pacing.
    pub pacing: Duration,
}

impl AppConfig {
    /// Loads `.env` (if present) and reads `SLIDESMITH_*` variables.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => log::info!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => log::debug!("No .env file found"),
            Err(e) => return Err(anyhow::Error::from(e).context("Failed to read .env file")),
        }

        let pacing_ms = parse_var("SLIDESMITH_PACING_MS", DEFAULT_PACING_MS)?;
        let timeout_secs = parse_var("SLIDESMITH_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let model = var_or("SLIDESMITH_MODEL", DEFAULT_MODEL);

        Ok(Self {
            bind_addr: var_or("SLIDESMITH_BIND", DEFAULT_BIND),
            db_path: PathBuf::from(var_or("SLIDESMITH_DB", DEFAULT_DB_PATH)),
            model: ModelConfig {
                name: model.clone(),
                api_url: var_or("SLIDESMITH_API_URL", DEFAULT_API_URL),
                model,
                api_key_ref: Some(var_or("SLIDESMITH_API_KEY_REF", DEFAULT_API_KEY_REF)),
                request_timeout: Duration::from_secs(timeout_secs),
            },
            pacing: Duration::from_millis(pacing_ms),
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got '{}'", name, raw)),
        _ => Ok(default),
    }
}

// --- API Key Retrieval ---

/// Retrieves the API key for the model configuration.
/// It checks the `api_key_ref` field to determine whether to read from
/// environment variables or the OS keyring. `none` yields an empty key for
/// local endpoints that do not authenticate.
pub fn get_api_key(config: &ModelConfig) -> Result<String> {
    match config.api_key_ref.as_deref() {
        Some(ref_str) if ref_str.starts_with("env:") => {
            let env_var_name = ref_str.trim_start_matches("env:");
            log::debug!("Retrieving API key from environment variable: {}", env_var_name);
            std::env::var(env_var_name).context(format!(
                "Failed to get API key from environment variable '{}'",
                env_var_name
            ))
        }
        Some("keyring") => {
            let entry = Entry::new(KEYRING_SERVICE, &config.name) // Use config name as "username"
                .context("Failed to create keyring entry")?;
            log::debug!("Retrieving API key from keyring for service: {}", KEYRING_SERVICE);
            entry.get_password().context(format!(
                "Failed to get API key from keyring for '{}'",
                config.name
            ))
        }
        Some("none") => Ok(String::new()),
        Some(other) => Err(anyhow::anyhow!("Unsupported api_key_ref format: {}", other)),
        None => Err(anyhow::anyhow!(
            "API key reference not set for model config '{}'",
            config.name
        )),
    }
}
