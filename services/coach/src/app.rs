//! Application Wiring
//!
//! Builds the session store, the coaching tools, and the runner (with or
//! without the LLM reasoning delegate) from a loaded `Config`.

use crate::config::{Config, Provider};
use anyhow::{Context, Result};
use async_openai::config::OpenAIConfig;
use coach_core::{
    delegate::{LlmReasoningDelegate, SYSTEM_PROMPT},
    dispatcher::ActionDispatcher,
    llm_client::{CompletionSettings, OpenAICompatibleClient},
    runner::SessionRunner,
    session::{JsonFileSessionStore, SessionStore},
    tools::{CoachingTools, ExerciseCatalog, StoreTools},
};
use std::{collections::HashMap, fs, path::Path, sync::Arc};
use tracing::info;

/// Everything a CLI command needs, created once per process.
pub struct App {
    pub store: Arc<dyn SessionStore>,
    pub tools: Arc<dyn CoachingTools>,
    pub runner: SessionRunner,
}

/// A helper function to load prompts from a directory.
pub fn load_prompts(prompts_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in fs::read_dir(prompts_path)
        .with_context(|| format!("Failed to read prompts directory {}", prompts_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

/// Resolves the system prompt: `system_prompt.md` from `PROMPTS_PATH` if
/// configured, the built-in prompt otherwise.
pub fn system_prompt(config: &Config) -> Result<String> {
    match &config.prompts_path {
        Some(path) => load_prompts(path)?
            .remove("system_prompt")
            .context("system_prompt.md not found in prompts directory"),
        None => Ok(SYSTEM_PROMPT.to_string()),
    }
}

impl App {
    /// Wires the application. `use_reasoning = false` skips the delegate even
    /// when a provider is configured.
    pub async fn build(config: &Config, use_reasoning: bool) -> Result<Self> {
        let store: Arc<dyn SessionStore> = Arc::new(
            JsonFileSessionStore::open(&config.session_store_path)
                .await
                .context("Failed to open session store")?,
        );
        Self::with_store(config, store, use_reasoning)
    }

    /// Wires the application around an existing store.
    pub fn with_store(
        config: &Config,
        store: Arc<dyn SessionStore>,
        use_reasoning: bool,
    ) -> Result<Self> {
        let tools: Arc<dyn CoachingTools> =
            Arc::new(StoreTools::new(store.clone(), ExerciseCatalog::default()));
        let dispatcher = Arc::new(ActionDispatcher::new(tools.clone()));
        let mut runner = SessionRunner::new(store.clone(), dispatcher);

        match (use_reasoning, config.provider.api_base(), config.api_key()) {
            (true, Some(api_base), Some(api_key)) => {
                info!(provider = ?config.provider, model = %config.chat_model, "Reasoning delegate enabled");
                let openai_config = OpenAIConfig::new()
                    .with_api_key(api_key)
                    .with_api_base(api_base);
                let llm_client = Arc::new(OpenAICompatibleClient::new(
                    openai_config,
                    config.chat_model.clone(),
                    CompletionSettings {
                        temperature: config.temperature,
                        max_tokens: config.max_tokens,
                    },
                ));
                let delegate = LlmReasoningDelegate::new(
                    llm_client,
                    system_prompt(config)?,
                    config.max_iterations,
                );
                runner = runner.with_delegate(Arc::new(delegate));
            }
            _ => info!("Reasoning delegate disabled, using the decision policy only"),
        }

        Ok(Self {
            store,
            tools,
            runner,
        })
    }
}
