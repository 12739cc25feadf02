// Toolkit wiring
//
// Builds every store and engine from one AppConfig. Nothing here is global:
// two toolkits over different data dirs or providers can coexist.

use std::sync::Arc;

use crate::analysis::IntegrationAnalyzer;
use crate::characters::{CharacterGenerator, CharacterStore};
use crate::config::AppConfig;
use crate::dialogue::DialogueEngine;
use crate::error::Result;
use crate::exploration::ExplorationEngine;
use crate::providers::{create_provider, LlmProvider};
use crate::storage::FileStore;
use crate::templates::TemplateRenderer;
use crate::validation::ConcurrentValidator;

pub struct Toolkit {
    pub config: AppConfig,
    pub provider: Arc<dyn LlmProvider>,
    pub templates: Arc<TemplateRenderer>,
    pub characters: CharacterStore,
    pub dialogue: Arc<DialogueEngine>,
    pub exploration: ExplorationEngine,
    pub generator: CharacterGenerator,
    pub validator: ConcurrentValidator,
    pub analyzer: IntegrationAnalyzer,
}

impl Toolkit {
    /// Toolkit talking to the provider selected in `config`
    pub fn new(config: AppConfig) -> Result<Self> {
        let provider = create_provider(&config)?;
        Self::with_provider(config, provider)
    }

    /// Toolkit over an already constructed provider
    pub fn with_provider(config: AppConfig, provider: Arc<dyn LlmProvider>) -> Result<Self> {
        let templates = Arc::new(TemplateRenderer::load(config.templates.dir.as_deref())?);
        let data_dir = config.storage.data_dir.clone();
        let format = config.storage.format;

        let characters = CharacterStore::open(&data_dir, format)?;

        let dialogue = Arc::new(
            DialogueEngine::new(
                Arc::clone(&provider),
                Arc::clone(&templates),
                characters.clone(),
                FileStore::open(&data_dir, format)?,
                config.generation.clone(),
            )
            .with_context_window(config.dialogue.context_window),
        );

        let exploration = ExplorationEngine::new(
            Arc::clone(&provider),
            Arc::clone(&templates),
            FileStore::open(&data_dir, format)?,
            config.generation.clone(),
        );

        let generator = CharacterGenerator::new(
            Arc::clone(&provider),
            Arc::clone(&templates),
            characters.clone(),
            config.generation.clone(),
        );

        let validator = ConcurrentValidator::new(
            Arc::clone(&dialogue),
            Arc::clone(&templates),
            FileStore::open(&data_dir, format)?,
            config.validation.clone(),
        );

        let analyzer = IntegrationAnalyzer::new(
            Arc::clone(&provider),
            Arc::clone(&templates),
            FileStore::open(&data_dir, format)?,
            FileStore::open(&data_dir, format)?,
            config.analysis.clone(),
            config.generation.timeout(),
        );

        tracing::debug!(
            "Toolkit ready: provider={}, data_dir={}",
            provider.name(),
            data_dir.display()
        );

        Ok(Self {
            config,
            provider,
            templates,
            characters,
            dialogue,
            exploration,
            generator,
            validator,
            analyzer,
        })
    }
}
