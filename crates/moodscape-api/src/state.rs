use moodscape_ai::{provider_from_config, ChatAssistant, ChatProvider, JournalAnalyzer, MoodAnalyzer};
use moodscape_core::{ConfigManager, JwtManager, MoodscapeError, PasswordHasher};
use moodscape_store::Store;
use std::sync::Arc;

use crate::middleware::RateLimiters;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigManager>,
    pub store: Store,
    pub jwt: JwtManager,
    pub hasher: Arc<PasswordHasher>,
    pub journal_analyzer: JournalAnalyzer,
    pub mood_analyzer: MoodAnalyzer,
    pub chat: ChatAssistant,
    pub limiters: Arc<RateLimiters>,
}

impl AppState {
    /// Open the database and build the AI provider from configuration.
    pub async fn new(config: Arc<ConfigManager>) -> moodscape_core::Result<Self> {
        let settings = config.config();
        let store = Store::open(settings.database.path(), settings.database.pool_size)
            .map_err(|e| MoodscapeError::Database(e.to_string()))?;
        let provider =
            provider_from_config(&settings.ai).map_err(|e| MoodscapeError::Provider(e.to_string()))?;

        Self::with_parts(config, store, provider)
    }

    /// Assemble state around an existing store and an optional provider.
    pub fn with_parts(
        config: Arc<ConfigManager>,
        store: Store,
        provider: Option<Arc<dyn ChatProvider>>,
    ) -> moodscape_core::Result<Self> {
        let auth = config.auth_config()?;
        let limiters = RateLimiters::new(&config.config().rate_limit);

        Ok(Self {
            jwt: JwtManager::new(&auth),
            hasher: Arc::new(PasswordHasher::new()),
            journal_analyzer: JournalAnalyzer::new(provider.clone()),
            mood_analyzer: MoodAnalyzer::new(provider.clone()),
            chat: ChatAssistant::new(provider),
            limiters: Arc::new(limiters),
            store,
            config,
        })
    }
}
