use std::sync::Arc;

use maitre_agent::{GeminiClient, VenueExtractor};
use maitre_core::config::{AppConfig, ConfigError, LoadOptions};
use maitre_db::{connect, RestaurantRepository};
use maitre_voice::ScriptVoiceAgentClient;
use thiserror::Error;
use tracing::info;

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("llm client initialization failed: {0}")]
    Llm(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    let llm = GeminiClient::new(&config.llm).map_err(BootstrapError::Llm)?;
    let extractor = Arc::new(VenueExtractor::new(Arc::new(llm)));
    let voice = Arc::new(ScriptVoiceAgentClient::new(&config.voice));
    let restaurants = Arc::new(RestaurantRepository::new(db_pool.clone()));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        llm_model = %config.llm.model,
        voice_interpreter = %config.voice.interpreter,
        "application components initialized"
    );

    Ok(Application { config, state: AppState { extractor, restaurants, voice } })
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::sync::{Mutex, OnceLock};

    use maitre_core::config::{ConfigOverrides, LoadOptions};

    use super::*;

    // Config loading reads the process environment; keep these tests from
    // racing each other and from inheriting a developer's live credentials.
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        let guard = match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for var in ["GEMINI_API_KEY", "MAITRE_LLM_API_KEY", "MAITRE_DATABASE_URL", "MAITRE_CONFIG"]
        {
            env::remove_var(var);
        }
        guard
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_an_api_key() {
        let _guard = env_guard();

        let result = bootstrap(LoadOptions {
            config_path: Some("/nonexistent/maitre.toml".into()),
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        match result {
            Err(BootstrapError::Config(error)) => {
                assert!(error.to_string().contains("llm.api_key"));
            }
            other => panic!("expected config failure, got {:?}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn bootstrap_succeeds_with_required_settings() {
        let _guard = env_guard();

        let app = bootstrap(LoadOptions {
            config_path: Some("/nonexistent/maitre.toml".into()),
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                llm_api_key: Some("test-key".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed");

        assert_eq!(app.config.server.port, 3001);
    }
}
