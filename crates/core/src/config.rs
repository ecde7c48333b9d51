use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub voice: VoiceConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct VoiceConfig {
    pub interpreter: String,
    pub dispatch_script: PathBuf,
    pub status_script: PathBuf,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub voice_interpreter: Option<String>,
    pub voice_dispatch_script: Option<PathBuf>,
    pub voice_status_script: Option<PathBuf>,
    pub voice_timeout_secs: Option<u64>,
    pub server_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://maitre.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.0-flash-lite".to_string(),
                timeout_secs: 30,
            },
            voice: VoiceConfig {
                interpreter: "python3".to_string(),
                dispatch_script: PathBuf::from("voice-agent/voiceAgentRunner.py"),
                status_script: PathBuf::from("voice-agent/check_status.py"),
                timeout_secs: 120,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3001,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("maitre.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(voice) = patch.voice {
            if let Some(interpreter) = voice.interpreter {
                self.voice.interpreter = interpreter;
            }
            if let Some(dispatch_script) = voice.dispatch_script {
                self.voice.dispatch_script = dispatch_script;
            }
            if let Some(status_script) = voice.status_script {
                self.voice.status_script = status_script;
            }
            if let Some(timeout_secs) = voice.timeout_secs {
                self.voice.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(url) = env_var("MAITRE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(key) = env_var("MAITRE_LLM_API_KEY").or_else(|| env_var("GEMINI_API_KEY")) {
            self.llm.api_key = Some(key.into());
        }
        if let Some(model) = env_var("MAITRE_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(interpreter) = env_var("MAITRE_VOICE_INTERPRETER") {
            self.voice.interpreter = interpreter;
        }
        if let Some(script) = env_var("MAITRE_VOICE_DISPATCH_SCRIPT") {
            self.voice.dispatch_script = PathBuf::from(script);
        }
        if let Some(script) = env_var("MAITRE_VOICE_STATUS_SCRIPT") {
            self.voice.status_script = PathBuf::from(script);
        }
        if let Some(raw) = env_var("MAITRE_VOICE_TIMEOUT_SECS") {
            self.voice.timeout_secs = raw.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "MAITRE_VOICE_TIMEOUT_SECS".to_string(),
                value: raw,
            })?;
        }
        if let Some(raw) = env_var("MAITRE_SERVER_PORT") {
            self.server.port = raw.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "MAITRE_SERVER_PORT".to_string(),
                value: raw,
            })?;
        }
        if let Some(level) = env_var("MAITRE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(raw) = env_var("MAITRE_LOG_FORMAT") {
            self.logging.format = raw.parse()?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(key) = overrides.llm_api_key {
            self.llm.api_key = Some(key.into());
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(interpreter) = overrides.voice_interpreter {
            self.voice.interpreter = interpreter;
        }
        if let Some(script) = overrides.voice_dispatch_script {
            self.voice.dispatch_script = script;
        }
        if let Some(script) = overrides.voice_status_script {
            self.voice.status_script = script;
        }
        if let Some(timeout_secs) = overrides.voice_timeout_secs {
            self.voice.timeout_secs = timeout_secs;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.llm.api_key.is_none() {
            return Err(ConfigError::Validation(
                "llm.api_key is required (set GEMINI_API_KEY or MAITRE_LLM_API_KEY)".to_string(),
            ));
        }
        if self.voice.interpreter.trim().is_empty() {
            return Err(ConfigError::Validation("voice.interpreter must not be empty".to_string()));
        }
        if self.voice.timeout_secs == 0 {
            return Err(ConfigError::Validation("voice.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    if let Some(from_env) = env_var("MAITRE_CONFIG") {
        let path = PathBuf::from(from_env);
        return path.exists().then_some(path);
    }
    let default = PathBuf::from("maitre.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    voice: Option<VoicePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VoicePatch {
    interpreter: Option<String>,
    dispatch_script: Option<PathBuf>,
    status_script: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::sync::{Mutex, OnceLock};

    use super::*;

    // AppConfig::load reads the process environment, so every test that calls
    // it serializes on this lock and starts from a cleared environment.
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    const MANAGED_VARS: &[&str] = &[
        "MAITRE_CONFIG",
        "MAITRE_DATABASE_URL",
        "MAITRE_LLM_API_KEY",
        "GEMINI_API_KEY",
        "MAITRE_LLM_MODEL",
        "MAITRE_VOICE_INTERPRETER",
        "MAITRE_VOICE_DISPATCH_SCRIPT",
        "MAITRE_VOICE_STATUS_SCRIPT",
        "MAITRE_VOICE_TIMEOUT_SECS",
        "MAITRE_SERVER_PORT",
        "MAITRE_LOG_LEVEL",
        "MAITRE_LOG_FORMAT",
    ];

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn options_with_key(database_url: &str) -> LoadOptions {
        LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/maitre.toml")),
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                llm_api_key: Some("test-key".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[test]
    fn load_fails_without_llm_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/maitre.toml")),
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        match result {
            Err(ConfigError::Validation(message)) => {
                ensure(message.contains("llm.api_key"), "error should name llm.api_key")
            }
            other => Err(format!("expected validation failure, got {other:?}")),
        }
    }

    #[test]
    fn overrides_take_effect() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        let mut options = options_with_key("sqlite::memory:");
        options.overrides.server_port = Some(9099);
        options.overrides.voice_interpreter = Some("sh".to_string());

        let config =
            AppConfig::load(options).map_err(|err| format!("config load failed: {err}"))?;
        ensure(config.database.url == "sqlite::memory:", "override database url should win")?;
        ensure(config.server.port == 9099, "override server port should win")?;
        ensure(config.voice.interpreter == "sh", "override interpreter should win")?;
        ensure(config.llm.model == "gemini-2.0-flash-lite", "model should keep its default")
    }

    #[test]
    fn env_overrides_land_in_config() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        env::set_var("MAITRE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("MAITRE_SERVER_PORT", "4555");
        env::set_var("MAITRE_LOG_FORMAT", "json");
        env::set_var("GEMINI_API_KEY", "env-key");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions {
                config_path: Some(PathBuf::from("/nonexistent/maitre.toml")),
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-env.db",
                "env database url should land in the config",
            )?;
            ensure(config.server.port == 4555, "env server port should land in the config")?;
            ensure(
                config.logging.format == LogFormat::Json,
                "env log format should land in the config",
            )?;
            ensure(config.llm.api_key.is_some(), "env api key should satisfy validation")
        })();

        clear_vars(MANAGED_VARS);
        result
    }

    #[test]
    fn non_numeric_server_port_env_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        env::set_var("MAITRE_SERVER_PORT", "not-a-port");
        env::set_var("GEMINI_API_KEY", "env-key");

        let result = (|| -> Result<(), String> {
            match AppConfig::load(LoadOptions {
                config_path: Some(PathBuf::from("/nonexistent/maitre.toml")),
                ..LoadOptions::default()
            }) {
                Err(ConfigError::InvalidEnvOverride { key, value }) => {
                    ensure(key == "MAITRE_SERVER_PORT", "error should name the offending var")?;
                    ensure(value == "not-a-port", "error should carry the rejected value")
                }
                other => Err(format!("expected invalid env override error, got {other:?}")),
            }
        })();

        clear_vars(MANAGED_VARS);
        result
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/maitre.toml")),
            require_file: true,
            ..LoadOptions::default()
        });
        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "a required config file that is absent should be reported",
        )
    }

    #[test]
    fn log_format_parses_known_values() {
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn zero_voice_timeout_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(MANAGED_VARS);

        let mut options = options_with_key("sqlite::memory:");
        options.overrides.voice_timeout_secs = Some(0);

        ensure(
            matches!(AppConfig::load(options), Err(ConfigError::Validation(_))),
            "a zero voice timeout should fail validation",
        )
    }
}
