use crate::error::{ConfigError, Result as AppResult};
use crate::game_logic::Theme;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GroqConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.7,
            request_timeout_secs: 30,
        }
    }
}

impl GroqConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// The API key never ends up in logs.
impl fmt::Debug for GroqConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroqConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub questions_per_round: usize,
    pub answer_time_limit_secs: u64,
    pub default_theme: Theme,
    pub prize_per_correct_answer: u64,
    pub source_attempts: u32,
    pub retry_backoff_ms: u64,
    pub session_idle_timeout_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            questions_per_round: 5,
            answer_time_limit_secs: 20,
            default_theme: Theme::Science,
            prize_per_correct_answer: 1000,
            source_attempts: 2,
            retry_backoff_ms: 500,
            session_idle_timeout_secs: 30 * 60,
        }
    }
}

impl GameConfig {
    pub fn answer_time_limit(&self) -> Duration {
        Duration::from_secs(self.answer_time_limit_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    pub file_path: String,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            file_path: "highscores.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub server: ServerConfig,
    pub groq: GroqConfig,
    pub game: GameConfig,
    pub leaderboard: LeaderboardConfig,
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.groq.api_key.trim().is_empty() {
            return Err(ConfigError::Missing(
                "groq.api_key (set GROQ_API_KEY or MILLIONAIRE__GROQ__API_KEY)".to_string(),
            ));
        }
        if self.game.questions_per_round == 0 {
            return Err(ConfigError::InvalidValue(
                "game.questions_per_round must be at least 1".to_string(),
            ));
        }
        if self.game.source_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "game.source_attempts must be at least 1".to_string(),
            ));
        }
        if self.game.answer_time_limit_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "game.answer_time_limit_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_settings() -> AppResult<AppSettings> {
    let mut builder = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("MILLIONAIRE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );

    // Plain GROQ_API_KEY is the lowest-priority source for the key.
    if let Ok(api_key) = std::env::var("GROQ_API_KEY") {
        builder = builder
            .set_default("groq.api_key", api_key)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    settings_from_builder(builder)
}

fn settings_from_builder(builder: ConfigBuilder<DefaultState>) -> AppResult<AppSettings> {
    let settings: AppSettings = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    settings.validate()?;
    Ok(settings)
}
