use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use fluency_core::{GenerationParams, HistoryWindow, SystemDirective, VoiceSelection};
use tracing::info;

const CONFIG_DIR_NAME: &str = "fluency";
const API_KEY_ENV: &str = "GROQ_API_KEY";
const DATABASE_URL_ENV: &str = "FLUENCY_DATABASE_URL";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub therapist: TherapistConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "Config::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Directory for temporary audio files; system temp dir when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TherapistConfig {
    #[serde(default = "TherapistConfig::default_model")]
    pub model: String,
    #[serde(default = "TherapistConfig::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "TherapistConfig::default_temperature")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_transcript_reply: Option<String>,
    /// Number of past exchanges sent to the model; full history when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
}

impl Default for TherapistConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            max_tokens: Self::default_max_tokens(),
            temperature: Self::default_temperature(),
            system_prompt: None,
            empty_transcript_reply: None,
            history_limit: None,
        }
    }
}

impl TherapistConfig {
    fn default_model() -> String {
        "llama-3.3-70b-versatile".to_string()
    }

    const fn default_max_tokens() -> u32 {
        250
    }

    const fn default_temperature() -> f32 {
        0.6
    }

    #[must_use]
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    #[must_use]
    pub fn directive(&self) -> SystemDirective {
        self.system_prompt
            .as_ref()
            .map_or_else(SystemDirective::default, SystemDirective::new)
    }

    #[must_use]
    pub fn history_window(&self) -> HistoryWindow {
        self.history_limit
            .map_or_else(HistoryWindow::unbounded, HistoryWindow::last_turns)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranscriptionConfig {
    #[serde(default = "TranscriptionConfig::default_model")]
    pub model: String,
    #[serde(default = "TranscriptionConfig::default_language")]
    pub language: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: Self::default_model(),
            language: Self::default_language(),
        }
    }
}

impl TranscriptionConfig {
    fn default_model() -> String {
        "whisper-large-v3-turbo".to_string()
    }

    fn default_language() -> String {
        "en".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SpeechConfig {
    #[serde(default = "SpeechConfig::default_language")]
    pub language: String,
    #[serde(default = "SpeechConfig::default_tld")]
    pub tld: String,
    #[serde(default)]
    pub slow: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: Self::default_language(),
            tld: Self::default_tld(),
            slow: false,
        }
    }
}

impl SpeechConfig {
    fn default_language() -> String {
        "en".to_string()
    }

    fn default_tld() -> String {
        "com".to_string()
    }

    #[must_use]
    pub fn voice(&self) -> VoiceSelection {
        VoiceSelection {
            language: self.language.clone(),
            slow: self.slow,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub groq: ProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "DatabaseConfig::default_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
        }
    }
}

impl DatabaseConfig {
    fn default_url() -> String {
        dirs::home_dir().map_or_else(
            || "sqlite://conversations.db?mode=rwc".to_string(),
            |home| {
                format!(
                    "sqlite://{}?mode=rwc",
                    home.join(CONFIG_DIR_NAME)
                        .join("conversations.db")
                        .display()
                )
            },
        )
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
        }
    }
}

impl ServerConfig {
    fn default_bind() -> String {
        "0.0.0.0:8000".to_string()
    }
}

impl Config {
    const fn default_request_timeout_secs() -> u64 {
        60
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join(CONFIG_DIR_NAME))
    }

    /// Load `~/fluency/config.json`, then apply `.env` and environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        let config_path = Self::config_dir()?.join("config.json");

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'fluency init' to create config.",
                config_path.display()
            );
        }

        let content = std::fs::read_to_string(&config_path)?;
        let mut config = Self::from_json(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Environment values win over the file. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.providers.groq.api_key = key;
        }
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.database.url = url;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let key = self.providers.groq.api_key.trim();
        if key.is_empty() || key == "your-groq-api-key-here" {
            anyhow::bail!(
                "Please set your Groq API key in the config file or the {API_KEY_ENV} environment variable."
            );
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        std::fs::write(&config_path, CONFIG_TEMPLATE)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Add your Groq API key (or export {API_KEY_ENV})");
        println!("   2. Run 'fluency turn --user <name> --audio <recording>' to try one turn");
        println!("   3. Run 'fluency serve' to start the practice web service");
        println!();
        println!("🔧 Configuration options:");
        println!("   - therapist.history_limit: past exchanges sent to the model (default: all)");
        println!("   - speech.slow: slower synthesized speech for pacing exercises");
        println!();
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = r#"{
  "therapist": {
    "model": "llama-3.3-70b-versatile",
    "max_tokens": 250,
    "temperature": 0.6
  },
  "transcription": {
    "model": "whisper-large-v3-turbo",
    "language": "en"
  },
  "speech": {
    "language": "en",
    "tld": "com",
    "slow": false
  },
  "providers": {
    "groq": {
      "api_key": "your-groq-api-key-here"
    }
  },
  "server": {
    "bind": "0.0.0.0:8000"
  },
  "request_timeout_secs": 60
}"#;
