use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origin allowed to send credentialed requests (the SPA frontend).
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_database() -> PathBuf {
    PathBuf::from("database/skillbase.db")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            upload_dir: default_upload_dir(),
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

impl Config {
    /// Load from a TOML file if it exists, otherwise fall back to defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

/// OpenAI-compatible endpoint settings, read from the environment.
/// Absent variables disable the chat assistant rather than failing startup.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl AiConfig {
    pub fn from_env() -> Option<Self> {
        let _ = dotenvy::dotenv();
        let api_key = dotenvy::var("OPENAI_API_KEY").ok()?;
        let base_url = dotenvy::var("OPENAI_BASE_URL").ok()?;
        let model = dotenvy::var("AI_MODEL").ok()?;
        Some(Self {
            api_key,
            base_url,
            model,
        })
    }
}
