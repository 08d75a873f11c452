use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use super::paths::AppPaths;

/// Typed application settings, loaded from `config.yml` with environment
/// overrides for secrets and deploy-time values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub gemini: GeminiSettings,
    pub extraction: ExtractionSettings,
    pub rag: RagSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Maximum number of live chat sessions kept in the registry before the
    /// least-recently-used one is evicted.
    pub session_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings::default(),
            gemini: GeminiSettings::default(),
            extraction: ExtractionSettings::default(),
            rag: RagSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            port: 8000,
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for GeminiSettings {
    fn default() -> Self {
        GeminiSettings {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: String::new(),
            chat_model: "gemini-2.5-flash".to_string(),
            embedding_model: "text-embedding-005".to_string(),
        }
    }
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        ExtractionSettings {
            base_url: "http://127.0.0.1:8081".to_string(),
        }
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        RagSettings {
            session_capacity: 64,
        }
    }
}

impl Settings {
    pub fn load(paths: &AppPaths) -> Self {
        let mut settings = read_config_file(paths).unwrap_or_default();
        settings.apply_env_overrides();
        settings
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                self.gemini.api_key = key;
            }
        }
        if let Ok(origins) = env::var("ALLOWED_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
            if !parsed.is_empty() {
                self.server.allowed_origins = parsed;
            }
        }
        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
    }
}

fn config_path(paths: &AppPaths) -> PathBuf {
    if let Ok(path) = env::var("LECTERN_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    let user_config = paths.user_data_dir.join("config.yml");
    if user_config.exists() {
        return user_config;
    }

    paths.project_root.join("config.yml")
}

fn read_config_file(paths: &AppPaths) -> Option<Settings> {
    let path = config_path(paths);
    if !path.exists() {
        return None;
    }

    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!("Failed to read {}: {}", path.display(), err);
            return None;
        }
    };

    match serde_yaml::from_str::<Settings>(&contents) {
        Ok(settings) => Some(settings),
        Err(err) => {
            tracing::warn!("Invalid config at {}: {}", path.display(), err);
            None
        }
    }
}
