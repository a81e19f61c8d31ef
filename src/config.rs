use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::quiz::Difficulty;

const APP_DIR: &str = "quizwhiz";

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    pub groq_api_key: Option<String>,
    pub default_model: Option<String>,
    pub data_dir: Option<PathBuf>,
    /// Profile used when no --user flag is given
    pub current_user: Option<i64>,
    #[serde(default)]
    pub quiz: QuizDefaults,
    #[serde(default)]
    pub review: ReviewDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizDefaults {
    pub question_count: usize,
    pub time_limit_minutes: Option<u32>,
    pub difficulty: Difficulty,
}

impl Default for QuizDefaults {
    fn default() -> Self {
        Self {
            question_count: 10,
            time_limit_minutes: None,
            difficulty: Difficulty::Medium,
        }
    }
}

impl QuizDefaults {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_minutes
            .filter(|m| *m > 0)
            .map(|m| Duration::minutes(m as i64))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewDefaults {
    pub session_size: usize,
}

impl Default for ReviewDefaults {
    fn default() -> Self {
        Self { session_size: 20 }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let base = dirs::config_dir().context("Could not determine config directory")?;
        Ok(base.join(APP_DIR))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory holding the database, honouring the `data_dir` override
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let base = dirs::data_dir().context("Could not determine data directory")?;
                Ok(base.join(APP_DIR))
            }
        }
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("quizwhiz.db"))
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let config: Config =
                toml::from_str(&content).with_context(|| "Failed to parse config file")?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to file with secure permissions (600)
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Config path has no parent directory"))?;

        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {:?}", dir))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, &content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        // The file holds an API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)
                .with_context(|| "Failed to set config file permissions")?;
        }

        Ok(())
    }

    /// Check if Groq API key is configured
    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_some()
    }

    /// Get the Groq API key, checking environment variable as fallback
    pub fn get_api_key(&self) -> Option<String> {
        self.groq_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("GROQ_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}
