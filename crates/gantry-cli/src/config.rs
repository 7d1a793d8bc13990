//! CLI configuration management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GantryConfig {
    /// Maximum jobs running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Cache directory; the platform cache dir when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Timeout for jobs that declare none.
    #[serde(default = "default_timeout_minutes")]
    pub default_timeout_minutes: u64,
    /// Shell used to run commands.
    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_timeout_minutes() -> u64 {
    60
}

fn default_shell() -> String {
    "sh".to_string()
}

impl Default for GantryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            cache_dir: None,
            default_timeout_minutes: default_timeout_minutes(),
            shell: default_shell(),
        }
    }
}

impl GantryConfig {
    /// Load configuration from the working directory or the user config
    /// dir, then apply environment overrides.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = match Self::config_path()? {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// The first existing config file, if any.
    pub fn config_path() -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
        let local = PathBuf::from(".gantry/config.yaml");
        if local.exists() {
            return Ok(Some(local));
        }
        let user = Self::project_dirs()?.config_dir().join("config.yaml");
        Ok(user.exists().then_some(user))
    }

    /// Resolved cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::project_dirs()?.cache_dir().to_path_buf()),
        }
    }

    fn project_dirs() -> Result<directories::ProjectDirs, Box<dyn std::error::Error>> {
        Ok(directories::ProjectDirs::from("dev", "gantry", "gantry")
            .ok_or("Could not determine config directory")?)
    }

    fn apply_env(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(value) = var("GANTRY_MAX_CONCURRENCY") {
            self.max_concurrency = value
                .parse()
                .map_err(|_| format!("Invalid GANTRY_MAX_CONCURRENCY: {}", value))?;
        }
        if let Some(value) = var("GANTRY_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(value));
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be at least 1".into());
        }
        Ok(())
    }
}
