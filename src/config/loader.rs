//! Configuration loading: file, then environment overrides.

use super::types::Config;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "NEXUSTODO_CONFIG_PATH";

/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "nexustodo.yaml";

/// Loads a [`Config`] and remembers which file it came from.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: Config,
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load from the process environment.
    ///
    /// `explicit` (the `--config` flag) wins over `NEXUSTODO_CONFIG_PATH`;
    /// an explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with_env(explicit, |key| std::env::var(key).ok())
    }

    /// Load using `env` to look up environment variables.
    pub fn load_with_env<F>(explicit: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| non_empty(&env, CONFIG_PATH_ENV).map(PathBuf::from));

        let (mut config, config_path) = match explicit {
            Some(path) => (load_file(&path)?, Some(path)),
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    (load_file(&path)?, Some(path))
                } else {
                    (Config::default(), None)
                }
            }
        };

        apply_env_overrides(&mut config, &env)?;

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Get the config file path that was used.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Load configuration from a YAML file. An empty file yields defaults.
fn load_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: Option<Config> = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    Ok(config.unwrap_or_default())
}

fn non_empty<F>(env: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(key).filter(|value| !value.is_empty())
}

/// Apply environment variable overrides to config. Empty values are ignored.
fn apply_env_overrides<F>(config: &mut Config, env: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(db_path) = non_empty(env, "DATABASE_PATH") {
        config.server.db_path = PathBuf::from(db_path);
    }

    if let Some(host) = non_empty(env, "HOST") {
        config.server.host = host
            .parse()
            .with_context(|| format!("invalid HOST value {:?}", host))?;
    }

    if let Some(port) = non_empty(env, "PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("invalid PORT value {:?}", port))?;
    }

    if let Some(token) = non_empty(env, "DEFAULT_TOKEN") {
        config.server.auth_token = token;
    }

    Ok(())
}
