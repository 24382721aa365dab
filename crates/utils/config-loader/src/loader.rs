use config::{Config, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

fn resolve_path(path: &str) -> Result<PathBuf, ConfigError> {
    std::fs::canonicalize(PathBuf::from(path)).map_err(|e| ConfigError::Foreign(Box::new(e)))
}

fn build_config<T>(path: &Path, env: Option<Environment>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let mut builder = Config::builder().add_source(File::from(path));

    if let Some(env) = env {
        builder = builder.add_source(env);
    }

    builder
        .build()?
        .try_deserialize::<T>()
        .map_err(|e| ConfigError::Foreign(Box::new(e)))
}

/// Load configuration from a single file, format picked by its extension.
pub fn load_config<T>(path: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let config_path = resolve_path(path)?;
    build_config(&config_path, None)
}

/// Load configuration from a file, overridden by `PREFIX__SECTION__KEY`
/// environment variables.
pub fn load_config_with_env<T>(path: &str, prefix: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let config_path = resolve_path(path)?;
    build_config(&config_path, Some(env_source(prefix)))
}

fn env_source(prefix: &str) -> Environment {
    Environment::with_prefix(prefix)
        .separator("__")
        .try_parsing(true)
}
