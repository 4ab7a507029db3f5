use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use subplay_bridge::config::Config;
use tokio::{
    fs::{OpenOptions, create_dir_all, read_to_string},
    io::AsyncWriteExt,
};

/// Errors that can occur while loading or resolving application configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to determine the user's configuration directory. This usually
    /// occurs when required environment variables are missing (e.g., `$HOME`
    /// on Unix or `%APPDATA%` on Windows).
    #[error("failed to obtain user's directories")]
    DirectoriesNotFound,
    /// An I/O error occurred while reading or writing the configuration file.
    #[error("failed to read config: {0}")]
    IoError(#[from] std::io::Error),
    /// The configuration file contains invalid TOML or does not match the expected structure.
    #[error("failed to deserialize config: {0}")]
    DeserializeError(#[from] toml::de::Error),
    /// Failed to serialize the default configuration to TOML.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

fn config_file_path() -> Result<PathBuf, ConfigError> {
    match ProjectDirs::from("dev", "subplay", "subplay") {
        Some(dirs) => Ok(dirs.config_dir().join("config.toml")),
        None => Err(ConfigError::DirectoriesNotFound),
    }
}

/// Loads the application configuration from the user's configuration
/// directory. Returns the loaded config and the file it came from.
pub async fn load_config() -> Result<(Config, PathBuf), ConfigError> {
    let config_path = config_file_path()?;
    let config = load_config_from(&config_path).await?;
    Ok((config, config_path))
}

/// Loads the configuration stored at `config_path`, writing the defaults there
/// first when the file does not exist yet.
pub async fn load_config_from(config_path: &Path) -> Result<Config, ConfigError> {
    log::info!("Loading configuration from {config_path:?}");
    if config_path.exists() {
        let contents = read_to_string(config_path).await?;
        let config: Config = toml::from_str(&contents)?;
        return Ok(config);
    }

    let config = Config::default();
    if let Some(parent) = config_path.parent() {
        create_dir_all(parent).await?;
    }

    let contents = toml::to_string_pretty(&config)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(config_path)
        .await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;

    Ok(config)
}
