use std::{
    env,
    fmt::{self, Display},
    path::PathBuf,
    str::FromStr,
};

use log::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub media_root: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("FOODGRAM_PORT", "8000")?,
            database_url: require("DATABASE_URL")?,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            jwt_secret: require("JWT_SECRET")?,
            media_root: try_load("MEDIA_ROOT", "media")?,
        })
    }
}

/// Settings of the CSV data importer.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub database_url: String,
    pub data_dir: PathBuf,
}

impl ImportConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require("DATABASE_URL")?,
            data_dir: try_load("IMPORT_DATA_DIR", "data")?,
        })
    }
}

#[derive(Debug)]
pub struct ConfigError {
    info: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment misconfigured: {}", self.info)
    }
}

impl std::error::Error for ConfigError {}

fn require(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError {
        info: format!("{key} must be set"),
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        ConfigError {
            info: format!("invalid {key} value '{value}': {e}"),
        }
    })
}
