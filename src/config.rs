use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

const DEFAULT_RIPPER: &str = "makemkvcon";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to get home directory")]
    NoHomeDir,
}

/// Application configuration
/// In debug builds: a .env file is loaded first
/// Values come from DISCPLAN_* environment variables
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Ripping executable, looked up on PATH when not absolute
    pub ripper_path: PathBuf,
    /// SQLite file holding sessions, logs and known discs
    pub database_path: PathBuf,
}

impl Config {
    /// Load configuration based on build mode
    pub fn load() -> Result<Self, ConfigError> {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                info!("Config: Dev mode activated - loaded .env file");
            }
        }

        Self::from_vars(
            std::env::var("DISCPLAN_MAKEMKVCON").ok(),
            std::env::var("DISCPLAN_DB_PATH").ok(),
        )
    }

    fn from_vars(ripper: Option<String>, database: Option<String>) -> Result<Self, ConfigError> {
        let ripper_path = PathBuf::from(ripper.unwrap_or_else(|| DEFAULT_RIPPER.to_string()));
        let database_path = match database {
            Some(path) => PathBuf::from(path),
            None => Self::data_dir()?.join("discplan.sqlite"),
        };

        info!(
            "Config: ripper {}, database {}",
            ripper_path.display(),
            database_path.display()
        );
        Ok(Self {
            ripper_path,
            database_path,
        })
    }

    /// ~/.discplan, where the database lives by default
    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home_dir.join(".discplan"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_values_win() {
        let config = Config::from_vars(
            Some("/opt/ripper/bin/makemkvcon".to_string()),
            Some("/tmp/discs.sqlite".to_string()),
        )
        .unwrap();
        assert_eq!(config.ripper_path, PathBuf::from("/opt/ripper/bin/makemkvcon"));
        assert_eq!(config.database_path, PathBuf::from("/tmp/discs.sqlite"));
    }

    #[test]
    fn test_defaults() {
        let Ok(data_dir) = Config::data_dir() else {
            return;
        };
        let config = Config::from_vars(None, None).unwrap();
        assert_eq!(config.ripper_path, PathBuf::from("makemkvcon"));
        assert_eq!(config.database_path, data_dir.join("discplan.sqlite"));
    }
}
