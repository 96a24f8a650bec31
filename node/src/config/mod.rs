use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::DEFAULT_HASH_PREFIX;

pub const DEFAULT_RELAY_HOST: &str = "127.0.0.1";
pub const DEFAULT_RELAY_PORT: u16 = 3000;

const CHAINSYNC_ROOT_DIR: &str = ".chainsync";
const CONFIG_FILE_NAME: &str = "chainsync.toml";

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("ParsingFailed: {0}")]
    ParsingFailed(#[from] config::ConfigError),
    #[error("TomlError: {0}")]
    TomlError(#[from] toml::ser::Error),
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Could not find home directory")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub relay: RelayConfiguration,
    pub node: NodeConfiguration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfiguration {
    pub host: String,
    pub port: u16,
}

impl RelayConfiguration {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for RelayConfiguration {
    fn default() -> Self {
        Self {
            host: DEFAULT_RELAY_HOST.to_string(),
            port: DEFAULT_RELAY_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfiguration {
    pub name: String,
    /// Websocket url of the relay, e.g. `ws://127.0.0.1:3000`.
    pub relay_url: String,
    /// Hex prefix a block hash must start with.
    pub hash_prefix: String,
}

impl NodeConfiguration {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            relay_url: format!("ws://{DEFAULT_RELAY_HOST}:{DEFAULT_RELAY_PORT}"),
            hash_prefix: DEFAULT_HASH_PREFIX.to_string(),
        }
    }
}

impl Configuration {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            relay: RelayConfiguration::default(),
            node: NodeConfiguration::new(name),
        }
    }

    pub fn try_load<I: Into<PathBuf>>(path: I) -> Result<Configuration> {
        let path = path.into();
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?;

        config.try_deserialize().map_err(|err| err.into())
    }

    pub fn try_load_from_home_dir(name: &str) -> Result<Configuration> {
        let path = Self::config_file_path(name)?;
        Self::try_load(path)
    }

    pub fn try_write<I: Into<PathBuf>>(&self, path: I) -> Result<()> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config = toml::to_string(&self)?;
        let config = format!("#This file is generated by chainsync init\n{config}");

        let mut file = std::fs::File::create(path)?;
        file.write_all(config.as_bytes())?;
        Ok(())
    }

    pub fn try_write_home_dir(&self, name: &str) -> Result<PathBuf> {
        let path = Self::config_file_path(name)?;
        self.try_write(path.clone())?;
        Ok(path)
    }

    /// `~/.chainsync`
    pub fn root_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(CHAINSYNC_ROOT_DIR))
            .ok_or(ConfigurationError::NoHomeDir)
    }

    pub fn config_file_path(name: &str) -> Result<PathBuf> {
        Ok(Self::root_dir()?.join(name).join(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::*;

    fn temp_config_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("chainsync-{}", uuid::Uuid::new_v4()))
            .join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_write_and_load() {
        let path = temp_config_path();
        let mut configuration = Configuration::new("node1");
        configuration.relay.port = 4000;
        configuration.node.hash_prefix = "00".to_string();

        configuration.try_write(path.clone()).unwrap();
        let loaded = Configuration::try_load(path.clone()).unwrap();

        assert_eq!(loaded, configuration);
        assert_eq!(loaded.relay.address(), "127.0.0.1:4000");
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        assert_matches!(
            Configuration::try_load(temp_config_path()),
            Err(ConfigurationError::ParsingFailed(_))
        );
    }

    #[test]
    fn test_defaults() {
        let configuration = Configuration::new("node1");

        assert_eq!(configuration.relay.address(), "127.0.0.1:3000");
        assert_eq!(configuration.node.relay_url, "ws://127.0.0.1:3000");
        assert_eq!(configuration.node.hash_prefix, "0000");
    }
}
