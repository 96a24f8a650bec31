use clap::Parser;

use crate::chain::DEFAULT_HASH_PREFIX;
use crate::config::{
    Configuration, NodeConfiguration, RelayConfiguration, DEFAULT_RELAY_HOST, DEFAULT_RELAY_PORT,
};

#[derive(Debug, Clone, Parser)]
pub struct InitCmd {
    #[arg(long, default_value = "default")]
    pub name: String,
    /// Address the relay listens on.
    #[clap(long, default_value = DEFAULT_RELAY_HOST)]
    pub host: String,
    #[clap(long, default_value_t = DEFAULT_RELAY_PORT)]
    pub port: u16,
    /// Relay the node connects to, defaults to `ws://<host>:<port>`.
    #[clap(long)]
    pub relay_url: Option<String>,
    #[clap(long, default_value = DEFAULT_HASH_PREFIX)]
    pub hash_prefix: String,
}

impl InitCmd {
    pub fn execute(self) -> anyhow::Result<()> {
        if Configuration::try_load_from_home_dir(&self.name).is_ok() {
            anyhow::bail!("Configuration file already exists: {}", self.name);
        }
        if !self.hash_prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("Hash prefix must be hex: {}", self.hash_prefix);
        }

        let relay_url = self
            .relay_url
            .unwrap_or_else(|| format!("ws://{}:{}", self.host, self.port));
        let configuration = Configuration {
            relay: RelayConfiguration {
                host: self.host,
                port: self.port,
            },
            node: NodeConfiguration {
                name: self.name.clone(),
                relay_url,
                hash_prefix: self.hash_prefix.to_lowercase(),
            },
        };

        let path = configuration.try_write_home_dir(&self.name)?;
        println!("Created chainsync configuration in: {path:?}");
        println!("Configuration: {configuration:?}");
        Ok(())
    }
}
