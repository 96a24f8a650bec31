use std::path::PathBuf;

use clap::Parser;

use crate::cli::shutdown_signal;
use crate::config::Configuration;
use crate::core::ShutdownManager;
use crate::relay::RelayServer;

#[derive(Debug, Clone, Parser)]
pub struct RunRelayCmd {
    #[clap(short, long)]
    pub config_file: String,
}

impl RunRelayCmd {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let conf = match Configuration::try_load(PathBuf::from(self.config_file.as_str())) {
            Ok(conf) => conf,
            Err(err) => anyhow::bail!("Error loading configuration file: {err:?}"),
        };

        let relay = RelayServer::bind(&conf.relay.address()).await?;

        let mut shutdown_manager = ShutdownManager::init();
        let relay_handle = tokio::spawn(relay.run(shutdown_manager.subscribe()));
        shutdown_manager.add_handle(relay_handle);

        //Wait shutdown signal
        shutdown_signal().await?;
        shutdown_manager.stop().await;
        Ok(())
    }
}
