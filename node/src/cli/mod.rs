use clap::Parser;

pub mod init;
pub mod run_node;
pub mod run_relay;

#[derive(Parser, Debug, Clone)]
#[command()]
pub struct Cli {
    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(Clone, Debug, clap::Subcommand)]
pub enum Subcommand {
    /// Writes a new configuration to ~/.chainsync/<name>/chainsync.toml
    Init(init::InitCmd),
    RunRelay(run_relay::RunRelayCmd),
    RunNode(run_node::RunNodeCmd),
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<()> {
        match self.subcommand {
            Subcommand::Init(init) => init.execute(),
            Subcommand::RunRelay(run_relay) => run_relay.execute().await,
            Subcommand::RunNode(run_node) => run_node.execute().await,
        }
    }
}

/// Completes on SIGINT or SIGTERM.
pub(crate) async fn shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut stream_int = signal(SignalKind::interrupt())?;
    let mut stream_term = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = stream_int.recv() => {
            log::info!("Received SIGINT");
        }
        _ = stream_term.recv() => {
            log::info!("Received SIGTERM");
        }
    }
    Ok(())
}
