use std::path::PathBuf;

use clap::Parser;
use tokio::io::BufReader;

use crate::cli::shutdown_signal;
use crate::config::Configuration;
use crate::core::ShutdownManager;
use crate::node::{Console, ConsoleCommand, NodeCoordinator, NodeHandle};

#[derive(Debug, Clone, Parser)]
pub struct RunNodeCmd {
    #[clap(short, long)]
    pub config_file: String,
}

impl RunNodeCmd {
    pub async fn execute(&self) -> anyhow::Result<()> {
        let conf = match Configuration::try_load(PathBuf::from(self.config_file.as_str())) {
            Ok(conf) => conf,
            Err(err) => anyhow::bail!("Error loading configuration file: {err:?}"),
        };

        let (coordinator, handle) = NodeCoordinator::new(&conf.node);

        let mut shutdown_manager = ShutdownManager::init();
        let node_handle = tokio::spawn(coordinator.run(shutdown_manager.subscribe()));
        shutdown_manager.add_handle(node_handle);

        let status_printer = tokio::spawn(print_status_changes(handle.clone()));

        tokio::select! {
            result = shutdown_signal() => result?,
            _ = run_console(handle) => {}
        }

        status_printer.abort();
        shutdown_manager.stop().await;
        Ok(())
    }
}

async fn print_status_changes(handle: NodeHandle) {
    let mut status = handle.subscribe_status();
    while status.changed().await.is_ok() {
        println!("{}", *status.borrow());
    }
}

async fn run_console(handle: NodeHandle) {
    let mut console = Console::new(BufReader::new(tokio::io::stdin()));
    println!("Commands: tx <sender> <recipient> <amount> | mine | chain | status | quit");

    while let Some(command) = console.next_command().await {
        let command = match command {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        let result = match command {
            ConsoleCommand::AddTransaction(transaction) => handle.add_transaction(transaction).await,
            ConsoleCommand::Mine => handle.mine_block().await,
            ConsoleCommand::Chain => handle.chain().await.map(|chain| {
                for block in chain {
                    println!("{block}");
                    for transaction in &block.transactions {
                        println!("    {transaction}");
                    }
                }
            }),
            ConsoleCommand::Status => handle.status().await.map(|status| println!("{status}")),
            ConsoleCommand::Quit => break,
        };
        if let Err(err) = result {
            println!("{err}");
        }
    }
}
