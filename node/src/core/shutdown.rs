use log::info;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Tells long running tasks to stop and waits for them.
pub struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    _shutdown_rcv: broadcast::Receiver<()>,
    handles: Vec<JoinHandle<anyhow::Result<()>>>,
}

/// Held by a task, completes when the task should stop.
pub struct Shutdown {
    shutdown_signal_rcv: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Also completes when the manager is gone.
    pub async fn recv(&mut self) {
        let _ = self.shutdown_signal_rcv.recv().await;
    }
}

impl ShutdownManager {
    pub fn init() -> ShutdownManager {
        let (shutdown_tx, shutdown_rcv) = broadcast::channel(1);
        Self {
            shutdown_tx,
            _shutdown_rcv: shutdown_rcv,
            handles: vec![],
        }
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            shutdown_signal_rcv: self.shutdown_tx.subscribe(),
        }
    }

    pub fn add_handle(&mut self, handle: JoinHandle<anyhow::Result<()>>) {
        self.handles.push(handle);
    }

    pub async fn stop(self) {
        info!("Starting shutdown");
        if self.shutdown_tx.send(()).is_err() {
            info!("No tasks listening for shutdown");
        }
        info!("Waiting for tasks to finish");
        for handle in self.handles {
            match handle.await {
                Ok(Ok(())) => info!("Task finished successfully"),
                Ok(Err(e)) => info!("Task finished with error: {}", e),
                Err(e) => info!("Task panicked or was cancelled: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_stop_signals_subscribers() {
        let mut manager = ShutdownManager::init();
        let mut shutdown = manager.subscribe();
        let (stopped_tx, mut stopped_rcv) = tokio::sync::oneshot::channel();
        manager.add_handle(tokio::spawn(async move {
            shutdown.recv().await;
            let _ = stopped_tx.send(());
            Ok(())
        }));
        assert!(stopped_rcv.try_recv().is_err());

        manager.stop().await;

        assert!(stopped_rcv.try_recv().is_ok());
    }
}
