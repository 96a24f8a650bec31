use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::core::Shutdown;
use crate::relay::{Connection, ConnectionId, MessageRouter, RelayEvent};

/// Accepts websocket connections from nodes and drives the [`MessageRouter`].
pub struct RelayServer {
    listener: TcpListener,
    router: MessageRouter,
    events_tx: mpsc::UnboundedSender<RelayEvent>,
    events_rcv: mpsc::UnboundedReceiver<RelayEvent>,
    next_connection_id: u64,
    connected_nodes_tx: watch::Sender<usize>,
}

impl RelayServer {
    pub async fn bind(address: &str) -> anyhow::Result<RelayServer> {
        let listener = TcpListener::bind(address).await?;
        log::info!(
            "Listening for node connections on {}",
            listener.local_addr()?
        );

        let (events_tx, events_rcv) = mpsc::unbounded_channel();
        let (connected_nodes_tx, _) = watch::channel(0);
        Ok(RelayServer {
            listener,
            router: MessageRouter::new(),
            events_tx,
            events_rcv,
            next_connection_id: 0,
            connected_nodes_tx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of connected nodes, updated after every connection event.
    pub fn connected_nodes(&self) -> watch::Receiver<usize> {
        self.connected_nodes_tx.subscribe()
    }

    pub async fn run(mut self, mut shutdown: Shutdown) -> anyhow::Result<()> {
        log::info!("Starting relay...");
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, address)) => {
                            log::debug!("Accepted connection from: {address}");
                            self.handle_connection(stream, address);
                        }
                        Err(err) => {
                            self.router.on_transport_error(None, &format!("accept failed: {err}"));
                        }
                    }
                }
                Some(event) = self.events_rcv.recv() => {
                    log::trace!("Relay event: {event:?}");
                    self.router.handle_event(event);
                    self.connected_nodes_tx.send_replace(self.router.connections().len());
                }
                _ = shutdown.recv() => {
                    log::info!("Shutting down relay");
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_connection(&mut self, stream: TcpStream, address: SocketAddr) {
        let id = ConnectionId(self.next_connection_id);
        self.next_connection_id += 1;

        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            serve_connection(id, stream, address, events_tx).await;
            log::debug!("Connection {id} task finished");
        });
    }
}

async fn serve_connection(
    id: ConnectionId,
    stream: TcpStream,
    address: SocketAddr,
    events_tx: mpsc::UnboundedSender<RelayEvent>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(err) => {
            let _ = events_tx.send(RelayEvent::TransportError {
                connection: None,
                error: format!("websocket handshake with {address} failed: {err}"),
            });
            return;
        }
    };
    let (mut sink, mut stream) = ws_stream.split();

    let (frames_tx, mut frames_rcv) = mpsc::unbounded_channel::<WsMessage>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = frames_rcv.recv().await {
            if let Err(err) = sink.send(frame).await {
                log::error!("Error sending message to {id}: {err}");
                break;
            }
        }
    });

    let connection = Connection::new(id, Some(address), frames_tx);
    if events_tx.send(RelayEvent::Connected(connection)).is_err() {
        writer.abort();
        return;
    }

    let mut error = None;
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                if events_tx
                    .send(RelayEvent::Message { sender: id, text })
                    .is_err()
                {
                    break;
                }
            }
            Ok(WsMessage::Binary(_)) => {
                log::warn!("Received data of unsupported type from {id}, ignoring");
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                error = Some(err.to_string());
                break;
            }
        }
    }

    //Once the writer is gone the connection counts as dead
    writer.abort();
    let _ = writer.await;

    let event = match error {
        Some(error) => RelayEvent::TransportError {
            connection: Some(id),
            error,
        },
        None => RelayEvent::Closed(id),
    };
    let _ = events_tx.send(event);
}
