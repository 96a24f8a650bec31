use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::chain::{Block, Transaction};
use crate::protocol::{Message, MessageBody, RawMessage};
use crate::transport::pending::{PendingRequests, ReplySender};
use crate::transport::{Result, TransportError};
use crate::utilities::CorrelationId;

/// Messages from the relay that are not replies to our own requests.
pub type UnsolicitedMessages = mpsc::UnboundedReceiver<Message>;

pub(crate) enum Delivery {
    /// Caller only wants to know that the message left.
    Transmitted(oneshot::Sender<Result<()>>),
    /// Caller waits for the message with the same correlation id.
    AwaitReply(ReplySender),
}

impl Delivery {
    fn reject(self, error: TransportError) {
        //Nobody to tell if the caller went away
        match self {
            Delivery::Transmitted(done) => {
                let _ = done.send(Err(error));
            }
            Delivery::AwaitReply(reply) => {
                let _ = reply.send(Err(error));
            }
        }
    }
}

pub(crate) struct Outbound {
    pub(crate) message: Message,
    pub(crate) delivery: Delivery,
}

/// Handle to the relay connection. Cheap to clone, all clones share the connection.
#[derive(Clone)]
pub struct TransportController {
    commands_tx: mpsc::UnboundedSender<Outbound>,
}

impl TransportController {
    /// Starts connecting to the relay at `url` in the background.
    ///
    /// Messages sent before the connection is open are queued and go out once the
    /// handshake completes. If the handshake fails, every send fails with
    /// [`TransportError::ConnectionFailed`]. There is no reconnection.
    pub fn connect<U: Into<String>>(url: U) -> (TransportController, UnsolicitedMessages) {
        let (commands_tx, commands_rcv) = mpsc::unbounded_channel();
        let (unsolicited_tx, unsolicited_rcv) = mpsc::unbounded_channel();

        let task = ConnectionTask::new(url.into(), commands_rcv, unsolicited_tx);
        tokio::spawn(task.run());

        (TransportController { commands_tx }, unsolicited_rcv)
    }

    /// Sends `message` without waiting for a reply.
    pub async fn send(&self, message: Message) -> Result<()> {
        log::trace!("send({message})");
        let (tx, rcv) = oneshot::channel();
        self.submit(message, Delivery::Transmitted(tx))?;
        rcv.await.map_err(|_| TransportError::ControllerStopped)?
    }

    /// Sends `message` and waits for the reply carrying the same correlation id.
    ///
    /// There is no timeout. If nobody replies the returned future never completes.
    pub async fn request(&self, message: Message) -> Result<Message> {
        log::trace!("request({message})");
        let (tx, rcv) = oneshot::channel();
        self.submit(message, Delivery::AwaitReply(tx))?;
        rcv.await.map_err(|_| TransportError::ControllerStopped)?
    }

    /// Asks the network for its longest chain. An empty chain means nobody else is there.
    pub async fn request_longest_chain(&self) -> Result<Vec<Block>> {
        let reply = self.request(Message::longest_chain_request()).await?;
        let message_type = reply.message_type();
        match reply.body {
            MessageBody::GetLongestChainResponse(chain) => Ok(chain),
            _ => Err(TransportError::UnexpectedReply(message_type.to_string())),
        }
    }

    /// Tells peers that mining of `transactions` has started.
    pub async fn request_new_block(&self, transactions: Vec<Transaction>) -> Result<()> {
        self.send(Message::new_block_request(transactions)).await
    }

    pub async fn announce_new_block(&self, block: Block) -> Result<()> {
        self.send(Message::new_block_announcement(block)).await
    }

    pub async fn reply_with_chain(
        &self,
        correlation_id: CorrelationId,
        chain: Vec<Block>,
    ) -> Result<()> {
        self.send(Message::longest_chain_response(correlation_id, chain))
            .await
    }

    fn submit(&self, message: Message, delivery: Delivery) -> Result<()> {
        self.commands_tx
            .send(Outbound { message, delivery })
            .map_err(|_| TransportError::ControllerStopped)
    }
}

#[derive(Debug)]
enum ConnectionEnd {
    /// All controller handles are gone.
    Released,
    Lost,
}

pub(crate) struct ConnectionTask {
    url: String,
    pending: PendingRequests,
    commands_rcv: mpsc::UnboundedReceiver<Outbound>,
    unsolicited_tx: mpsc::UnboundedSender<Message>,
}

impl ConnectionTask {
    pub(crate) fn new(
        url: String,
        commands_rcv: mpsc::UnboundedReceiver<Outbound>,
        unsolicited_tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            url,
            pending: PendingRequests::new(),
            commands_rcv,
            unsolicited_tx,
        }
    }

    pub(crate) async fn run(mut self) {
        log::info!("Connecting to relay at {}", self.url);
        match tokio_tungstenite::connect_async(self.url.as_str()).await {
            Ok((ws_stream, _)) => {
                log::info!("Connected to relay at {}", self.url);
                if let ConnectionEnd::Lost = self.serve(ws_stream).await {
                    self.reject_sends(|| TransportError::ConnectionClosed).await;
                }
            }
            Err(err) => {
                log::error!("Failed to connect to relay at {}: {err}", self.url);
                let reason = err.to_string();
                self.reject_sends(|| TransportError::ConnectionFailed(reason.clone()))
                    .await;
            }
        }
        log::debug!(
            "Connection task stopped, {} requests never got a reply",
            self.pending.len()
        );
    }

    async fn serve<S>(&mut self, ws_stream: S) -> ConnectionEnd
    where
        S: Stream<Item = std::result::Result<WsMessage, WsError>>
            + Sink<WsMessage, Error = WsError>
            + Unpin,
    {
        let (mut sink, mut stream) = ws_stream.split();
        loop {
            tokio::select! {
                outbound = self.commands_rcv.recv() => {
                    match outbound {
                        Some(Outbound { message, delivery }) => {
                            self.transmit(&mut sink, message, delivery).await;
                        }
                        None => {
                            log::debug!("All transport handles dropped, closing connection");
                            if let Err(err) = sink.close().await {
                                log::debug!("Error closing connection: {err}");
                            }
                            return ConnectionEnd::Released;
                        }
                    }
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => self.on_message(&text),
                        Some(Ok(WsMessage::Binary(_))) => {
                            log::warn!("Received data of unsupported type, ignoring");
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            log::info!("Relay closed the connection");
                            return ConnectionEnd::Lost;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            log::error!("Error receiving from relay: {err}");
                            return ConnectionEnd::Lost;
                        }
                    }
                }
            }
        }
    }

    async fn transmit<Si>(&mut self, sink: &mut Si, message: Message, delivery: Delivery)
    where
        Si: Sink<WsMessage, Error = WsError> + Unpin,
    {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(err) => {
                delivery.reject(err.into());
                return;
            }
        };
        log::debug!("Sending {message}");

        match delivery {
            Delivery::AwaitReply(reply) => {
                let correlation_id = message.correlation_id;
                if let Err(reply) = self.pending.register(correlation_id.clone(), reply) {
                    let _ = reply.send(Err(TransportError::DuplicateCorrelationId(correlation_id)));
                    return;
                }
                if let Err(err) = sink.send(WsMessage::Text(json)).await {
                    log::error!("Failed to send request {correlation_id}: {err}");
                    if let Some(reply) = self.pending.take(&correlation_id) {
                        let _ = reply.send(Err(TransportError::Send(err.to_string())));
                    }
                }
            }
            Delivery::Transmitted(done) => {
                let result = sink
                    .send(WsMessage::Text(json))
                    .await
                    .map_err(|err| TransportError::Send(err.to_string()));
                let _ = done.send(result);
            }
        }
    }

    async fn reject_sends<F: Fn() -> TransportError>(&mut self, error: F) {
        while let Some(Outbound { message, delivery }) = self.commands_rcv.recv().await {
            log::debug!("Rejecting {message}, relay connection is not available");
            delivery.reject(error());
        }
    }

    /// Replies go to whoever waits for them. Everything else is unsolicited.
    pub(crate) fn on_message(&mut self, text: &str) {
        let raw = match RawMessage::from_json(text) {
            Ok(raw) => raw,
            Err(err) => {
                log::error!("Dropping malformed message: {err}");
                return;
            }
        };

        if let Some(reply) = self.pending.take(&raw.correlation_id) {
            log::debug!("Received reply {raw}");
            let result = Message::try_from(raw).map_err(TransportError::from);
            if reply.send(result).is_err() {
                log::debug!("Requester is gone, dropping reply");
            }
            return;
        }

        match Message::try_from(raw) {
            Ok(message) => {
                log::debug!("Received unsolicited {message}");
                if self.unsolicited_tx.send(message).is_err() {
                    log::warn!("Nobody listens to unsolicited messages, dropping");
                }
            }
            Err(err) => log::warn!("Ignoring message: {err}"),
        }
    }
}
