//! Client connection management: read/write pumps, ping keepalive, send
//! buffering.

use std::time::Duration;

use chunkdrop_protocol::{ServerMessage, encode_reply};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::SEND_BUFFER_SIZE;
use crate::session::Session;

/// Keepalive timings for one connection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Keepalive {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

/// Handle for queueing frames to the write pump.
pub(crate) struct Sender {
    tx: mpsc::Sender<WsMessage>,
}

impl Sender {
    /// Queues a reply as a JSON text frame.
    ///
    /// Waits for room in the queue. Returns `Err` only if the write pump
    /// has stopped.
    pub async fn send_msg(&self, msg: &ServerMessage) -> Result<(), SendError> {
        let json = encode_reply(msg).map_err(|e| {
            tracing::error!("failed to encode reply: {e}");
            SendError
        })?;
        self.tx
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|_| SendError)
    }
}

/// Error returned when the connection's write side is gone.
#[derive(Debug, thiserror::Error)]
#[error("send failed: connection closed")]
pub(crate) struct SendError;

/// Serves one upgraded WebSocket until it closes.
///
/// The write pump runs as a separate task; the read pump runs on the
/// caller's task and owns the [`Session`], so frames are handled in
/// arrival order. When the read pump stops for any reason the write pump is
/// cancelled and the session's disconnect cleanup runs.
pub(crate) async fn serve<S>(
    ws_stream: S,
    session: Session,
    keepalive: Keepalive,
    cancel: CancellationToken,
) where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Send
        + 'static,
{
    let (tx, rx) = mpsc::channel::<WsMessage>(SEND_BUFFER_SIZE);
    let sender = Sender { tx };
    let (ws_sink, ws_stream) = ws_stream.split();

    let writer = tokio::spawn(write_pump(
        ws_sink,
        rx,
        keepalive.ping_interval,
        cancel.clone(),
    ));

    let session = read_pump(ws_stream, sender, session, keepalive.pong_timeout, &cancel).await;

    // When the read pump exits, stop the write pump too.
    cancel.cancel();
    let conn = session.id();
    session.close().await;
    let _ = writer.await;
    tracing::info!(%conn, "client disconnected");
}

/// Write pump: drains the send queue and sends WS pings.
async fn write_pump<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<WsMessage>,
    ping_interval: Duration,
    cancel: CancellationToken,
) where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin,
{
    let mut ping = tokio::time::interval(ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping.reset();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Flush replies queued before the read side stopped.
                while let Ok(ws_msg) = rx.try_recv() {
                    if let Err(e) = sink.send(ws_msg).await {
                        tracing::debug!("write pump flush error: {e}");
                        break;
                    }
                }
                break;
            }

            msg = rx.recv() => {
                match msg {
                    Some(ws_msg) => {
                        if let Err(e) = sink.send(ws_msg).await {
                            tracing::error!("write pump send error: {e}");
                            break;
                        }
                    }
                    None => break, // All senders dropped.
                }
            }

            _ = ping.tick() => {
                if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                    tracing::error!("write pump ping error: {e}");
                    break;
                }
            }
        }
    }

    // Best-effort close frame.
    let _ = sink.close().await;
}

/// Read pump: reads WS frames, hands them to the session and queues the
/// replies. Returns the session once the connection is done.
async fn read_pump<S>(
    mut stream: S,
    sender: Sender,
    mut session: Session,
    pong_timeout: Duration,
    cancel: &CancellationToken,
) -> Session
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Send
        + Unpin,
{
    let deadline = tokio::time::sleep(pong_timeout);
    tokio::pin!(deadline);

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,

            _ = &mut deadline => {
                tracing::warn!(conn = %session.id(), "pong timeout, closing connection");
                break;
            }

            frame = stream.next() => frame,
        };

        let ws_msg = match frame {
            Some(Ok(ws_msg)) => ws_msg,
            Some(Err(e)) => {
                tracing::error!(conn = %session.id(), "read pump error: {e}");
                break;
            }
            None => break, // Stream ended.
        };
        // Any inbound frame counts as liveness.
        deadline
            .as_mut()
            .reset(tokio::time::Instant::now() + pong_timeout);

        let reply = match ws_msg {
            WsMessage::Text(text) => session.handle_text(&text).await,
            WsMessage::Binary(data) => session.handle_binary(&data).await,
            WsMessage::Close(_) => {
                tracing::debug!(conn = %session.id(), "received close frame");
                break;
            }
            // tungstenite answers pings on its own; pongs only refresh
            // liveness.
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
        };

        if sender.send_msg(&reply).await.is_err() {
            break;
        }
    }

    session
}
