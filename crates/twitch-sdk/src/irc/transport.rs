//! The transport collaborator and its bundled `tokio-tungstenite`
//! implementation.
//!
//! `WebSocketTransport` is a direct generalisation of the old `IrcClient`'s
//! connection lifecycle: one task per connection attempt drains a command
//! channel into the WebSocket sink and forwards inbound text frames to the
//! caller, wrapped in a best-effort reconnect loop. What moved out: the
//! Twitch handshake (now the facade's job) and PING autoresponse (the
//! pump's job, via the dispatcher). This layer only knows about bytes on a
//! socket.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

pub const TWITCH_WS_URL: &str = "wss://irc-ws.chat.twitch.tv:443";
const FRAME_BUFFER_SIZE: usize = 100;
const CMD_BUFFER_SIZE: usize = 32;
const RECONNECT_DELAY_SECS: u64 = 5;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The duplex text-stream collaborator the core consumes. Implementations
/// need not be WebSocket-backed — a test double only needs to move raw lines
/// in and out.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the connection, returning a channel of raw inbound frames (one
    /// or more lines, not yet split). The channel closes when the transport
    /// gives up or is told to disconnect.
    async fn connect(&self, url: &str) -> Result<mpsc::Receiver<String>>;

    async fn disconnect(&self, reason: &str);

    /// Enqueues `line` for sending without waiting for it to land on the
    /// wire. Errors (if any) are logged, not surfaced.
    fn send(&self, line: String);

    /// Sends `line` and awaits the result, surfacing transport errors.
    async fn send_instant(&self, line: String) -> Result<()>;
}

enum WriterCommand {
    Line(String),
    LineAcked(String, oneshot::Sender<Result<()>>),
}

/// `tokio-tungstenite`-backed `Transport` with a best-effort reconnect loop.
/// Reconnection here is ambient transport behaviour: it does not resume
/// scheduler state, which the facade discards and rebuilds fresh on every
/// reconnect.
pub struct WebSocketTransport {
    cancel_token: CancellationToken,
    cmd_tx: Mutex<Option<mpsc::Sender<WriterCommand>>>,
    lifecycle: Mutex<Option<JoinHandle<()>>>,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            cmd_tx: Mutex::new(None),
            lifecycle: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<mpsc::Receiver<String>> {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER_SIZE);
        let (cmd_tx, cmd_rx) = mpsc::channel::<WriterCommand>(CMD_BUFFER_SIZE);
        *self.cmd_tx.lock().await = Some(cmd_tx);

        let cancel = self.cancel_token.clone();
        let url = url.to_string();

        let handle = tokio::spawn(async move {
            info!("starting websocket transport lifecycle...");
            let mut cmd_rx = cmd_rx;

            loop {
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => {
                        info!("transport cancelled, shutting down");
                        break;
                    }

                    result = run_connection(&url, frame_tx.clone(), &mut cmd_rx, &cancel) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        if let Err(e) = result {
                            error!("twitch connection lost: {:?}. reconnecting in {}s...", e, RECONNECT_DELAY_SECS);
                            tokio::time::sleep(tokio::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
                        } else {
                            break;
                        }
                    }
                }
            }
            info!("websocket transport lifecycle ended");
        });

        *self.lifecycle.lock().await = Some(handle);
        Ok(frame_rx)
    }

    async fn disconnect(&self, reason: &str) {
        info!("disconnecting transport: {}", reason);
        self.cancel_token.cancel();
        if let Some(handle) = self.lifecycle.lock().await.take() {
            let _ = handle.await;
        }
    }

    fn send(&self, line: String) {
        if let Ok(guard) = self.cmd_tx.try_lock() {
            if let Some(tx) = guard.as_ref() {
                if tx.try_send(WriterCommand::Line(line)).is_err() {
                    warn!("dropped outbound line: writer channel full or closed");
                }
            }
        }
    }

    async fn send_instant(&self, line: String) -> Result<()> {
        let tx = self
            .cmd_tx
            .lock()
            .await
            .clone()
            .context("transport is not connected")?;
        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(WriterCommand::LineAcked(line, ack_tx))
            .await
            .context("writer actor is gone")?;
        ack_rx.await.context("writer actor dropped the ack")?
    }
}

/// Drives one connection attempt: dials the socket, then alternates between
/// draining `cmd_rx` into the sink and forwarding inbound frames until
/// either side closes, errors, or `cancel` fires.
async fn run_connection(
    url: &str,
    frame_tx: mpsc::Sender<String>,
    cmd_rx: &mut mpsc::Receiver<WriterCommand>,
    cancel: &CancellationToken,
) -> Result<()> {
    let ws_stream = connect_to_url(url).await?;
    let (mut write_sink, mut read_stream) = ws_stream.split();

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                return Ok(());
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    return Ok(());
                };
                match cmd {
                    WriterCommand::Line(line) => {
                        debug!(">> sending: {}", line);
                        if let Err(e) = write_sink.send(Message::Text(line)).await {
                            return Err(anyhow::anyhow!("ws write failed: {e}"));
                        }
                    }
                    WriterCommand::LineAcked(line, ack) => {
                        debug!(">> sending: {}", line);
                        let result = write_sink
                            .send(Message::Text(line))
                            .await
                            .map_err(|e| anyhow::anyhow!("ws write failed: {e}"));
                        let _ = ack.send(result);
                    }
                }
            }

            msg = read_stream.next() => {
                let Some(msg) = msg else {
                    info!("ws stream ended");
                    return Ok(());
                };
                let msg = msg.map_err(|e| anyhow::anyhow!("ws protocol error: {e}"))?;
                match msg {
                    Message::Text(text) => {
                        if frame_tx.send(text).await.is_err() {
                            return Err(anyhow::anyhow!("frame receiver dropped"));
                        }
                    }
                    Message::Close(_) => {
                        info!("twitch sent close frame");
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn connect_to_url(url: &str) -> Result<WsStream> {
    let parsed = Url::parse(url)?;
    info!("connecting to ws: {}", parsed);
    let (stream, _) = connect_async(parsed.to_string())
        .await
        .context("ws handshake failed")?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_yields_frames_sent_by_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(":tmi.twitch.tv 376 bot :>".to_string()))
                .await
                .unwrap();
        });

        let transport = WebSocketTransport::new();
        let mut frames = transport
            .connect(&format!("ws://{addr}"))
            .await
            .unwrap();

        let frame = tokio::time::timeout(std::time::Duration::from_secs(2), frames.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, ":tmi.twitch.tv 376 bot :>");

        server.await.unwrap();
        transport.disconnect("test complete").await;
    }

    #[tokio::test]
    async fn send_instant_surfaces_write_errors_after_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            drop(ws);
        });

        let transport = WebSocketTransport::new();
        let _frames = transport.connect(&format!("ws://{addr}")).await.unwrap();

        // Give the server time to drop the connection before we try to send.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let _ = transport.send_instant("PING :x".to_string()).await;
        transport.disconnect("test complete").await;
    }
}
