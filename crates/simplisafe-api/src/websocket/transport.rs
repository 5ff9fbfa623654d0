// Realtime transport seam
//
// `WebsocketClient` talks to the socket through `RealtimeTransport` so the
// dispatcher can be driven by an in-memory transport in tests. The default
// implementation speaks Engine.IO v3 / Socket.IO v2 over tokio-tungstenite.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::packet::{EnginePacket, OpenInfo, ROOT_NAMESPACE, SocketPacket, encode_connect};
use crate::error::Error;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a transport needs to open a connection.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Socket endpoint including the connection query parameters.
    pub url: Url,
    /// Extra headers for the upgrade request.
    pub headers: Vec<(String, String)>,
    /// Namespaces to join besides `/`.
    pub namespaces: Vec<String>,
}

/// One message delivered by the transport.
///
/// Lifecycle signals use the event names `connect` and `disconnect`.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketMessage {
    pub namespace: String,
    pub event: String,
    pub data: Value,
}

impl SocketMessage {
    pub fn new(namespace: impl Into<String>, event: impl Into<String>, data: Value) -> Self {
        Self {
            namespace: namespace.into(),
            event: event.into(),
            data,
        }
    }
}

/// A socket.io-capable connection.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open the connection and start delivering messages into `sink`.
    ///
    /// Returns once the handshake completed; failures before that point
    /// are reported as [`Error::Websocket`].
    async fn connect(
        &self,
        request: ConnectRequest,
        sink: mpsc::UnboundedSender<SocketMessage>,
    ) -> Result<(), Error>;

    /// Tear the connection down. `abort = true` drops it immediately
    /// without a close handshake. Must be a no-op when not connected.
    async fn disconnect(&self, abort: bool);
}

// ── SocketIoTransport ────────────────────────────────────────────────

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Default transport over tokio-tungstenite.
#[derive(Default)]
pub struct SocketIoTransport {
    session: Mutex<Option<Session>>,
}

impl SocketIoTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn replace_session(&self, session: Option<Session>) -> Option<Session> {
        let mut guard = self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::replace(&mut *guard, session)
    }
}

#[async_trait]
impl RealtimeTransport for SocketIoTransport {
    async fn connect(
        &self,
        request: ConnectRequest,
        sink: mpsc::UnboundedSender<SocketMessage>,
    ) -> Result<(), Error> {
        let mut url = request.url.clone();
        url.query_pairs_mut()
            .append_pair("EIO", "3")
            .append_pair("transport", "websocket");
        info!(host = ?url.host_str(), path = url.path(), "connecting realtime socket");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::Websocket(e.to_string()))?;
        let mut builder = ClientRequestBuilder::new(uri);
        for (name, value) in request.headers {
            builder = builder.with_header(name, value);
        }

        let (mut ws, _response) = tokio_tungstenite::connect_async(builder)
            .await
            .map_err(|e| Error::Websocket(e.to_string()))?;

        let open = tokio::time::timeout(HANDSHAKE_TIMEOUT, read_open(&mut ws))
            .await
            .map_err(|_| Error::Websocket("timed out waiting for engine.io handshake".into()))??;
        debug!(
            sid = %open.sid,
            ping_interval_ms = open.ping_interval,
            ping_timeout_ms = open.ping_timeout,
            "engine.io session opened"
        );

        for namespace in &request.namespaces {
            ws.send(Message::text(encode_connect(namespace)))
                .await
                .map_err(|e| Error::Websocket(e.to_string()))?;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(io_loop(ws, open.ping_interval(), sink, cancel.clone()));
        if let Some(previous) = self.replace_session(Some(Session { cancel, task })) {
            previous.task.abort();
        }
        Ok(())
    }

    async fn disconnect(&self, abort: bool) {
        let Some(session) = self.replace_session(None) else {
            return;
        };
        if abort {
            debug!("aborting realtime socket");
            session.task.abort();
        } else {
            debug!("closing realtime socket");
            session.cancel.cancel();
            if let Err(e) = session.task.await {
                trace!(error = %e, "socket task ended abnormally");
            }
        }
    }
}

/// Read frames until the Engine.IO open packet arrives.
async fn read_open<S>(ws: &mut S) -> Result<OpenInfo, Error>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = ws.next().await {
        let frame = frame.map_err(|e| Error::Websocket(e.to_string()))?;
        if let Message::Text(text) = frame {
            if let EnginePacket::Open(info) = EnginePacket::decode(text.as_str())? {
                return Ok(info);
            }
        }
    }
    Err(Error::Websocket(
        "socket closed before engine.io handshake".into(),
    ))
}

// ── Connection loop ──────────────────────────────────────────────────

/// Heartbeat, answer pings, forward socket.io packets until the socket
/// drops or `cancel` fires. Always ends with a `/` disconnect signal.
async fn io_loop<S>(
    ws: S,
    ping_interval: Duration,
    sink: mpsc::UnboundedSender<SocketMessage>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin
        + Send,
{
    let (mut write, mut read) = ws.split();
    let mut heartbeat = tokio::time::interval(ping_interval);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::text(EnginePacket::Close.encode())).await;
                let _ = write.close().await;
                break;
            }
            _ = heartbeat.tick() => {
                if let Err(e) = write.send(Message::text(EnginePacket::Ping(String::new()).encode())).await {
                    warn!(error = %e, "heartbeat failed");
                    break;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match EnginePacket::decode(text.as_str()) {
                            Ok(EnginePacket::Ping(payload)) => {
                                let pong = EnginePacket::Pong(payload).encode();
                                if let Err(e) = write.send(Message::text(pong)).await {
                                    warn!(error = %e, "pong failed");
                                    break;
                                }
                            }
                            Ok(EnginePacket::Message(body)) => {
                                if !forward(&body, &sink) {
                                    break;
                                }
                            }
                            Ok(EnginePacket::Close) => {
                                info!("server closed engine.io session");
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => debug!(error = %e, "ignoring malformed frame"),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(frame = ?frame, "realtime socket close frame received");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "realtime socket error");
                        break;
                    }
                    None => {
                        info!("realtime socket stream ended");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = sink.send(SocketMessage::new(ROOT_NAMESPACE, "disconnect", Value::Null));
    debug!("socket loop exiting");
}

/// Decode a socket.io packet and hand it to the dispatcher.
///
/// Returns `false` once the receiving side is gone.
fn forward(body: &str, sink: &mpsc::UnboundedSender<SocketMessage>) -> bool {
    let message = match SocketPacket::decode(body) {
        Ok(SocketPacket::Connect { namespace }) => {
            SocketMessage::new(namespace, "connect", Value::Null)
        }
        Ok(SocketPacket::Disconnect { namespace }) => {
            SocketMessage::new(namespace, "disconnect", Value::Null)
        }
        Ok(SocketPacket::Event {
            namespace,
            name,
            mut args,
        }) => {
            let data = if args.len() == 1 {
                args.remove(0)
            } else {
                Value::Array(args)
            };
            SocketMessage::new(namespace, name, data)
        }
        Ok(SocketPacket::Error { namespace, data }) => {
            warn!(namespace, error = %data, "socket.io error packet");
            return true;
        }
        Ok(SocketPacket::Ack { .. }) => return true,
        Err(e) => {
            debug!(error = %e, "ignoring malformed socket.io packet");
            return true;
        }
    };
    sink.send(message).is_ok()
}
