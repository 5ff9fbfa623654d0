// Engine.IO v3 / Socket.IO v2 text framing
//
// An Engine.IO frame is one type digit followed by its payload. Message
// frames (`4`) carry a Socket.IO packet: a type digit, an optional
// `/namespace,` prefix, an optional ack id, then a JSON array payload.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// Namespace every Socket.IO connection joins implicitly.
pub(crate) const ROOT_NAMESPACE: &str = "/";

const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;

// ── Engine.IO ────────────────────────────────────────────────────────

/// Handshake body carried by the Engine.IO open packet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OpenInfo {
    #[serde(default)]
    pub(crate) sid: String,
    #[serde(default = "default_ping_interval")]
    pub(crate) ping_interval: u64,
    #[serde(default)]
    pub(crate) ping_timeout: u64,
}

impl OpenInfo {
    pub(crate) fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval.max(1))
    }
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

#[derive(Debug, Clone)]
pub(crate) enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Noop,
}

impl EnginePacket {
    pub(crate) fn decode(text: &str) -> Result<Self, Error> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Websocket("empty engine.io frame".into()))?;
        let payload = chars.as_str();
        match kind {
            '0' => serde_json::from_str(payload)
                .map(Self::Open)
                .map_err(|e| Error::Websocket(format!("bad engine.io open packet: {e}"))),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(payload.to_owned())),
            '3' => Ok(Self::Pong(payload.to_owned())),
            '4' => Ok(Self::Message(payload.to_owned())),
            '5' | '6' => Ok(Self::Noop),
            other => Err(Error::Websocket(format!(
                "unknown engine.io packet type {other:?}"
            ))),
        }
    }

    pub(crate) fn encode(&self) -> String {
        match self {
            Self::Open(_) => "0".to_owned(),
            Self::Close => "1".to_owned(),
            Self::Ping(p) => format!("2{p}"),
            Self::Pong(p) => format!("3{p}"),
            Self::Message(m) => format!("4{m}"),
            Self::Noop => "6".to_owned(),
        }
    }
}

// ── Socket.IO ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SocketPacket {
    Connect { namespace: String },
    Disconnect { namespace: String },
    Event {
        namespace: String,
        name: String,
        args: Vec<Value>,
    },
    Ack { namespace: String },
    Error { namespace: String, data: Value },
}

impl SocketPacket {
    pub(crate) fn decode(text: &str) -> Result<Self, Error> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| Error::Websocket("empty socket.io packet".into()))?;
        let mut rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(Error::Websocket(
                "binary socket.io packets are not supported".into(),
            ));
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let raw = &rest[..end];
            rest = rest.get(end + 1..).unwrap_or("");
            // A namespace may carry its connect query (`/ns?token=..`).
            raw.split('?').next().unwrap_or(raw).to_owned()
        } else {
            ROOT_NAMESPACE.to_owned()
        };

        // Ack id: leading digits before the JSON payload.
        let data_start = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let data = &rest[data_start..];

        match kind {
            '0' => Ok(Self::Connect { namespace }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let mut args: Vec<Value> = serde_json::from_str(data)
                    .map_err(|e| Error::Websocket(format!("bad socket.io event payload: {e}")))?;
                if args.is_empty() {
                    return Err(Error::Websocket("socket.io event without a name".into()));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    other => {
                        return Err(Error::Websocket(format!(
                            "socket.io event name is not a string: {other}"
                        )));
                    }
                };
                Ok(Self::Event {
                    namespace,
                    name,
                    args,
                })
            }
            '3' => Ok(Self::Ack { namespace }),
            '4' => Ok(Self::Error {
                namespace,
                data: serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_owned())),
            }),
            other => Err(Error::Websocket(format!(
                "unknown socket.io packet type {other:?}"
            ))),
        }
    }
}

/// Engine.IO message frame asking to join `namespace`.
pub(crate) fn encode_connect(namespace: &str) -> String {
    if namespace == ROOT_NAMESPACE {
        EnginePacket::Message("0".to_owned()).encode()
    } else {
        EnginePacket::Message(format!("0{namespace},")).encode()
    }
}
