// simplisafe-api: Async Rust client for the SimpliSafe cloud (REST + realtime socket)

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use auth::{ClientIdentity, CredentialManager, LoginCredentials, TokenPair};
pub use client::ApiClient;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{
    ConnectionState, EventType, RealtimeTransport, SocketIoTransport, WebsocketClient,
    WebsocketEvent,
};
