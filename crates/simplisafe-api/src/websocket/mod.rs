//! Realtime event channel.
//!
//! Connects to the cloud's socket.io endpoint scoped to the logged-in user
//! and dispatches pushed messages to registered handlers. Connection-level
//! signals arrive on the `/` namespace and drive the connect/disconnect
//! handlers; domain events arrive on `/v1/user/{user_id}` and drive the
//! event handlers. Handlers may be plain closures or async closures and
//! run in registration order, each awaited before the next.
//!
//! # Example
//!
//! ```rust,ignore
//! let ws = WebsocketClient::new(api.clone());
//! ws.on_event(|event| println!("{:?}: {}", event.event_type(), event.info));
//! ws.async_on_disconnect(|| async { tracing::warn!("socket dropped") });
//! ws.connect().await?;
//! ```

mod event;
mod packet;
mod transport;

use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use secrecy::ExposeSecret;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;

pub use event::{EventType, WebsocketEvent};
pub use transport::{ConnectRequest, RealtimeTransport, SocketIoTransport, SocketMessage};

use crate::client::ApiClient;
use crate::error::Error;
use packet::ROOT_NAMESPACE;

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

// ── Handlers ─────────────────────────────────────────────────────────

type Callback<A> = Arc<dyn Fn(A) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct Handlers {
    connect: RwLock<Vec<Callback<()>>>,
    disconnect: RwLock<Vec<Callback<()>>>,
    event: RwLock<Vec<Callback<WebsocketEvent>>>,
}

fn push<A>(list: &RwLock<Vec<Callback<A>>>, callback: Callback<A>) {
    list.write()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .push(callback);
}

fn snapshot<A>(list: &RwLock<Vec<Callback<A>>>) -> Vec<Callback<A>> {
    list.read()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .clone()
}

async fn run_all<A: Clone>(callbacks: Vec<Callback<A>>, arg: A) {
    for callback in callbacks {
        callback(arg.clone()).await;
    }
}

// ── WebsocketClient ──────────────────────────────────────────────────

/// Realtime channel for one logged-in user.
pub struct WebsocketClient {
    api: Arc<ApiClient>,
    transport: Arc<dyn RealtimeTransport>,
    handlers: Arc<Handlers>,
    state: Arc<watch::Sender<ConnectionState>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl WebsocketClient {
    /// Channel over the default tokio-tungstenite transport.
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self::with_transport(api, Arc::new(SocketIoTransport::new()))
    }

    pub fn with_transport(api: Arc<ApiClient>, transport: Arc<dyn RealtimeTransport>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            api,
            transport,
            handlers: Arc::new(Handlers::default()),
            state: Arc::new(state),
            dispatcher: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    // ── Handler registration ────────────────────────────────────────

    pub fn on_connect<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        push(&self.handlers.connect, sync_callback(move |()| handler()));
    }

    pub fn async_on_connect<F, Fut>(&self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        push(&self.handlers.connect, Arc::new(move |()| handler().boxed()));
    }

    pub fn on_disconnect<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        push(&self.handlers.disconnect, sync_callback(move |()| handler()));
    }

    pub fn async_on_disconnect<F, Fut>(&self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        push(
            &self.handlers.disconnect,
            Arc::new(move |()| handler().boxed()),
        );
    }

    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&WebsocketEvent) + Send + Sync + 'static,
    {
        push(
            &self.handlers.event,
            sync_callback(move |event: WebsocketEvent| handler(&event)),
        );
    }

    pub fn async_on_event<F, Fut>(&self, handler: F)
    where
        F: Fn(WebsocketEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        push(
            &self.handlers.event,
            Arc::new(move |event| handler(event).boxed()),
        );
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Open the connection. A no-op unless currently disconnected.
    ///
    /// The access token is refreshed first when it has expired. Transport
    /// failures surface as [`Error::Websocket`] and leave the channel
    /// disconnected.
    pub async fn connect(&self) -> Result<(), Error> {
        let mut claimed = false;
        self.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                claimed = true;
            }
            claimed
        });
        if !claimed {
            debug!(state = ?self.state(), "realtime socket already active");
            return Ok(());
        }

        if let Err(e) = self.open().await {
            warn!(error = %e, "realtime connect failed");
            self.state.send_replace(ConnectionState::Disconnected);
            return Err(e);
        }
        Ok(())
    }

    /// Force-abort the connection. Safe to call in any state; disconnect
    /// handlers run once per actual disconnect.
    pub async fn disconnect(&self) {
        let mut claimed = false;
        self.state.send_if_modified(|state| {
            if matches!(
                *state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                *state = ConnectionState::Disconnecting;
                claimed = true;
            }
            claimed
        });
        if !claimed {
            trace!("realtime socket already disconnected");
            return;
        }

        self.transport.disconnect(true).await;
        if let Some(task) = self.take_dispatcher() {
            task.abort();
        }
        mark_disconnected(&self.handlers, &self.state).await;
        info!("realtime socket disconnected");
    }

    /// Disconnect, then connect again with a current access token.
    pub async fn reconnect(&self) -> Result<(), Error> {
        self.disconnect().await;
        self.connect().await
    }

    async fn open(&self) -> Result<(), Error> {
        let user_id = self.api.user_id().ok_or(Error::CredentialsExpired)?;
        if self.api.credentials().is_expired(Utc::now()) {
            debug!("access token expired, refreshing before socket connect");
            self.api.refresh_access_token().await?;
        }
        let tokens = self
            .api
            .credentials()
            .current()
            .ok_or(Error::CredentialsExpired)?;

        let namespace = user_namespace(user_id);
        let url = connect_url(
            self.api.websocket_url(),
            &namespace,
            tokens.access_token().expose_secret(),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        self.transport
            .connect(
                ConnectRequest {
                    url,
                    headers: Vec::new(),
                    namespaces: vec![namespace.clone()],
                },
                tx,
            )
            .await?;

        let task = tokio::spawn(dispatch_loop(
            rx,
            namespace,
            Arc::clone(&self.handlers),
            Arc::clone(&self.state),
        ));
        if let Some(previous) = self.replace_dispatcher(Some(task)) {
            previous.abort();
        }
        Ok(())
    }

    fn take_dispatcher(&self) -> Option<JoinHandle<()>> {
        self.replace_dispatcher(None)
    }

    fn replace_dispatcher(&self, task: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
        let mut guard = self
            .dispatcher
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::replace(&mut *guard, task)
    }
}

fn sync_callback<A, F>(handler: F) -> Callback<A>
where
    F: Fn(A) + Send + Sync + 'static,
{
    Arc::new(move |arg| {
        handler(arg);
        future::ready(()).boxed()
    })
}

/// Per-user namespace carrying domain events.
pub fn user_namespace(user_id: u64) -> String {
    format!("/v1/user/{user_id}")
}

/// Socket URL with the `ns` and `accessToken` connection parameters.
fn connect_url(base: &Url, namespace: &str, access_token: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("ns", namespace)
        .append_pair("accessToken", access_token);
    url
}

// ── Dispatch ─────────────────────────────────────────────────────────

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<SocketMessage>,
    user_namespace: String,
    handlers: Arc<Handlers>,
    state: Arc<watch::Sender<ConnectionState>>,
) {
    while let Some(message) = rx.recv().await {
        dispatch(message, &user_namespace, &handlers, &state).await;
    }
    trace!("dispatcher exiting");
}

async fn dispatch(
    message: SocketMessage,
    user_namespace: &str,
    handlers: &Handlers,
    state: &watch::Sender<ConnectionState>,
) {
    if message.namespace == ROOT_NAMESPACE {
        match message.event.as_str() {
            "connect" => {
                let connected = state.send_if_modified(|current| {
                    if *current == ConnectionState::Connecting {
                        *current = ConnectionState::Connected;
                        return true;
                    }
                    false
                });
                if connected {
                    info!("realtime socket connected");
                    run_all(snapshot(&handlers.connect), ()).await;
                } else {
                    debug!(
                        state = ?*state.borrow(),
                        "ignoring connect outside a pending connection"
                    );
                }
            }
            "disconnect" => mark_disconnected(handlers, state).await,
            other => trace!(event = other, "ignoring root namespace message"),
        }
        return;
    }

    if message.namespace != user_namespace || message.event != "event" {
        trace!(
            namespace = %message.namespace,
            event = %message.event,
            "ignoring message"
        );
        return;
    }

    let event = WebsocketEvent::from_payload(message.data);
    debug!(cid = ?event.event_cid, sid = ?event.sid, "realtime event received");
    run_all(snapshot(&handlers.event), event).await;
}

/// Move to `Disconnected`, running the handlers only on an actual change.
async fn mark_disconnected(handlers: &Handlers, state: &watch::Sender<ConnectionState>) {
    let previous = state.send_replace(ConnectionState::Disconnected);
    if previous != ConnectionState::Disconnected {
        run_all(snapshot(&handlers.disconnect), ()).await;
    }
}
