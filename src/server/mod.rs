//! Server loop and client lifecycle (C10, §4.7): accept, drive each
//! session's decrypt→parse→dispatch→encrypt pipeline, enforce the
//! concurrent-client limit and TCP keepalive, and tear down on disconnect.

pub mod dispatcher;
pub mod events;
pub mod session;
pub mod status;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Semaphore, broadcast};

use crate::accessory::{SessionId, Value};
use crate::config::ServerConfig;
use crate::protocol::http::{HttpServerCodec, Method, ParseError, ResponseBuilder, StatusCode, encode_event};
use crate::protocol::transport::TransportError;

#[cfg(feature = "discovery")]
use crate::discovery::Advertiser;

use dispatcher::Dispatcher;
use events::CharacteristicEvent;
use session::Session;

/// Broadcast to every session task; each filters for messages it cares
/// about (characteristic changes it's subscribed to, force-disconnects for
/// its own pairing).
#[derive(Clone)]
enum ServerEvent {
    CharacteristicChanged {
        source: SessionId,
        targets: Arc<HashSet<SessionId>>,
        aid: u64,
        iid: u64,
        value: Value,
    },
    ForceDisconnect {
        pairing_id: String,
    },
    /// `/reset` wiped storage (§4.5); every session tears down
    /// unconditionally so the accessory re-enters unpaired mode.
    Reset,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),
}

/// Carries whatever the connection tasks need besides the dispatcher: the
/// immutable config and (when the `discovery` feature is on) the mDNS
/// advertiser, re-announced whenever pairing state changes (§6).
struct ServerContext {
    config: Arc<ServerConfig>,
    #[cfg(feature = "discovery")]
    advertiser: Option<Mutex<Advertiser>>,
}

impl ServerContext {
    fn new(config: Arc<ServerConfig>) -> Self {
        #[cfg(feature = "discovery")]
        let advertiser = match Advertiser::new(config.name.clone(), config.port) {
            Ok(a) => Some(Mutex::new(a)),
            Err(err) => {
                tracing::warn!(%err, "failed to start mDNS advertiser, continuing without discovery");
                None
            }
        };

        Self {
            config,
            #[cfg(feature = "discovery")]
            advertiser,
        }
    }

    /// Re-announce `_hap._tcp` with the dispatcher's current pairing state.
    #[cfg(feature = "discovery")]
    async fn announce(&self, dispatcher: &Arc<Mutex<Dispatcher>>) {
        let Some(advertiser) = &self.advertiser else { return };
        let state = dispatcher.lock().await.advertised_state(&self.config);
        if let Err(err) = advertiser.lock().await.announce(&state) {
            tracing::warn!(%err, "failed to announce mDNS service");
        }
    }

    #[cfg(not(feature = "discovery"))]
    async fn announce(&self, _dispatcher: &Arc<Mutex<Dispatcher>>) {}
}

/// Accepts connections, enforces `max_clients` (§8 property 10), and
/// spawns one task per session.
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<Mutex<Dispatcher>>,
}

impl Server {
    #[must_use]
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher: Arc::new(Mutex::new(dispatcher)),
        }
    }

    /// Bind and run forever, accepting and servicing clients.
    ///
    /// # Errors
    /// Returns [`ServerError`] if binding the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let config = Arc::new(self.config);
        let listener = TcpListener::bind(("0.0.0.0", config.port)).await.map_err(ServerError::Bind)?;
        let permits = Arc::new(Semaphore::new(config.max_clients));
        let (event_tx, _) = broadcast::channel::<ServerEvent>(64);
        let mut next_session_id: SessionId = 1;
        let context = Arc::new(ServerContext::new(config.clone()));

        tracing::info!(port = config.port, max_clients = config.max_clients, "HAP server listening");
        context.announce(&self.dispatcher).await;

        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(%err, "accept failed");
                    continue;
                }
            };

            let Ok(permit) = permits.clone().try_acquire_owned() else {
                tracing::debug!(%addr, "max clients reached, dropping connection");
                drop(stream);
                continue;
            };

            configure_socket(&stream);

            let session_id = next_session_id;
            next_session_id += 1;

            let dispatcher = self.dispatcher.clone();
            let event_rx = event_tx.subscribe();
            let event_tx = event_tx.clone();
            let context = context.clone();

            tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = handle_connection(stream, session_id, dispatcher.clone(), event_tx, event_rx, context).await {
                    tracing::debug!(%err, session_id, "connection ended");
                }
                let mut guard = dispatcher.lock().await;
                guard.tree.unsubscribe_all(session_id);
            });
        }
    }
}

/// `TCP_NODELAY` on, keepalive `(idle=180s, interval=30s, count=4)` — at
/// most 300s to detect a dead peer (§4.7).
fn configure_socket(stream: &TcpStream) {
    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!(%err, "failed to set TCP_NODELAY");
    }

    let sock_ref = socket2::SockRef::from(stream);
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(std::time::Duration::from_secs(180))
        .with_interval(std::time::Duration::from_secs(30));
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "freebsd"))]
    let keepalive = keepalive.with_retries(4);
    if let Err(err) = sock_ref.set_tcp_keepalive(&keepalive) {
        tracing::debug!(%err, "failed to set TCP keepalive");
    }
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http parse error: {0}")]
    Http(#[from] ParseError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

async fn handle_connection(
    mut stream: TcpStream,
    session_id: SessionId,
    dispatcher: Arc<Mutex<Dispatcher>>,
    event_tx: broadcast::Sender<ServerEvent>,
    mut event_rx: broadcast::Receiver<ServerEvent>,
    context: Arc<ServerContext>,
) -> Result<(), ConnectionError> {
    let mut session = Session::new(session_id);
    let mut read_buf = vec![0u8; 4096];

    loop {
        tokio::select! {
            read_result = stream.read(&mut read_buf) => {
                let n = read_result?;
                if n == 0 {
                    break;
                }

                if feed_and_dispatch(&mut session, &read_buf[..n], &mut stream, &dispatcher, &event_tx, &context).await.is_err() {
                    break;
                }
                if session.disconnect {
                    break;
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(ev) => apply_event(&mut session, ev),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                while let Ok(ev) = event_rx.try_recv() {
                    apply_event(&mut session, ev);
                }
                flush_events(&mut session, &mut stream).await?;
                if session.disconnect {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn apply_event(session: &mut Session, event: ServerEvent) {
    match event {
        ServerEvent::CharacteristicChanged { source, targets, aid, iid, value } => {
            if source != session.id && targets.contains(&session.id) {
                session.event_queue.push(CharacteristicEvent { aid, iid, value });
            }
        }
        ServerEvent::ForceDisconnect { pairing_id } => {
            if session.pairing_id.as_deref() == Some(pairing_id.as_str()) {
                session.disconnect = true;
            }
        }
        ServerEvent::Reset => {
            session.disconnect = true;
        }
    }
}

async fn flush_events(session: &mut Session, stream: &mut TcpStream) -> Result<(), ConnectionError> {
    if session.event_queue.is_empty() || !session.is_established() {
        return Ok(());
    }

    let events = session.event_queue.drain_collapsed();
    let characteristics: Vec<_> = events
        .iter()
        .map(|e| json!({ "aid": e.aid, "iid": e.iid, "value": e.value.to_json() }))
        .collect();
    let body = json!({ "characteristics": characteristics }).to_string();
    let wire = encode_event(body.as_bytes());

    write_plaintext(session, stream, &wire).await
}

/// Whether a request outside `Established` is legal (§4.5's dispatch-state
/// table): every path but `/identify` is 404 before Pair-Verify completes;
/// `/identify` is legal there too, but only while the accessory has no
/// admin pairing yet (otherwise it's outside its legal state, same as any
/// other path).
fn allowed_before_established(method: Method, path: &str, has_admin_pairing: bool) -> bool {
    method == Method::Post && path == "/identify" && !has_admin_pairing
}

/// Feed newly-read socket bytes through the decrypt (if established)
/// → HTTP parse → dispatch → encrypt pipeline (§4.4, §4.5).
async fn feed_and_dispatch(
    session: &mut Session,
    data: &[u8],
    stream: &mut TcpStream,
    dispatcher: &Arc<Mutex<Dispatcher>>,
    event_tx: &broadcast::Sender<ServerEvent>,
    context: &Arc<ServerContext>,
) -> Result<(), ConnectionError> {
    let plaintext_chunks = if let Some(reader) = session.frame_reader.as_mut() {
        reader.feed(data);
        match reader.decode_all() {
            Ok(chunks) => chunks,
            Err(_) => {
                session.disconnect = true;
                return Ok(());
            }
        }
    } else {
        vec![data.to_vec()]
    };

    for chunk in plaintext_chunks {
        session.http_codec.feed(&chunk);
    }

    loop {
        let request = {
            let codec: &mut HttpServerCodec = &mut session.http_codec;
            match codec.decode() {
                Ok(Some(req)) => req,
                Ok(None) => break,
                Err(_) => {
                    let wire = ResponseBuilder::error(StatusCode::BAD_REQUEST).encode();
                    write_plaintext(session, stream, &wire).await?;
                    session.disconnect = true;
                    return Ok(());
                }
            }
        };

        let pre_established_ok = request.method == Method::Post && (request.path == "/pair-setup" || request.path == "/pair-verify");
        if !pre_established_ok && !session.is_established() {
            let has_admin_pairing = dispatcher.lock().await.has_admin_pairing();
            if !allowed_before_established(request.method, &request.path, has_admin_pairing) {
                let wire = ResponseBuilder::error(StatusCode::NOT_FOUND).encode();
                write_plaintext(session, stream, &wire).await?;
                continue;
            }
        }

        let result = {
            let mut guard = dispatcher.lock().await;
            let result = guard.handle(session, &request);
            let mut broadcasts = Vec::with_capacity(result.changes.len());
            for (aid, iid, value) in &result.changes {
                let targets = Arc::new(guard.subscribers(*aid, *iid));
                broadcasts.push(ServerEvent::CharacteristicChanged {
                    source: session.id,
                    targets,
                    aid: *aid,
                    iid: *iid,
                    value: value.clone(),
                });
            }
            drop(guard);
            for ev in broadcasts {
                let _ = event_tx.send(ev);
            }
            result
        };

        if let Some(removed) = result.removed_pairing_id {
            let _ = event_tx.send(ServerEvent::ForceDisconnect { pairing_id: removed });
        }
        if result.reset {
            let _ = event_tx.send(ServerEvent::Reset);
        }
        if result.pairing_changed {
            context.announce(dispatcher).await;
        }

        write_plaintext(session, stream, &result.wire).await?;
    }

    Ok(())
}

/// Write bytes to the socket, encrypting through the session's frame
/// writer once `Established` (§4.4).
async fn write_plaintext(session: &mut Session, stream: &mut TcpStream, data: &[u8]) -> Result<(), ConnectionError> {
    if let Some(writer) = session.frame_writer.as_mut() {
        let wire = writer.encode(data)?;
        stream.write_all(&wire).await?;
    } else {
        stream.write_all(data).await?;
    }
    Ok(())
}
