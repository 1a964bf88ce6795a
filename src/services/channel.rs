use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backend::{decode_frame, ClientFrame};
use super::delivery::LiveSink;
use crate::error::SessionError;
use crate::kernel::event::{ConnectionStatus, ServerEvent};

const OUTBOUND_CAPACITY: usize = 64;
const SUBSCRIBER_CAPACITY: usize = 256;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A frame plus the writer's answer once it has hit the socket (or not).
type Outbound = (Message, oneshot::Sender<Result<(), SessionError>>);

struct Connection {
    outbound: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
    open: Arc<AtomicBool>,
}

impl Connection {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// The session's single WebSocket to the backend.
///
/// Only the writer task touches the socket sink. Decoded inbound events are
/// broadcast, so any number of consumers may subscribe.
pub struct LiveChannel {
    url: String,
    current: Mutex<Option<Connection>>,
    connecting: tokio::sync::Mutex<()>,
    events: broadcast::Sender<ServerEvent>,
    status: watch::Sender<ConnectionStatus>,
}

impl LiveChannel {
    /// `ws_url` is the server root; the client id is appended as `/ws/{id}`.
    pub fn new(ws_url: &str, client_id: Uuid) -> Self {
        let (events, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            url: format!("{}/ws/{}", ws_url.trim_end_matches('/'), client_id),
            current: Mutex::new(None),
            connecting: tokio::sync::Mutex::new(()),
            events,
            status,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.current
            .lock()
            .map(|c| c.as_ref().is_some_and(Connection::is_open))
            .unwrap_or(false)
    }

    /// Opens the socket. A no-op while a connection is open; after a drop it
    /// dials again.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let _guard = self.connecting.lock().await;
        if self.is_open() {
            debug!("Live channel already open");
            return Ok(());
        }

        self.status.send_replace(ConnectionStatus::Connecting);
        let dialed = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(self.url.as_str())).await;
        let (ws, _) = match dialed {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                self.status.send_replace(ConnectionStatus::Disconnected);
                return Err(SessionError::Transport(format!("connect {}: {}", self.url, e)));
            }
            Err(_) => {
                self.status.send_replace(ConnectionStatus::Disconnected);
                return Err(SessionError::Transport(format!("connect {}: timed out", self.url)));
            }
        };
        info!("Live channel open: {}", self.url);

        let (mut sink, mut stream) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<Outbound>(OUTBOUND_CAPACITY);
        let cancel = CancellationToken::new();
        let open = Arc::new(AtomicBool::new(true));

        // Writer: sole owner of the sink. Every frame is acked only after the
        // sink accepted it, so a caller never hears Ok for a dropped frame.
        {
            let cancel = cancel.clone();
            let open = open.clone();
            let status = self.status.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            // Frames queued before the cancel still go out ahead of Close.
                            outbound_rx.close();
                            while let Some((msg, ack)) = outbound_rx.recv().await {
                                let _ = ack.send(write_frame(&mut sink, msg).await);
                            }
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                        next = outbound_rx.recv() => match next {
                            Some((msg, ack)) => {
                                let written = write_frame(&mut sink, msg).await;
                                let failed = written.is_err();
                                let _ = ack.send(written);
                                if failed {
                                    open.store(false, Ordering::SeqCst);
                                    report_drop(&cancel, &status);
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
                open.store(false, Ordering::SeqCst);
                let _ = sink.close().await;
            });
        }

        // Reader: decode and fan out.
        {
            let cancel = cancel.clone();
            let open = open.clone();
            let events = self.events.clone();
            let status = self.status.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        frame = stream.next() => match frame {
                            Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                                Ok(Some(event)) => {
                                    // No subscribers is fine; nothing to deliver to.
                                    let _ = events.send(event);
                                }
                                Ok(None) => {}
                                Err(e) => warn!("Dropped inbound frame: {}", e),
                            },
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("Live channel read failed: {}", e);
                                break;
                            }
                        }
                    }
                }
                open.store(false, Ordering::SeqCst);
                report_drop(&cancel, &status);
                info!("Live channel closed");
            });
        }

        if let Ok(mut current) = self.current.lock() {
            *current = Some(Connection { outbound, cancel, open });
        }
        self.status.send_replace(ConnectionStatus::Open);
        Ok(())
    }

    /// Fails fast when the channel is not open; nothing is queued for later.
    ///
    /// Resolves once the frame has been written to the socket. A frame the
    /// writer could not write, or never reached before the connection went
    /// away, comes back as a transport error.
    pub async fn send(&self, frame: ClientFrame) -> Result<(), SessionError> {
        let outbound = {
            let current = self
                .current
                .lock()
                .map_err(|_| SessionError::Transport("channel state poisoned".to_string()))?;
            match current.as_ref() {
                Some(conn) if conn.is_open() => conn.outbound.clone(),
                _ => return Err(SessionError::Transport("live channel not open".to_string())),
            }
        };

        let json = serde_json::to_string(&frame).map_err(|e| SessionError::Transport(e.to_string()))?;
        let (ack, written) = oneshot::channel();
        outbound
            .send((Message::Text(json), ack))
            .await
            .map_err(|_| SessionError::Transport("live channel closed while sending".to_string()))?;
        written
            .await
            .map_err(|_| SessionError::Transport("live channel closed before the frame was written".to_string()))?
    }

    /// Re-dials a dropped connection. A channel closed on purpose stays closed
    /// until `connect` is called explicitly.
    pub async fn reconnect(&self) -> bool {
        if self.is_open() {
            return true;
        }
        if *self.status.borrow() == ConnectionStatus::Closed {
            return false;
        }
        match self.connect().await {
            Ok(()) => true,
            Err(e) => {
                debug!("Live channel re-dial failed: {}", e);
                false
            }
        }
    }

    /// Releases the socket. Safe to call any number of times.
    pub fn close(&self) {
        let taken = self.current.lock().ok().and_then(|mut c| c.take());
        if let Some(conn) = taken {
            conn.open.store(false, Ordering::SeqCst);
            conn.cancel.cancel();
            self.status.send_replace(ConnectionStatus::Closed);
            info!("Live channel close requested");
        }
    }
}

async fn write_frame<S>(sink: &mut S, msg: Message) -> Result<(), SessionError>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    sink.send(msg).await.map_err(|e| {
        warn!("Live channel write failed: {}", e);
        SessionError::Transport(format!("write: {}", e))
    })
}

/// Connection lost without a close request: stop both tasks and say so.
fn report_drop(cancel: &CancellationToken, status: &watch::Sender<ConnectionStatus>) {
    if !cancel.is_cancelled() {
        cancel.cancel();
        status.send_replace(ConnectionStatus::Disconnected);
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl LiveSink for LiveChannel {
    fn is_open(&self) -> bool {
        LiveChannel::is_open(self)
    }

    async fn ensure_open(&self) -> bool {
        self.reconnect().await
    }

    async fn send(&self, frame: ClientFrame) -> Result<(), SessionError> {
        LiveChannel::send(self, frame).await
    }
}
