// src/transport/connection.rs

use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::dispatcher::{Dispatcher, DEFAULT_MAX_PENDING};
use super::errors::{Result, TransportError};
use super::framing;
use super::handlers::{InboundHandler, LogHandler};
use crate::message::Message;

/// A live, ordered, message-oriented connection.
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> Uuid;

    /// Inbound dispatch for this connection: pending requests first, then
    /// the default handler.
    fn dispatcher(&self) -> &Arc<Dispatcher>;

    /// Transmits `frames` as one logical message.
    async fn send(&self, frames: &[Bytes]) -> Result<()>;

    fn is_connected(&self) -> bool {
        !self.dispatcher().is_closed()
    }
}

/// How a new connection dispatches messages nobody is waiting for.
#[derive(Clone)]
pub struct ConnectionOptions {
    pub handler: Arc<dyn InboundHandler>,
    pub max_pending: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            handler: Arc::new(LogHandler),
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

enum WriteCommand {
    Message(Bytes, oneshot::Sender<Result<()>>),
    Shutdown(oneshot::Sender<()>),
}

/// A [`Connection`] over any byte stream: a TCP socket, or an in-memory
/// duplex pipe in tests.
///
/// A background task reads messages off the stream and hands them to the
/// dispatcher. When the stream ends, the dispatcher is closed and pending
/// requests are released.
///
/// Writes go through a second task that owns the write half. A message
/// handed to it is written whole even if the caller stops waiting, so an
/// abandoned send cannot leave a torn frame on the wire.
pub struct StreamConnection {
    id: Uuid,
    peer_addr: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<WriteCommand>,
    dispatcher: Arc<Dispatcher>,
    reader: JoinHandle<()>,
}

impl StreamConnection {
    /// Wraps `stream` with default options. Must be called from within a
    /// tokio runtime.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::from_stream_with(stream, ConnectionOptions::default())
    }

    pub fn from_stream_with<S>(stream: S, options: ConnectionOptions) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::spawn(stream, options, None)
    }

    pub fn from_tcp(stream: TcpStream, options: ConnectionOptions) -> Self {
        let peer_addr = stream.peer_addr().ok();
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }
        Self::spawn(stream, options, peer_addr)
    }

    fn spawn<S>(stream: S, options: ConnectionOptions, peer_addr: Option<SocketAddr>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = Uuid::new_v4();
        let dispatcher = Arc::new(
            Dispatcher::with_handler(id, options.handler).with_max_pending(options.max_pending),
        );

        let (reader, writer) = tokio::io::split(stream);
        let reader = tokio::spawn(read_loop(reader, dispatcher.clone()));
        let (outbound, queue) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(writer, queue, dispatcher.clone()));

        debug!(connection_id = %id, peer = ?peer_addr, "Connection opened");

        Self {
            id,
            peer_addr,
            outbound,
            dispatcher,
            reader,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Writes out anything already queued, shuts down the write side, stops
    /// reading and releases pending requests.
    pub async fn close(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.outbound.send(WriteCommand::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
        self.reader.abort();
        self.dispatcher.close();
        info!(connection_id = %self.id, "Connection closed");
    }
}

#[async_trait]
impl Connection for StreamConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    async fn send(&self, frames: &[Bytes]) -> Result<()> {
        if self.dispatcher.is_closed() {
            return Err(TransportError::Closed);
        }

        let message = framing::encode_message(frames)?;
        let (done_tx, done_rx) = oneshot::channel();
        self.outbound
            .send(WriteCommand::Message(message, done_tx))
            .map_err(|_| TransportError::Closed)?;
        done_rx.await.unwrap_or(Err(TransportError::Closed))
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.dispatcher.close();
    }
}

async fn read_loop<R>(mut reader: R, dispatcher: Arc<Dispatcher>)
where
    R: AsyncRead + Unpin,
{
    let connection_id = dispatcher.connection_id();
    loop {
        match framing::read_message(&mut reader).await {
            Ok(Some(body)) => dispatcher.dispatch(Message::new(body, connection_id)),
            Ok(None) => {
                info!(connection_id = %connection_id, "Peer closed the connection");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, "Connection read failed: {}", e);
                break;
            }
        }
    }
    dispatcher.close();
}

async fn write_loop<W>(
    mut writer: W,
    mut queue: mpsc::UnboundedReceiver<WriteCommand>,
    dispatcher: Arc<Dispatcher>,
) where
    W: AsyncWrite + Unpin,
{
    let connection_id = dispatcher.connection_id();
    while let Some(command) = queue.recv().await {
        match command {
            WriteCommand::Message(message, done) => {
                if let Err(e) = framing::write_encoded(&mut writer, &message).await {
                    error!(connection_id = %connection_id, "Failed to write message: {}", e);
                    let _ = done.send(Err(e));
                    dispatcher.close();
                    return;
                }
                let _ = done.send(Ok(()));
            }
            WriteCommand::Shutdown(done) => {
                if let Err(e) = writer.shutdown().await {
                    debug!(connection_id = %connection_id, "Write shutdown failed: {}", e);
                }
                let _ = done.send(());
                return;
            }
        }
    }

    // every handle dropped: flush what was queued, then end the stream
    if let Err(e) = writer.shutdown().await {
        debug!(connection_id = %connection_id, "Write shutdown failed: {}", e);
    }
}

/// Establishes TCP connections with retry and exponential backoff, and hands
/// out the current one while it stays connected.
pub struct ConnectionManager {
    addr: String,
    connection: Option<Arc<StreamConnection>>,
    options: ConnectionOptions,
    connect_timeout: Duration,
    reconnect_attempts: u32,
    max_reconnect_attempts: u32,
    reconnect_delay_ms: u64,
}

impl ConnectionManager {
    pub fn new(addr: &str) -> Self {
        ConnectionManager {
            addr: addr.to_string(),
            connection: None,
            options: ConnectionOptions::default(),
            connect_timeout: Duration::from_secs(10),
            reconnect_attempts: 0,
            max_reconnect_attempts: 10,
            reconnect_delay_ms: 1000,
        }
    }

    pub fn with_reconnect_policy(mut self, max_attempts: u32, initial_delay_ms: u64) -> Self {
        self.max_reconnect_attempts = max_attempts.max(1);
        self.reconnect_delay_ms = initial_delay_ms;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn get_connection(&mut self) -> Result<Arc<StreamConnection>> {
        if let Some(conn) = &self.connection {
            if conn.is_connected() {
                return Ok(conn.clone());
            }
        }
        self.establish_connection().await
    }

    async fn establish_connection(&mut self) -> Result<Arc<StreamConnection>> {
        self.reconnect_attempts = 0;
        let mut delay = self.reconnect_delay_ms;

        loop {
            info!("Attempting to connect to {}", self.addr);

            let attempt = match timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(e)) => Err(TransportError::from(e)),
                Err(elapsed) => Err(TransportError::from(elapsed)),
            };

            match attempt {
                Ok(stream) => {
                    let conn = Arc::new(StreamConnection::from_tcp(stream, self.options.clone()));
                    info!(connection_id = %conn.id(), "Successfully connected to {}", self.addr);
                    self.connection = Some(conn.clone());
                    return Ok(conn);
                }
                Err(err) => {
                    self.reconnect_attempts += 1;
                    error!(
                        "Failed to connect to {} (attempt {}/{}): {}",
                        self.addr, self.reconnect_attempts, self.max_reconnect_attempts, err
                    );

                    if self.reconnect_attempts >= self.max_reconnect_attempts {
                        error!("Max reconnection attempts reached. Giving up.");
                        return Err(TransportError::ReconnectExhausted(self.reconnect_attempts));
                    }

                    // Exponential backoff with jitter
                    let jitter = (rand::random::<f64>() * 0.3 - 0.15) * delay as f64;
                    let sleep_time = (delay as f64 + jitter).max(0.0) as u64;
                    info!("Waiting {}ms before next reconnect attempt", sleep_time);
                    sleep(Duration::from_millis(sleep_time)).await;

                    delay = std::cmp::min(delay * 2, 30000); // Cap at 30 seconds
                }
            }
        }
    }

    pub async fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            info!("Closing connection to {}", self.addr);
            conn.close().await;
        }
    }
}
