// src/client.rs
// Request/reply facade over a connection, in async and blocking flavours

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::action::Action;
use crate::message::Message;
use crate::messaging::error::Result;
use crate::payload::{JsonSerializer, Payload, Serializer};
use crate::transport::connection::{Connection, ConnectionManager, ConnectionOptions};
use crate::transport::dispatcher::DEFAULT_MAX_PENDING;
use crate::transport::request_response::{self, DEFAULT_REPLY_TIMEOUT};
use crate::transport::tokio_exec::BlockingExecutor;

/// Per-request knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// How long to wait for a reply. `None` means [`DEFAULT_REPLY_TIMEOUT`].
    pub timeout: Option<Duration>,
    /// Deflate the body before sending. Empty bodies are never compressed.
    pub compression: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }
}

/// Connection target, request defaults and reconnect policy, as loaded from
/// the environment or a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub addr: String,
    pub reply_timeout: Duration,
    pub max_pending: usize,
    pub compression: bool,
    pub connect_timeout: Duration,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:7878".to_string(),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            max_pending: DEFAULT_MAX_PENDING,
            compression: false,
            connect_timeout: Duration::from_secs(10),
            reconnect_attempts: 10,
            reconnect_delay_ms: 1000,
        }
    }
}

impl ClientSettings {
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            timeout: Some(self.reply_timeout),
            compression: self.compression,
        }
    }

    /// A manager that connects to `addr` with these settings.
    pub fn connection_manager(&self) -> ConnectionManager {
        ConnectionManager::new(&self.addr)
            .with_reconnect_policy(self.reconnect_attempts, self.reconnect_delay_ms)
            .with_connect_timeout(self.connect_timeout)
            .with_options(ConnectionOptions {
                max_pending: self.max_pending,
                ..ConnectionOptions::default()
            })
    }
}

/// Sends payloads over one connection and waits for the next inbound message
/// as the reply.
///
/// Every operation has an async form and a `_blocking` form. Both prepare the
/// payload the same way and wait on the same future; the blocking form drives
/// it through the runtime captured when the client was created. Passing
/// `None` for options uses the client defaults (see
/// [`EasyClient::with_defaults`]).
pub struct EasyClient<C: Connection + ?Sized, S: Serializer = JsonSerializer> {
    connection: Arc<C>,
    serializer: S,
    defaults: RequestOptions,
    executor: BlockingExecutor,
}

impl<C: Connection + ?Sized> EasyClient<C> {
    /// Creates a client using JSON for object payloads. Captures the current
    /// tokio runtime, if any, for the blocking operations.
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            connection,
            serializer: JsonSerializer,
            defaults: RequestOptions::default(),
            executor: BlockingExecutor::current(),
        }
    }
}

impl<C: Connection + ?Sized, S: Serializer> EasyClient<C, S> {
    pub fn with_serializer<S2: Serializer>(self, serializer: S2) -> EasyClient<C, S2> {
        EasyClient {
            connection: self.connection,
            serializer,
            defaults: self.defaults,
            executor: self.executor,
        }
    }

    pub fn with_executor(mut self, executor: BlockingExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_defaults(mut self, defaults: RequestOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn defaults(&self) -> RequestOptions {
        self.defaults
    }

    /// Decompresses (when needed) and deserializes a reply with this
    /// client's serializer.
    pub fn read_object<R: DeserializeOwned>(&self, reply: &Message) -> Result<R> {
        reply.decompress()?.deserialize(&self.serializer)
    }

    fn resolve(&self, options: Option<RequestOptions>) -> RequestOptions {
        match options {
            Some(options) => RequestOptions {
                timeout: options.timeout.or(self.defaults.timeout),
                compression: options.compression,
            },
            None => self.defaults,
        }
    }

    fn prepare(
        &self,
        action: Option<Action>,
        payload: Payload,
        options: &RequestOptions,
    ) -> Result<Vec<Bytes>> {
        let code = action.map(|action| action.code()).transpose()?;
        if let Some(code) = code {
            debug!(connection_id = %self.connection.id(), action = %code, "Encoding action request");
        }
        payload.into_frames(code, options.compression)
    }

    async fn request(
        &self,
        action: Option<Action>,
        payload: Payload,
        options: Option<RequestOptions>,
    ) -> Result<Option<Message>> {
        let options = self.resolve(options);
        let frames = self.prepare(action, payload, &options)?;
        request_response::send_and_get_reply(&*self.connection, &frames, options.timeout).await
    }

    async fn post(
        &self,
        action: Option<Action>,
        payload: Payload,
        options: Option<RequestOptions>,
    ) -> Result<()> {
        let options = self.resolve(options);
        let frames = self.prepare(action, payload, &options)?;
        request_response::send(&*self.connection, &frames).await
    }

    /// Sends `payload` without waiting for a reply.
    #[instrument(skip_all, fields(connection_id = %self.connection.id()))]
    pub async fn send(
        &self,
        payload: impl Into<Payload>,
        options: Option<RequestOptions>,
    ) -> Result<()> {
        self.post(None, payload.into(), options).await
    }

    #[instrument(skip_all, fields(connection_id = %self.connection.id()))]
    pub async fn send_action(
        &self,
        action: impl Into<Action>,
        payload: impl Into<Payload>,
        options: Option<RequestOptions>,
    ) -> Result<()> {
        self.post(Some(action.into()), payload.into(), options).await
    }

    /// Sends `payload` and returns the next message received on the
    /// connection, or `None` if the timeout passes first.
    #[instrument(skip_all, fields(connection_id = %self.connection.id()))]
    pub async fn send_and_get_reply(
        &self,
        payload: impl Into<Payload>,
        options: Option<RequestOptions>,
    ) -> Result<Option<Message>> {
        self.request(None, payload.into(), options).await
    }

    /// Like [`EasyClient::send_and_get_reply`], with the body prefixed by the
    /// action's code. The reply is returned as received.
    #[instrument(skip_all, fields(connection_id = %self.connection.id()))]
    pub async fn send_action_and_get_reply(
        &self,
        action: impl Into<Action>,
        payload: impl Into<Payload>,
        options: Option<RequestOptions>,
    ) -> Result<Option<Message>> {
        self.request(Some(action.into()), payload.into(), options).await
    }

    /// Serializes `value` with the client's serializer and sends it. A
    /// serializer failure is returned before anything is sent.
    pub async fn send_object_and_get_reply<T: Serialize + ?Sized>(
        &self,
        value: &T,
        options: Option<RequestOptions>,
    ) -> Result<Option<Message>> {
        let payload = Payload::object(&self.serializer, value)?;
        self.request(None, payload, options).await
    }

    pub async fn send_action_object_and_get_reply<T: Serialize + ?Sized>(
        &self,
        action: impl Into<Action>,
        value: &T,
        options: Option<RequestOptions>,
    ) -> Result<Option<Message>> {
        let payload = Payload::object(&self.serializer, value)?;
        self.request(Some(action.into()), payload, options).await
    }

    pub fn send_blocking(
        &self,
        payload: impl Into<Payload>,
        options: Option<RequestOptions>,
    ) -> Result<()> {
        self.executor.block_on(self.send(payload, options))?
    }

    pub fn send_action_blocking(
        &self,
        action: impl Into<Action>,
        payload: impl Into<Payload>,
        options: Option<RequestOptions>,
    ) -> Result<()> {
        self.executor
            .block_on(self.send_action(action, payload, options))?
    }

    /// Blocking form of [`EasyClient::send_and_get_reply`]. Fails with
    /// `ReplyError::BlockingInAsyncContext` on a `current_thread` runtime.
    pub fn send_and_get_reply_blocking(
        &self,
        payload: impl Into<Payload>,
        options: Option<RequestOptions>,
    ) -> Result<Option<Message>> {
        self.executor
            .block_on(self.send_and_get_reply(payload, options))?
    }

    pub fn send_action_and_get_reply_blocking(
        &self,
        action: impl Into<Action>,
        payload: impl Into<Payload>,
        options: Option<RequestOptions>,
    ) -> Result<Option<Message>> {
        self.executor
            .block_on(self.send_action_and_get_reply(action, payload, options))?
    }

    pub fn send_object_and_get_reply_blocking<T: Serialize + ?Sized>(
        &self,
        value: &T,
        options: Option<RequestOptions>,
    ) -> Result<Option<Message>> {
        self.executor
            .block_on(self.send_object_and_get_reply(value, options))?
    }

    pub fn send_action_object_and_get_reply_blocking<T: Serialize + ?Sized>(
        &self,
        action: impl Into<Action>,
        value: &T,
        options: Option<RequestOptions>,
    ) -> Result<Option<Message>> {
        self.executor
            .block_on(self.send_action_object_and_get_reply(action, value, options))?
    }
}
