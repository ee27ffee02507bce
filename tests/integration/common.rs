#![allow(dead_code)]

use bytes::Bytes;
use rust_easytcp::transport::{
    ChannelHandler, Connection, ConnectionOptions, InboundHandler, StreamConnection,
};
use rust_easytcp::{EasyClient, Message};
use std::sync::Arc;
use tokio::sync::mpsc;

/// The far end of an in-memory connection, driven by the test.
pub struct Peer {
    pub connection: Arc<StreamConnection>,
    inbound: mpsc::UnboundedReceiver<Message>,
}

impl Peer {
    pub async fn recv(&mut self) -> Message {
        self.inbound.recv().await.expect("peer connection closed")
    }

    pub async fn reply(&self, body: impl Into<Bytes>) {
        self.connection
            .send(&[body.into()])
            .await
            .expect("peer failed to send");
    }

    /// Echoes every message back until the connection closes.
    pub fn spawn_echo(mut self) {
        tokio::spawn(async move {
            while let Some(message) = self.inbound.recv().await {
                if self.connection.send(&[message.into_data()]).await.is_err() {
                    break;
                }
            }
        });
    }
}

/// A client connection with `options`, and the peer on the other end.
pub fn connected_with(options: ConnectionOptions) -> (Arc<StreamConnection>, Peer) {
    let (left, right) = tokio::io::duplex(64 * 1024);
    let (handler, inbound) = ChannelHandler::new();
    let client = StreamConnection::from_stream_with(left, options);
    let peer = StreamConnection::from_stream_with(
        right,
        ConnectionOptions {
            handler: Arc::new(handler),
            ..ConnectionOptions::default()
        },
    );
    (
        Arc::new(client),
        Peer {
            connection: Arc::new(peer),
            inbound,
        },
    )
}

pub fn connected() -> (Arc<StreamConnection>, Peer) {
    connected_with(ConnectionOptions::default())
}

/// A client whose unsolicited messages land in the returned receiver.
pub fn connected_with_inbox() -> (
    EasyClient<StreamConnection>,
    Peer,
    mpsc::UnboundedReceiver<Message>,
) {
    let (handler, inbox) = ChannelHandler::new();
    let handler: Arc<dyn InboundHandler> = Arc::new(handler);
    let (connection, peer) = connected_with(ConnectionOptions {
        handler,
        ..ConnectionOptions::default()
    });
    (EasyClient::new(connection), peer, inbox)
}

pub fn echo_client() -> EasyClient<StreamConnection> {
    let (connection, peer) = connected();
    peer.spawn_echo();
    EasyClient::new(connection)
}
