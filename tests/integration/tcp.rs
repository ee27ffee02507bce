use rust_easytcp::transport::{
    ChannelHandler, Connection, ConnectionOptions, StreamConnection, TransportError,
};
use rust_easytcp::{ClientSettings, EasyClient, TextEncoding};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Accepts connections and echoes each message back, prefixed with `re: `.
/// Every accepted connection is reported on the returned channel.
async fn spawn_echo_server() -> (String, mpsc::UnboundedReceiver<Arc<StreamConnection>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let (handler, mut inbound) = ChannelHandler::new();
            let connection = Arc::new(StreamConnection::from_tcp(
                stream,
                ConnectionOptions {
                    handler: Arc::new(handler),
                    ..ConnectionOptions::default()
                },
            ));
            let _ = accepted_tx.send(connection.clone());
            tokio::spawn(async move {
                while let Some(message) = inbound.recv().await {
                    let mut body = b"re: ".to_vec();
                    body.extend_from_slice(message.data());
                    if connection.send(&[body.into()]).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    (addr, accepted_rx)
}

fn settings(addr: &str) -> ClientSettings {
    ClientSettings {
        addr: addr.to_string(),
        reply_timeout: Duration::from_secs(2),
        reconnect_attempts: 3,
        reconnect_delay_ms: 10,
        ..ClientSettings::default()
    }
}

#[tokio::test]
async fn test_request_reply_over_tcp() {
    let (addr, _accepted) = spawn_echo_server().await;
    let settings = settings(&addr);
    let mut manager = settings.connection_manager();

    let connection = manager.get_connection().await.unwrap();
    let client = EasyClient::new(connection).with_defaults(settings.request_options());

    for word in ["one", "two", "three"] {
        let reply = client.send_and_get_reply(word, None).await.unwrap().unwrap();
        assert_eq!(reply.to_text(TextEncoding::Utf8), format!("re: {}", word));
    }

    manager.close().await;
    assert!(!client.connection().is_connected());
}

#[tokio::test]
async fn test_manager_reconnects_after_server_hangs_up() {
    let (addr, mut accepted) = spawn_echo_server().await;
    let mut manager = settings(&addr).connection_manager();

    let first = manager.get_connection().await.unwrap();
    let server_side = accepted.recv().await.unwrap();
    server_side.close().await;

    for _ in 0..200 {
        if !first.is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!first.is_connected());

    let second = manager.get_connection().await.unwrap();
    assert_ne!(first.id(), second.id());

    let client = EasyClient::new(second);
    let reply = client.send_and_get_reply("back", None).await.unwrap().unwrap();
    assert_eq!(&reply.data()[..], b"re: back");
}

#[tokio::test]
async fn test_manager_reports_unreachable_server() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let mut manager = settings(&addr).connection_manager();

    assert!(matches!(
        manager.get_connection().await,
        Err(TransportError::ReconnectExhausted(3))
    ));
}
