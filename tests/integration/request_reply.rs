use bytes::Bytes;
use rust_easytcp::action::{self, ActionCode};
use rust_easytcp::transport::ConnectionOptions;
use rust_easytcp::utils::compression;
use rust_easytcp::{Connection, EasyClient, Message, Packet, Payload, ReplyError, RequestOptions, TextEncoding};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::common::{connected, connected_with, connected_with_inbox, echo_client};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u64,
    items: Vec<String>,
}

struct Login {
    user: &'static str,
}

impl Packet for Login {
    fn data(&self) -> Bytes {
        Bytes::from(format!("LOGIN {}", self.user))
    }
}

#[tokio::test]
async fn test_echo_every_payload_shape() {
    let client = echo_client();

    let reply = client.send_and_get_reply(&[1u8, 2, 3], None).await.unwrap().unwrap();
    assert_eq!(&reply.data()[..], &[1, 2, 3]);

    let reply = client.send_and_get_reply("plain text", None).await.unwrap().unwrap();
    assert_eq!(reply.to_text(TextEncoding::Utf8), "plain text");

    let reply = client
        .send_and_get_reply(Payload::text("café", TextEncoding::Latin1), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.len(), 4);
    assert_eq!(reply.to_text(TextEncoding::Latin1), "café");

    let reply = client
        .send_and_get_reply(Payload::packet(&Login { user: "ada" }), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&reply.data()[..], b"LOGIN ada");

    let order = Order {
        id: 42,
        items: vec!["tea".into(), "scone".into()],
    };
    let reply = client.send_object_and_get_reply(&order, None).await.unwrap().unwrap();
    assert_eq!(client.read_object::<Order>(&reply).unwrap(), order);

    let reply = client.send_and_get_reply(Payload::Empty, None).await.unwrap().unwrap();
    assert!(reply.is_empty());
}

#[tokio::test]
async fn test_none_object_sends_empty_body() {
    let client = echo_client();
    let payload = Payload::optional_object::<_, Order>(client.serializer(), None).unwrap();

    let reply = client.send_and_get_reply(payload, None).await.unwrap().unwrap();
    assert!(reply.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_returns_none_within_slack() {
    let (connection, mut peer) = connected();
    let client = EasyClient::new(connection);
    let timeout = Duration::from_millis(300);

    let started = Instant::now();
    let reply = client
        .send_and_get_reply("anyone?", Some(RequestOptions::new().with_timeout(timeout)))
        .await
        .unwrap();
    let waited = started.elapsed();

    assert!(reply.is_none());
    assert!(waited >= timeout);
    assert!(waited < timeout + Duration::from_millis(50));
    assert_eq!(&peer.recv().await.data()[..], b"anyone?");
}

#[tokio::test(start_paused = true)]
async fn test_default_timeout_is_five_seconds() {
    let (connection, _peer) = connected();
    let client = EasyClient::new(connection);

    let started = Instant::now();
    let reply = client.send_and_get_reply("hello?", None).await.unwrap();
    let waited = started.elapsed();

    assert!(reply.is_none());
    assert!(waited >= Duration::from_millis(5000));
    assert!(waited < Duration::from_millis(5050));
}

#[tokio::test(start_paused = true)]
async fn test_connection_usable_after_timeout() {
    let (client, mut peer, mut inbox) = connected_with_inbox();
    let options = RequestOptions::new().with_timeout(Duration::from_millis(200));

    let reply = client.send_action_and_get_reply("ping", Payload::Empty, Some(options)).await.unwrap();
    assert!(reply.is_none());

    let request = peer.recv().await;
    let (code, body) = action::decode(request.data()).unwrap();
    assert_eq!(code, ActionCode(2_088_104_533));
    assert!(body.is_empty());

    // an answer after the deadline is an ordinary unsolicited message
    peer.reply(Bytes::from_static(b"pong, late")).await;
    let late = inbox.recv().await.unwrap();
    assert_eq!(&late.data()[..], b"pong, late");

    // and the next exchange still pairs up
    let (reply, ()) = tokio::join!(
        client.send_and_get_reply("again", Some(options)),
        async {
            let request = peer.recv().await;
            assert_eq!(&request.data()[..], b"again");
            peer.reply(Bytes::from_static(b"welcome back")).await;
        }
    );
    assert_eq!(&reply.unwrap().unwrap().data()[..], b"welcome back");
    assert!(inbox.try_recv().is_err());
}

#[tokio::test]
async fn test_unsolicited_message_goes_to_default_handler() {
    let (client, peer, mut inbox) = connected_with_inbox();

    peer.reply(Bytes::from_static(b"server hello")).await;
    let message = inbox.recv().await.unwrap();
    assert_eq!(&message.data()[..], b"server hello");
    assert_eq!(message.connection_id(), client.connection().id());
}

#[tokio::test]
async fn test_action_request_and_reply() {
    let (connection, mut peer) = connected();
    let client = EasyClient::new(connection);

    let (reply, ()) = tokio::join!(
        client.send_action_and_get_reply(7, "hello", None),
        async {
            let request = peer.recv().await;
            let (code, body) = request.action().unwrap();
            assert_eq!(code, ActionCode(7));
            assert_eq!(body.to_text(TextEncoding::Utf8), "hello");
            peer.reply("world").await;
        }
    );

    let reply = reply.unwrap().unwrap();
    assert_eq!(reply.to_text(TextEncoding::Utf8), "world");
}

#[tokio::test]
async fn test_named_action_with_object() {
    let (connection, mut peer) = connected();
    let client = EasyClient::new(connection);
    let order = Order {
        id: 7,
        items: vec!["pen".into()],
    };

    let (reply, ()) = tokio::join!(
        client.send_action_object_and_get_reply("login", &order, None),
        async {
            let request = peer.recv().await;
            assert_eq!(&request.data()[..4], &[0x46, 0x88, 0x53, 0x0a]);
            let (_, body) = request.action().unwrap();
            let seen: Order = serde_json::from_slice(body.data()).unwrap();
            assert_eq!(seen.id, 7);
            peer.reply("ok").await;
        }
    );
    assert_eq!(&reply.unwrap().unwrap().data()[..], b"ok");
}

#[tokio::test]
async fn test_compressed_round_trip() {
    let (connection, mut peer) = connected();
    let client = EasyClient::new(connection);
    let text = "the quick brown fox ".repeat(40);
    let options = RequestOptions::new().with_compression(true);

    let (reply, ()) = tokio::join!(
        client.send_action_and_get_reply("echo", text.as_str(), Some(options)),
        async {
            let request = peer.recv().await;
            let (_, body) = request.action().unwrap();
            assert!(compression::is_compressed(body.data()));
            assert!(body.len() < text.len());

            let plain = body.decompress().unwrap();
            let packed = compression::compress(plain.data()).unwrap();
            peer.reply(packed).await;
        }
    );

    let reply = reply.unwrap().unwrap().decompress().unwrap();
    assert_eq!(reply.to_text(TextEncoding::Utf8), text);
}

#[tokio::test]
async fn test_second_concurrent_request_rejected() {
    let (connection, mut peer) = connected();
    let client = EasyClient::new(connection);

    let (first, second, ()) = tokio::join!(
        client.send_and_get_reply("first", None),
        async {
            while client.connection().dispatcher().pending_count() == 0 {
                tokio::task::yield_now().await;
            }
            client.send_and_get_reply("second", None).await
        },
        async {
            let request = peer.recv().await;
            assert_eq!(&request.data()[..], b"first");
            // let the competing request run into the limit first
            tokio::task::yield_now().await;
            peer.reply("for first").await;
        }
    );

    assert_eq!(&first.unwrap().unwrap().data()[..], b"for first");
    assert!(matches!(second, Err(ReplyError::RequestPending(1))));
}

#[tokio::test]
async fn test_raised_limit_matches_replies_in_order() {
    let (connection, mut peer) = connected_with(ConnectionOptions {
        max_pending: 2,
        ..ConnectionOptions::default()
    });
    let client = EasyClient::new(connection);

    let (first, second, ()) = tokio::join!(
        client.send_and_get_reply("a", None),
        client.send_and_get_reply("b", None),
        async {
            let one: Message = peer.recv().await;
            let two: Message = peer.recv().await;
            peer.reply(one.into_data()).await;
            peer.reply(two.into_data()).await;
        }
    );

    assert_eq!(&first.unwrap().unwrap().data()[..], b"a");
    assert_eq!(&second.unwrap().unwrap().data()[..], b"b");
}

#[tokio::test]
async fn test_dropped_request_unregisters() {
    let (connection, _peer) = connected();
    let client = EasyClient::new(connection);

    {
        let request = client.send_and_get_reply("abandoned", None);
        tokio::pin!(request);
        // poll once so the request registers, then drop it
        assert!(futures::poll!(request.as_mut()).is_pending());
        assert_eq!(client.connection().dispatcher().pending_count(), 1);
    }
    assert_eq!(client.connection().dispatcher().pending_count(), 0);
}
