use rust_easytcp::action::ActionCode;
use rust_easytcp::{Connection, ReplyError, RequestOptions, TextEncoding};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::common::{connected, echo_client};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

#[test]
fn test_blocking_echo_from_plain_threads() {
    let runtime = runtime();
    let client = {
        let _guard = runtime.enter();
        Arc::new(echo_client())
    };

    let reply = client.send_and_get_reply_blocking("sync hello", None).unwrap().unwrap();
    assert_eq!(reply.to_text(TextEncoding::Utf8), "sync hello");

    // one request at a time on the connection, from another thread
    let worker = {
        let client = client.clone();
        std::thread::spawn(move || {
            client
                .send_action_and_get_reply_blocking(7, "from worker", None)
                .unwrap()
                .unwrap()
        })
    };
    let reply = worker.join().unwrap();
    let (code, body) = reply.action().unwrap();
    assert_eq!(code, ActionCode(7));
    assert_eq!(body.to_text(TextEncoding::Utf8), "from worker");
}

#[test]
fn test_blocking_object_and_fire_and_forget() {
    let runtime = runtime();
    let client = {
        let _guard = runtime.enter();
        echo_client()
    };

    let value = json!({ "kind": "greeting", "count": 2 });
    let reply = client
        .send_object_and_get_reply_blocking(&value, None)
        .unwrap()
        .unwrap();
    let echoed: serde_json::Value = client.read_object(&reply).unwrap();
    assert_eq!(echoed, value);

    // the echo of a fire-and-forget send is unsolicited and dropped
    client.send_blocking("no reply wanted", None).unwrap();
}

#[test]
fn test_blocking_timeout_returns_none() {
    let runtime = runtime();
    let (client, _peer) = {
        let _guard = runtime.enter();
        let (connection, peer) = connected();
        (rust_easytcp::EasyClient::new(connection), peer)
    };
    let timeout = Duration::from_millis(100);

    let started = Instant::now();
    let reply = client
        .send_and_get_reply_blocking("silence", Some(RequestOptions::new().with_timeout(timeout)))
        .unwrap();

    assert!(reply.is_none());
    assert!(started.elapsed() >= timeout);
    assert_eq!(client.connection().dispatcher().pending_count(), 0);
}

#[tokio::test]
async fn test_blocking_inside_async_context_is_an_error() {
    let client = echo_client();
    assert!(matches!(
        client.send_action_and_get_reply_blocking("ping", "", None),
        Err(ReplyError::BlockingInAsyncContext)
    ));

    // the async form works on the same client
    let reply = client.send_and_get_reply("async", None).await.unwrap();
    assert!(reply.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_from_spawn_blocking() {
    let client = Arc::new(echo_client());

    let reply = {
        let client = client.clone();
        tokio::task::spawn_blocking(move || client.send_and_get_reply_blocking("hi", None))
            .await
            .unwrap()
    };
    assert_eq!(reply.unwrap().unwrap().to_text(TextEncoding::Utf8), "hi");

    // and straight from a worker thread
    let reply = client.send_and_get_reply_blocking("worker", None).unwrap().unwrap();
    assert_eq!(reply.to_text(TextEncoding::Utf8), "worker");
}
