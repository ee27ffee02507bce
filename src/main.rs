use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use rust_easytcp::env::Config;
use rust_easytcp::transport::{ActionRouter, Connection, ConnectionOptions, StreamConnection};
use rust_easytcp::{EasyClient, Message, TextEncoding};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().map_err(|e| anyhow!("Failed to load configuration: {}", e))?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("server") => {
            let addr = args.get(1).cloned().unwrap_or_else(|| config.addr.clone());
            run_server(&addr, config.max_pending).await
        }
        Some("client") => {
            let action = args.get(1).map(String::as_str).unwrap_or("echo");
            let text = args.get(2).map(String::as_str).unwrap_or("hello");
            run_client(&config, action, text).await
        }
        _ => {
            eprintln!("Usage: rust-easytcp server [addr]");
            eprintln!("       rust-easytcp client [action] [text]");
            Ok(())
        }
    }
}

async fn run_server(addr: &str, max_pending: usize) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind {}", addr))?;
    info!("Echo server listening on {}", listener.local_addr()?);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        info!("Accepted connection from {}", peer);
                        serve_connection(stream, max_pending);
                    }
                    Err(e) => error!("Accept failed: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

/// Answers `ping` with `pong`, echoes the body of `echo`, and echoes any
/// other message back unchanged.
fn serve_connection(stream: tokio::net::TcpStream, max_pending: usize) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();

    let mut router = ActionRouter::new();
    let pong = outbound_tx.clone();
    let echo = outbound_tx.clone();
    let raw = outbound_tx;
    let registered = router
        .register("ping", move |_: Message| {
            let _ = pong.send(Bytes::from_static(b"pong"));
        })
        .and_then(|router| {
            router.register("echo", move |body: Message| {
                let _ = echo.send(body.into_data());
            })
        });
    if let Err(e) = registered {
        error!("Failed to register actions: {}", e);
        return;
    }
    router.fallback(move |message: Message| {
        let _ = raw.send(message.into_data());
    });

    let connection = StreamConnection::from_tcp(
        stream,
        ConnectionOptions {
            handler: Arc::new(router),
            max_pending,
        },
    );

    tokio::spawn(async move {
        loop {
            tokio::select! {
                outbound = outbound_rx.recv() => {
                    let Some(body) = outbound else { break };
                    if let Err(e) = connection.send(&[body]).await {
                        warn!(connection_id = %connection.id(), "Reply failed: {}", e);
                        break;
                    }
                }
                _ = connection.dispatcher().closed() => break,
            }
        }
        // dropping the connection releases the router and its senders
        connection.close().await;
    });
}

async fn run_client(config: &Config, action: &str, text: &str) -> Result<()> {
    let settings = config.client_settings();
    let mut manager = settings.connection_manager();
    let connection = manager.get_connection().await?;

    let client = EasyClient::new(connection).with_defaults(settings.request_options());
    match client.send_action_and_get_reply(action, text, None).await? {
        Some(reply) => {
            let reply = reply.decompress()?;
            println!("{}", reply.to_text(TextEncoding::Utf8));
        }
        None => println!("No reply within {:?}", settings.reply_timeout),
    }

    manager.close().await;
    Ok(())
}
