//! WebSocket echo server over pre-upgraded TCP streams.
//!
//! The HTTP upgrade is expected to happen in front of this process (for
//! example in a proxy), so every accepted TCP stream already speaks frames.
//!
//! Run with: `RUST_LOG=debug cargo run --example echo_server`
//! Then, in another terminal: `cargo run --example echo_server -- client`

use std::error::Error;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wsloop::{CloseCode, Config, Connection, Control, Handler, Message, Role, WebSocket};

const ADDR: &str = "127.0.0.1:9001";

struct Echo;

impl Handler for Echo {
    fn on_message(&mut self, ws: &WebSocket, message: Message) {
        info!(len = message.len(), text = message.is_text(), "echoing message");
        if let Err(err) = ws.send(message) {
            error!(error = %err, "echo refused");
        }
    }

    fn on_control(&mut self, _ws: &WebSocket, control: &Control) {
        if let Control::Close(close) = control {
            info!(?close, "peer closed");
        }
    }

    fn on_error(&mut self, _ws: &WebSocket, err: &wsloop::Error) {
        error!(error = %err, "connection failed");
    }
}

/// Forwards received messages to the client's main task.
struct Collect(mpsc::UnboundedSender<Message>);

impl Handler for Collect {
    fn on_message(&mut self, _ws: &WebSocket, message: Message) {
        let _ = self.0.send(message);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match std::env::args().nth(1).as_deref() {
        Some("client") => run_client().await,
        _ => run_server().await,
    }
}

async fn run_server() -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(ADDR).await?;
    info!(addr = ADDR, "echo server listening");

    loop {
        let (stream, addr) = listener.accept().await?;
        info!(%addr, "new connection");

        tokio::spawn(async move {
            let config = Config::default().with_close_timeout(Duration::from_secs(5));
            match Connection::new(stream, Role::Server, config, Echo).run().await {
                Ok(()) => info!(%addr, "connection closed"),
                Err(err) => error!(%addr, error = %err, "connection ended with error"),
            }
        });
    }
}

async fn run_client() -> Result<(), Box<dyn Error>> {
    let stream = TcpStream::connect(ADDR).await?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = Connection::new(stream, Role::Client, Config::default(), Collect(tx));
    let ws = conn.handle();
    let task = tokio::spawn(conn.run());

    for text in ["hello", "from", "wsloop"] {
        ws.send_text(text)?.await?;
        if let Some(reply) = rx.recv().await {
            info!(?reply, "echo received");
        }
    }

    let mut stream = ws.stream_text();
    let _ = stream.write_chunk("sent in ", false)?;
    let _ = stream.write_chunk("three ", false)?;
    stream.finish("chunks")?.await?;
    if let Some(reply) = rx.recv().await {
        info!(?reply, "echo of streamed message received");
    }

    ws.pong("heartbeat")?.await?;
    ws.ping("still there?")?.await?;
    ws.close(CloseCode::Normal, "done")?.await?;

    task.await??;
    info!("client finished");
    Ok(())
}
