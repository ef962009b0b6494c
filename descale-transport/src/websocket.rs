use super::{Sender, TransportError};
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use log::{debug, info, warn};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::broadcast;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Frames buffered per client before a slow client starts skipping.
const CLIENT_BACKLOG: usize = 16;

/// WebSocket sender that broadcasts every frame to all connected clients.
pub struct WebSocketSender {
    host: String,
    port: u16,
    tx: Option<broadcast::Sender<String>>,
    runtime: Option<Runtime>,
}

impl WebSocketSender {
    pub fn new(host: &str, port: u16) -> Self {
        WebSocketSender {
            host: host.to_string(),
            port,
            tx: None,
            runtime: None,
        }
    }

    /// Binds the listening socket and serves clients on a background runtime.
    pub fn start(&mut self) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let addr = format!("{}:{}", self.host, self.port);
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| TransportError::WebSocket(format!("Invalid address {}: {}", addr, e)))?;

        let listener = runtime
            .block_on(TcpListener::bind(socket_addr))
            .map_err(|e| TransportError::WebSocket(format!("Failed to bind {}: {}", socket_addr, e)))?;
        info!("WebSocket server listening on ws://{}", socket_addr);

        let (tx, _) = broadcast::channel::<String>(CLIENT_BACKLOG);
        let clients = tx.clone();
        runtime.spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        tokio::spawn(serve_client(stream, peer, clients.subscribe()));
                    }
                    Err(e) => warn!("Failed to accept WebSocket connection: {}", e),
                }
            }
        });

        self.tx = Some(tx);
        self.runtime = Some(runtime);
        Ok(())
    }

    pub fn client_count(&self) -> usize {
        self.tx.as_ref().map_or(0, |tx| tx.receiver_count())
    }
}

impl Sender for WebSocketSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| TransportError::WebSocket("WebSocket server not started".to_string()))?;

        if tx.receiver_count() == 0 {
            return Ok(());
        }

        let text = std::str::from_utf8(data)
            .map_err(|e| TransportError::WebSocket(format!("Invalid UTF-8: {}", e)))?;
        // Fails only when every client disconnected since the count above.
        let _ = tx.send(text.to_string());
        Ok(())
    }
}

async fn serve_client(stream: TcpStream, peer: SocketAddr, mut frames: broadcast::Receiver<String>) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", peer, e);
            return;
        }
    };
    info!("Client connected: {}", peer);

    let (mut outgoing, mut incoming) = ws_stream.split();
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(text) => {
                    if let Err(e) = outgoing.send(Message::Text(text)).await {
                        if !is_disconnect_error(&e) {
                            warn!("WebSocket send error: {} - {}", peer, e);
                        }
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Client {} lagged, skipped {} frames", peer, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            message = incoming.next() => match message {
                None | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    if !is_disconnect_error(&e) {
                        warn!("WebSocket receive error: {} - {}", peer, e);
                    }
                    break;
                }
            },
        }
    }

    info!("Client disconnected: {}", peer);
}

fn is_disconnect_error(e: &WsError) -> bool {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Io(io_err) => matches!(
            io_err.kind(),
            std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
        ),
        _ => false,
    }
}
