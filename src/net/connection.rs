//! Connection Driver
//!
//! Per-socket read loop plus a writer task fed by an unbounded channel. The
//! rest of the server only sees a cloneable [`Connection`] handle going down
//! and a stream of [`ConnectionEvent`]s coming up; nothing here knows about
//! rooms or the game.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::net::frame::{self, Opcode, CLOSE_PROTOCOL_ERROR};
use crate::net::handshake::{accept_response, parse_upgrade, HandshakeError};

/// Largest accepted upgrade request head.
const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Something received from the peer.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A text frame.
    Text(String),
    /// A binary frame.
    Binary(Vec<u8>),
    /// The socket is gone: clean close, protocol violation, or I/O error.
    Closed,
}

#[derive(Debug)]
enum Outgoing {
    Text(String),
    Binary(Vec<u8>),
    Pong(Vec<u8>),
    Close { code: u16, reason: String },
}

/// Cloneable send handle for one socket. Sends after close are dropped.
#[derive(Clone, Debug)]
pub struct Connection {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Connection {
    /// Queue a text frame.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.tx.send(Outgoing::Text(text.into()));
    }

    /// Queue a binary frame.
    pub fn send_binary(&self, payload: Vec<u8>) {
        let _ = self.tx.send(Outgoing::Binary(payload));
    }

    /// Queue a close frame and tear the socket down.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.tx.send(Outgoing::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

/// Accepting a raw socket failed before it became a connection.
#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    /// Socket I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Invalid upgrade request.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    /// Request head never terminated within the size limit.
    #[error("upgrade request head too large")]
    HeadTooLarge,
    /// Peer hung up mid-handshake.
    #[error("socket closed during handshake")]
    ClosedEarly,
}

/// Perform the upgrade handshake on a fresh socket and spawn the read/write
/// tasks. Bytes that arrived behind the request head are fed straight into
/// the frame buffer.
pub async fn accept(
    mut stream: TcpStream,
    path: &str,
) -> Result<(Connection, mpsc::UnboundedReceiver<ConnectionEvent>), AcceptError> {
    let mut head: Vec<u8> = Vec::new();
    let head_end = loop {
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(AcceptError::ClosedEarly);
        }
        head.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_head_end(&head) {
            break pos;
        }
        if head.len() > MAX_HEAD_BYTES {
            return Err(AcceptError::HeadTooLarge);
        }
    };

    let head_str =
        std::str::from_utf8(&head[..head_end]).map_err(|_| HandshakeError::BadRequest)?;
    let req = parse_upgrade(head_str, path)?;
    stream
        .write_all(accept_response(&req.key).as_bytes())
        .await?;

    let leftover = head[head_end + 4..].to_vec();
    let (read_half, write_half) = stream.into_split();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    tokio::spawn(write_loop(write_half, out_rx));
    tokio::spawn(read_loop(read_half, leftover, event_tx, out_tx.clone()));

    Ok((Connection { tx: out_tx }, event_rx))
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    leftover: Vec<u8>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    out: mpsc::UnboundedSender<Outgoing>,
) {
    let mut buffer = leftover;
    loop {
        // Drain every complete frame already buffered.
        loop {
            match frame::decode(&buffer) {
                Ok(None) => break,
                Ok(Some((frame, consumed))) => {
                    buffer.drain(..consumed);
                    match frame.opcode {
                        Opcode::Text => {
                            let text = String::from_utf8_lossy(&frame.payload).into_owned();
                            let _ = events.send(ConnectionEvent::Text(text));
                        }
                        Opcode::Binary => {
                            let _ = events.send(ConnectionEvent::Binary(frame.payload));
                        }
                        Opcode::Close => {
                            let _ = out.send(Outgoing::Close {
                                code: 1000,
                                reason: "bye".to_string(),
                            });
                            let _ = events.send(ConnectionEvent::Closed);
                            return;
                        }
                        Opcode::Ping => {
                            let _ = out.send(Outgoing::Pong(frame.payload));
                        }
                        Opcode::Pong | Opcode::Other(_) => {}
                    }
                }
                Err(e) => {
                    debug!("frame decode error: {e}");
                    let _ = out.send(Outgoing::Close {
                        code: CLOSE_PROTOCOL_ERROR,
                        reason: e.to_string(),
                    });
                    let _ = events.send(ConnectionEvent::Closed);
                    return;
                }
            }
        }

        let mut chunk = [0u8; 4096];
        match read_half.read(&mut chunk).await {
            Ok(0) | Err(_) => {
                let _ = events.send(ConnectionEvent::Closed);
                return;
            }
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
}

async fn write_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Outgoing>) {
    while let Some(msg) = rx.recv().await {
        let result = match msg {
            Outgoing::Text(text) => {
                write_half
                    .write_all(&frame::encode(Opcode::Text, text.as_bytes()))
                    .await
            }
            Outgoing::Binary(payload) => {
                write_half
                    .write_all(&frame::encode(Opcode::Binary, &payload))
                    .await
            }
            Outgoing::Pong(payload) => {
                write_half
                    .write_all(&frame::encode(Opcode::Pong, &payload))
                    .await
            }
            Outgoing::Close { code, reason } => {
                let _ = write_half
                    .write_all(&frame::encode_close(code, &reason))
                    .await;
                let _ = write_half.shutdown().await;
                return;
            }
        };
        if result.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn masked_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
        let key = [0xAA, 0xBB, 0xCC, 0xDD];
        let mut out = vec![0x80 | opcode, 0x80 | payload.len() as u8];
        out.extend_from_slice(&key);
        out.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
        out
    }

    async fn connect_pair() -> (TcpStream, Connection, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client_task = tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(
                    b"GET /ws HTTP/1.1\r\n\
                      Host: localhost\r\n\
                      Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                      Sec-WebSocket-Version: 13\r\n\r\n",
                )
                .await
                .unwrap();
            let mut response = vec![0u8; 1024];
            let n = client.read(&mut response).await.unwrap();
            assert!(std::str::from_utf8(&response[..n])
                .unwrap()
                .starts_with("HTTP/1.1 101"));
            client
        });
        let (server_stream, _) = listener.accept().await.unwrap();
        let (conn, events) = accept(server_stream, "/ws").await.unwrap();
        (client_task.await.unwrap(), conn, events)
    }

    #[tokio::test]
    async fn test_text_round_trip() {
        let (mut client, conn, mut events) = connect_pair().await;

        client.write_all(&masked_frame(0x1, b"hello")).await.unwrap();
        match events.recv().await.unwrap() {
            ConnectionEvent::Text(text) => assert_eq!(text, "hello"),
            other => panic!("unexpected event: {other:?}"),
        }

        conn.send_text("world");
        let mut buf = vec![0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        let (frame, _) = frame::decode(&buf[..n]).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(frame.payload, b"world");
    }

    #[tokio::test]
    async fn test_ping_answered_with_pong() {
        let (mut client, _conn, _events) = connect_pair().await;

        client.write_all(&masked_frame(0x9, b"abc")).await.unwrap();
        let mut buf = vec![0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        let (frame, _) = frame::decode(&buf[..n]).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Pong);
        assert_eq!(frame.payload, b"abc");
    }

    #[tokio::test]
    async fn test_fragmented_frame_closes_1002() {
        let (mut client, _conn, mut events) = connect_pair().await;

        // FIN bit clear.
        client.write_all(&[0x01u8, 0x80, 0, 0, 0, 0]).await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            ConnectionEvent::Closed
        ));

        let mut buf = vec![0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        let (frame, _) = frame::decode(&buf[..n]).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Close);
        assert_eq!(&frame.payload[..2], &CLOSE_PROTOCOL_ERROR.to_be_bytes());
    }

    #[tokio::test]
    async fn test_peer_hangup_emits_closed() {
        let (client, _conn, mut events) = connect_pair().await;
        drop(client);
        assert!(matches!(
            events.recv().await.unwrap(),
            ConnectionEvent::Closed
        ));
    }

    #[tokio::test]
    async fn test_bytes_behind_head_are_framed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client_task = tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            // Handshake and the first frame in a single write.
            let mut bytes = b"GET /ws HTTP/1.1\r\n\
                              Sec-WebSocket-Key: abc\r\n\
                              Sec-WebSocket-Version: 13\r\n\r\n"
                .to_vec();
            bytes.extend(masked_frame(0x1, b"early"));
            client.write_all(&bytes).await.unwrap();
            let mut response = vec![0u8; 1024];
            let _ = client.read(&mut response).await.unwrap();
            client
        });
        let (server_stream, _) = listener.accept().await.unwrap();
        let (_conn, mut events) = accept(server_stream, "/ws").await.unwrap();
        let _client = client_task.await.unwrap();

        match events.recv().await.unwrap() {
            ConnectionEvent::Text(text) => assert_eq!(text, "early"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
