//! Upgrade Handshake
//!
//! Parses the HTTP upgrade request and produces the 101 response. Only
//! protocol version "13" is accepted; anything else is a handshake error and
//! the caller drops the socket without a response body.

use base64::Engine;
use sha1::{Digest, Sha1};

/// Fixed GUID appended to the client key before hashing, per the protocol.
const ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Handshake failure. All variants are fatal to the socket.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// Request head was not parseable HTTP.
    #[error("malformed upgrade request")]
    BadRequest,
    /// Request targeted a different path.
    #[error("unknown upgrade path: {0}")]
    WrongPath(String),
    /// `Sec-WebSocket-Key` header missing.
    #[error("missing websocket key header")]
    MissingKey,
    /// Unsupported `Sec-WebSocket-Version`.
    #[error("unsupported websocket version: {0:?}")]
    UnsupportedVersion(Option<String>),
}

/// Parsed upgrade request.
#[derive(Debug)]
pub struct UpgradeRequest {
    /// Request path, query string stripped.
    pub path: String,
    /// Client nonce from `Sec-WebSocket-Key`.
    pub key: String,
}

/// Compute the accept hash for a client key.
pub fn compute_accept(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(ACCEPT_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Parse the request head (everything before the blank line) of an upgrade
/// request and validate the required headers.
pub fn parse_upgrade(head: &str, expected_path: &str) -> Result<UpgradeRequest, HandshakeError> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or(HandshakeError::BadRequest)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or(HandshakeError::BadRequest)?;
    let target = parts.next().ok_or(HandshakeError::BadRequest)?;
    if method != "GET" {
        return Err(HandshakeError::BadRequest);
    }

    let path = target.split('?').next().unwrap_or(target).to_string();
    if path != expected_path {
        return Err(HandshakeError::WrongPath(path));
    }

    let mut key: Option<String> = None;
    let mut version: Option<String> = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        match name.as_str() {
            "sec-websocket-key" => key = Some(value.to_string()),
            "sec-websocket-version" => version = Some(value.to_string()),
            _ => {}
        }
    }

    if version.as_deref() != Some("13") {
        return Err(HandshakeError::UnsupportedVersion(version));
    }
    let key = key.ok_or(HandshakeError::MissingKey)?;

    Ok(UpgradeRequest { path, key })
}

/// Build the 101 Switching Protocols response for an accepted upgrade.
pub fn accept_response(key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        compute_accept(key)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_hash_known_vector() {
        // RFC 6455 sample nonce.
        assert_eq!(
            compute_accept("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_parse_upgrade_ok() {
        let head = "GET /ws HTTP/1.1\r\n\
                    Host: localhost\r\n\
                    Upgrade: websocket\r\n\
                    Connection: Upgrade\r\n\
                    Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                    Sec-WebSocket-Version: 13";
        let req = parse_upgrade(head, "/ws").unwrap();
        assert_eq!(req.path, "/ws");
        assert_eq!(req.key, "dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn test_parse_upgrade_headers_case_insensitive() {
        let head = "GET /ws?token=x HTTP/1.1\r\n\
                    SEC-WEBSOCKET-KEY: abc\r\n\
                    sec-websocket-version: 13";
        let req = parse_upgrade(head, "/ws").unwrap();
        assert_eq!(req.key, "abc");
    }

    #[test]
    fn test_parse_upgrade_wrong_path() {
        let head = "GET /other HTTP/1.1\r\n\
                    Sec-WebSocket-Key: abc\r\n\
                    Sec-WebSocket-Version: 13";
        assert!(matches!(
            parse_upgrade(head, "/ws"),
            Err(HandshakeError::WrongPath(_))
        ));
    }

    #[test]
    fn test_parse_upgrade_rejects_other_versions() {
        let head = "GET /ws HTTP/1.1\r\n\
                    Sec-WebSocket-Key: abc\r\n\
                    Sec-WebSocket-Version: 8";
        assert!(matches!(
            parse_upgrade(head, "/ws"),
            Err(HandshakeError::UnsupportedVersion(Some(v))) if v == "8"
        ));
    }

    #[test]
    fn test_parse_upgrade_missing_key() {
        let head = "GET /ws HTTP/1.1\r\nSec-WebSocket-Version: 13";
        assert!(matches!(parse_upgrade(head, "/ws"), Err(HandshakeError::MissingKey)));
    }

    #[test]
    fn test_accept_response_contains_hash() {
        let resp = accept_response("dGhlIHNhbXBsZSBub25jZQ==");
        assert!(resp.starts_with("HTTP/1.1 101"));
        assert!(resp.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
        assert!(resp.ends_with("\r\n\r\n"));
    }
}
